/// Standard controller button, numbered by its position in the report
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Button {
    A = 0,
    B = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
}

/// Standard controller (joypad)
///
/// The controller is an 8-bit parallel-in/serial-out shift register.
/// While the strobe input is high the register is continuously reloaded from the
/// buttons, so every read returns the live state of A. When strobe drops, each read
/// shifts out the next button; after eight reads the serial input feeds 1s.
#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct Joypad {
    strobe: bool,
    shift_register: u8,
    button_states: u8, // Bitfield: [Right, Left, Down, Up, Start, Select, B, A]
}

impl Joypad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strobe input (bit 0 of a $4016 write)
    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = value & 0x01 != 0;
        if self.strobe {
            self.shift_register = self.button_states;
        }
    }

    /// Serial output (bit 0 of a $4016/$4017 read)
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            // Parallel load is still active: bit 0 follows the A button
            self.shift_register = self.button_states;
            return self.shift_register & 0x01;
        }

        let bit = self.shift_register & 0x01;
        self.shift_register = (self.shift_register >> 1) | 0x80;
        bit
    }

    /// Set the state of a single button
    pub fn set_button(&mut self, button: Button, pressed: bool) {
        let bit = button as u8;
        if pressed {
            self.button_states |= 1 << bit;
        } else {
            self.button_states &= !(1 << bit);
        }
    }

    /// Replace the whole button report at once
    pub fn set_buttons(&mut self, states: u8) {
        self.button_states = states;
    }

    pub fn buttons(&self) -> u8 {
        self.button_states
    }
}

/// The two controller ports at $4016 and $4017
#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct Joypads {
    ports: [Joypad; 2],
}

impl Joypads {
    pub fn new() -> Self {
        Self::default()
    }

    /// A $4016 write strobes both ports
    pub fn write_strobe(&mut self, value: u8) {
        for port in &mut self.ports {
            port.write_strobe(value);
        }
    }

    /// Read port 0 ($4016) or port 1 ($4017); only bit 0 is driven
    pub fn read(&mut self, port: usize) -> u8 {
        self.ports[port & 1].read()
    }

    pub fn port_mut(&mut self, port: usize) -> &mut Joypad {
        &mut self.ports[port & 1]
    }

    pub fn port(&self, port: usize) -> &Joypad {
        &self.ports[port & 1]
    }
}
