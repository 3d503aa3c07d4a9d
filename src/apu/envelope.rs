/// Volume envelope of the pulse and noise channels.
/// Clocked on quarter frames; loops when the length counter halt flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Envelope {
    constant_volume: bool,
    volume: u8,
    start: bool,
    divider: u8,
    decay_level: u8,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bits 4-0 of the channel's first register
    pub fn write_control(&mut self, value: u8) {
        self.constant_volume = value & 0x10 != 0;
        self.volume = value & 0x0F;
    }

    /// Set the start flag (fourth register write)
    pub fn restart(&mut self) {
        self.start = true;
    }

    /// Quarter-frame clock
    pub fn clock(&mut self, looping: bool) {
        if self.start {
            self.start = false;
            self.decay_level = 15;
            self.divider = self.volume;
        } else if self.divider == 0 {
            self.divider = self.volume;
            if self.decay_level > 0 {
                self.decay_level -= 1;
            } else if looping {
                self.decay_level = 15;
            }
        } else {
            self.divider -= 1;
        }
    }

    pub fn volume(&self) -> u8 {
        if self.constant_volume {
            self.volume
        } else {
            self.decay_level
        }
    }
}
