use super::envelope::Envelope;
use super::length_counter::LengthCounter;
use super::timer::Timer;

/// Timer periods in CPU cycles
const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// Noise channel ($400C-$400F): a 15-bit LFSR clocked by the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Noise {
    timer: Timer,
    shift_register: u16,
    /// Short mode: feedback from bit 6 instead of bit 1
    mode: bool,
    envelope: Envelope,
    length: LengthCounter,
}

impl Default for Noise {
    fn default() -> Self {
        Self::new()
    }
}

impl Noise {
    pub fn new() -> Self {
        Self {
            timer: Timer::new(NOISE_PERIOD_TABLE[0] - 1),
            shift_register: 1,
            mode: false,
            envelope: Envelope::new(),
            length: LengthCounter::new(),
        }
    }

    /// Register write; `reg` is the address offset 0-3 ($400D is unused)
    pub fn write_register(&mut self, reg: u16, value: u8) {
        match reg & 0x03 {
            0 => {
                self.length.set_halt(value & 0x20 != 0);
                self.envelope.write_control(value);
            }
            1 => {}
            2 => {
                self.mode = value & 0x80 != 0;
                self.timer
                    .set_period(NOISE_PERIOD_TABLE[(value & 0x0F) as usize] - 1);
            }
            _ => {
                self.length.load(value >> 3);
                self.envelope.restart();
            }
        }
    }

    pub fn clock_timer(&mut self) {
        if self.timer.tick() {
            let tap = if self.mode { 6 } else { 1 };
            let feedback = (self.shift_register ^ (self.shift_register >> tap)) & 0x01;
            self.shift_register = (self.shift_register >> 1) | (feedback << 14);
        }
    }

    pub fn clock_quarter_frame(&mut self) {
        self.envelope.clock(self.length.halted());
    }

    pub fn clock_half_frame(&mut self) {
        self.length.clock();
    }

    pub fn length_counter(&mut self) -> &mut LengthCounter {
        &mut self.length
    }

    pub fn active(&self) -> bool {
        self.length.active()
    }

    pub fn output(&self) -> u8 {
        if self.shift_register & 0x01 != 0 || !self.length.active() {
            0
        } else {
            self.envelope.volume()
        }
    }
}
