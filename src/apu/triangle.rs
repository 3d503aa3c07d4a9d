use super::length_counter::LengthCounter;
use super::timer::Timer;

/// 32-step triangle sequence: 15 down to 0, then 0 up to 15
const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, //
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];

/// Triangle channel ($4008-$400B)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Triangle {
    timer: Timer,
    real_period: u16,
    sequence_position: u8,
    length: LengthCounter,

    // Linear counter
    control: bool,
    linear_counter: u8,
    linear_reload_value: u8,
    linear_reload: bool,
}

impl Triangle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register write; `reg` is the address offset 0-3 ($4009 is unused)
    pub fn write_register(&mut self, reg: u16, value: u8) {
        match reg & 0x03 {
            0 => {
                self.control = value & 0x80 != 0;
                self.linear_reload_value = value & 0x7F;
                self.length.set_halt(self.control);
            }
            1 => {}
            2 => self.set_period((self.real_period & 0x0700) | value as u16),
            _ => {
                self.length.load(value >> 3);
                self.set_period((self.real_period & 0x00FF) | ((value as u16 & 0x07) << 8));
                self.linear_reload = true;
            }
        }
    }

    fn set_period(&mut self, period: u16) {
        self.real_period = period;
        self.timer.set_period(period);
    }

    /// CPU-cycle clock. The sequencer only moves while both counters are non-zero.
    pub fn clock_timer(&mut self) {
        if self.timer.tick() && self.length.active() && self.linear_counter > 0 {
            self.sequence_position = (self.sequence_position + 1) & 0x1F;
        }
    }

    /// Quarter frame: linear counter
    pub fn clock_quarter_frame(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
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

    pub fn is_valid(&self) -> bool {
        (self.sequence_position as usize) < TRIANGLE_SEQUENCE.len()
    }

    pub fn output(&self) -> u8 {
        TRIANGLE_SEQUENCE[self.sequence_position as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> Triangle {
        let mut triangle = Triangle::new();
        triangle.length_counter().set_enabled(true);
        triangle.write_register(0, 0x7F);
        triangle.write_register(2, 0x02);
        triangle.write_register(3, 0x08);
        triangle.length_counter().commit();
        triangle.clock_quarter_frame();
        triangle
    }

    #[test]
    fn test_linear_counter_reload_then_count_down() {
        let mut triangle = playing();
        assert_eq!(triangle.linear_counter, 0x7F);
        triangle.clock_quarter_frame();
        assert_eq!(triangle.linear_counter, 0x7E);
    }

    #[test]
    fn test_control_flag_keeps_reloading() {
        let mut triangle = playing();
        triangle.write_register(0, 0x85);
        triangle.write_register(3, 0x08);
        triangle.clock_quarter_frame();
        triangle.clock_quarter_frame();
        assert_eq!(triangle.linear_counter, 5);
    }

    #[test]
    fn test_sequencer_steps_when_counters_non_zero() {
        let mut triangle = playing();
        assert_eq!(triangle.output(), 15);
        for _ in 0..3 {
            triangle.clock_timer();
        }
        assert_eq!(triangle.output(), 14);
    }

    #[test]
    fn test_sequencer_frozen_when_linear_counter_zero() {
        let mut triangle = Triangle::new();
        triangle.length_counter().set_enabled(true);
        triangle.write_register(3, 0x08);
        triangle.length_counter().commit();
        for _ in 0..10 {
            triangle.clock_timer();
        }
        assert_eq!(triangle.output(), 15);
    }
}
