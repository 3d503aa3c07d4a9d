/// Length counter load table (indexed by bits 7-3 of the fourth channel register)
const LENGTH_COUNTER_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Length counter shared by the pulse, triangle and noise channels.
///
/// Register writes are staged: a reload and a halt change only land at the end
/// of the APU cycle, and a reload is dropped if a half-frame clock changed the
/// counter in that same cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct LengthCounter {
    enabled: bool,
    halt: bool,
    new_halt: bool,
    counter: u8,
    reload_value: u8,
    previous_value: u8,
}

impl LengthCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the halt flag (bit 5 of the channel's first register)
    pub fn set_halt(&mut self, halt: bool) {
        self.new_halt = halt;
    }

    pub fn halted(&self) -> bool {
        self.halt
    }

    /// Stage a reload from the 5-bit table index. Ignored while disabled.
    pub fn load(&mut self, index: u8) {
        if self.enabled {
            self.reload_value = LENGTH_COUNTER_TABLE[(index & 0x1F) as usize];
            self.previous_value = self.counter;
        }
    }

    /// Apply staged writes at the end of the APU cycle
    pub fn commit(&mut self) {
        if self.reload_value != 0 {
            if self.counter == self.previous_value {
                self.counter = self.reload_value;
            }
            self.reload_value = 0;
        }
        self.halt = self.new_halt;
    }

    /// Half-frame clock
    pub fn clock(&mut self) {
        if self.counter > 0 && !self.halt {
            self.counter -= 1;
        }
    }

    /// Channel enable bit from $4015. Disabling clears the counter.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.counter = 0;
        }
        self.enabled = enabled;
    }

    pub fn value(&self) -> u8 {
        self.counter
    }

    pub fn active(&self) -> bool {
        self.counter > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> LengthCounter {
        let mut length = LengthCounter::new();
        length.set_enabled(true);
        length
    }

    #[test]
    fn test_load_lands_at_commit() {
        let mut length = enabled();
        length.load(0b00010);
        assert_eq!(length.value(), 0);
        length.commit();
        assert_eq!(length.value(), 20);
    }

    #[test]
    fn test_load_ignored_while_disabled() {
        let mut length = LengthCounter::new();
        length.load(1);
        length.commit();
        assert_eq!(length.value(), 0);
    }

    #[test]
    fn test_reload_during_clock_is_dropped() {
        let mut length = enabled();
        length.load(0);
        length.commit();
        assert_eq!(length.value(), 10);

        // Reload staged in the same cycle as a half-frame clock
        length.load(1);
        length.clock();
        length.commit();
        assert_eq!(length.value(), 9);
    }

    #[test]
    fn test_halt_change_is_delayed() {
        let mut length = enabled();
        length.load(0);
        length.commit();
        length.set_halt(true);
        length.clock();
        assert_eq!(length.value(), 9);
        length.commit();
        length.clock();
        assert_eq!(length.value(), 9);
    }

    #[test]
    fn test_disable_clears_counter() {
        let mut length = enabled();
        length.load(3);
        length.commit();
        length.set_enabled(false);
        assert!(!length.active());
    }
}
