/// Channel timer: a down-counter clocked every CPU cycle that fires when it
/// wraps past zero and reloads from the period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Timer {
    period: u16,
    counter: u16,
}

impl Timer {
    pub fn new(period: u16) -> Self {
        Self { period, counter: 0 }
    }

    pub fn set_period(&mut self, period: u16) {
        self.period = period;
    }

    pub fn period(&self) -> u16 {
        self.period
    }

    /// Clock once. Returns true when the timer expired and reloaded.
    pub fn tick(&mut self) -> bool {
        if self.counter == 0 {
            self.counter = self.period;
            true
        } else {
            self.counter -= 1;
            false
        }
    }
}
