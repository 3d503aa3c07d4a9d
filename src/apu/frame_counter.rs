/// Clock signal the frame counter sends to the channels on a given cycle.
/// A half-frame clock also clocks the quarter-frame units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClock {
    None,
    Quarter,
    Half,
}

// Step boundaries in CPU cycles, for 4-step and 5-step modes
const STEP_CYCLES: [[u32; 6]; 2] = [
    [7457, 14913, 22371, 29828, 29829, 29830],
    [7457, 14913, 22371, 29829, 37281, 37282],
];

const STEP_CLOCKS: [FrameClock; 6] = [
    FrameClock::Quarter,
    FrameClock::Half,
    FrameClock::Quarter,
    FrameClock::None,
    FrameClock::Half,
    FrameClock::None,
];

/// Frame counter ($4017): sequences envelope, sweep and length counter clocks
/// and raises the frame IRQ in 4-step mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct FrameCounter {
    five_step: bool,
    step: usize,
    cycle: u32,
    irq_inhibit: bool,
    irq_flag: bool,
    /// Written value waiting for its 3-4 cycle delay
    new_value: Option<u8>,
    write_delay: u8,
    /// Cycles during which another frame clock is suppressed
    block_ticks: u8,
    last_write: u8,
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCounter {
    /// Power-on: behaves as if $00 was written just before the first cycle
    pub fn new() -> Self {
        Self {
            five_step: false,
            step: 0,
            cycle: 0,
            irq_inhibit: false,
            irq_flag: false,
            new_value: Some(0x00),
            write_delay: 3,
            block_ticks: 0,
            last_write: 0x00,
        }
    }

    /// Soft reset re-applies the last value written to $4017
    pub fn reset(&mut self) {
        let last_write = self.last_write;
        *self = Self::new();
        self.last_write = last_write;
        self.new_value = Some(last_write);
        self.irq_inhibit = last_write & 0x40 != 0;
    }

    /// Write to $4017
    /// Bit 7: Mode (0 = 4-step, 1 = 5-step)
    /// Bit 6: IRQ inhibit (1 = disable IRQ)
    pub fn write_register(&mut self, value: u8, cpu_cycle: u64) {
        self.last_write = value;
        self.new_value = Some(value);
        // The sequencer restarts 3 cycles later if written on an even cycle, 4 if odd
        self.write_delay = if cpu_cycle & 0x01 == 1 { 4 } else { 3 };
        self.irq_inhibit = value & 0x40 != 0;
        if self.irq_inhibit {
            self.irq_flag = false;
        }
    }

    /// Clock the frame counter by one CPU cycle
    pub fn clock(&mut self) -> FrameClock {
        let mut event = FrameClock::None;
        let mode = self.five_step as usize;

        self.cycle += 1;
        if self.cycle == STEP_CYCLES[mode][self.step] {
            // The IRQ flag is asserted on the last three cycles of a 4-step frame
            if !self.five_step && self.step >= 3 && !self.irq_inhibit {
                self.irq_flag = true;
            }
            let clock = STEP_CLOCKS[self.step];
            if clock != FrameClock::None && self.block_ticks == 0 {
                event = clock;
                self.block_ticks = 2;
            }
            self.step += 1;
            if self.step == STEP_CLOCKS.len() {
                self.step = 0;
                self.cycle = 0;
            }
        }

        if let Some(value) = self.new_value {
            self.write_delay -= 1;
            if self.write_delay == 0 {
                self.five_step = value & 0x80 != 0;
                self.step = 0;
                self.cycle = 0;
                self.new_value = None;
                // 5-step mode clocks all units immediately
                if self.five_step && self.block_ticks == 0 {
                    event = FrameClock::Half;
                    self.block_ticks = 2;
                }
            }
        }

        if self.block_ticks > 0 {
            self.block_ticks -= 1;
        }
        event
    }

    pub fn is_valid(&self) -> bool {
        self.step < STEP_CLOCKS.len()
    }

    pub fn irq_flag(&self) -> bool {
        self.irq_flag
    }

    pub fn clear_irq(&mut self) {
        self.irq_flag = false;
    }

    pub fn five_step(&self) -> bool {
        self.five_step
    }
}
