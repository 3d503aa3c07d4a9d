use super::envelope::Envelope;
use super::length_counter::LengthCounter;
use super::timer::Timer;

/// Duty cycle sequences, read while the position counts down from 0
const DUTY_SEQUENCES: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1], // 12.5%
    [0, 0, 0, 0, 0, 0, 1, 1], // 25%
    [0, 0, 0, 0, 1, 1, 1, 1], // 50%
    [1, 1, 1, 1, 1, 1, 0, 0], // 25% negated
];

/// Pulse wave channel ($4000-$4003 / $4004-$4007)
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Pulse {
    /// Pulse 1 negates with one's complement, pulse 2 with two's complement
    channel1: bool,
    timer: Timer,
    real_period: u16,
    duty: u8,
    duty_position: u8,
    envelope: Envelope,
    length: LengthCounter,

    sweep_enabled: bool,
    sweep_period: u8,
    sweep_negate: bool,
    sweep_shift: u8,
    sweep_reload: bool,
    sweep_divider: u8,
    target_period: u32,
}

impl Pulse {
    pub fn new(channel1: bool) -> Self {
        Self {
            channel1,
            timer: Timer::new(1),
            real_period: 0,
            duty: 0,
            duty_position: 0,
            envelope: Envelope::new(),
            length: LengthCounter::new(),
            sweep_enabled: false,
            sweep_period: 0,
            sweep_negate: false,
            sweep_shift: 0,
            sweep_reload: false,
            sweep_divider: 0,
            target_period: 0,
        }
    }

    /// Register write; `reg` is the address offset 0-3
    pub fn write_register(&mut self, reg: u16, value: u8) {
        match reg & 0x03 {
            0 => {
                self.duty = (value >> 6) & 0x03;
                self.length.set_halt(value & 0x20 != 0);
                self.envelope.write_control(value);
            }
            1 => {
                self.sweep_enabled = value & 0x80 != 0;
                self.sweep_period = (value >> 4) & 0x07;
                self.sweep_negate = value & 0x08 != 0;
                self.sweep_shift = value & 0x07;
                self.sweep_reload = true;
                self.update_target_period();
            }
            2 => self.set_period((self.real_period & 0x0700) | value as u16),
            _ => {
                self.length.load(value >> 3);
                self.set_period((self.real_period & 0x00FF) | ((value as u16 & 0x07) << 8));
                self.duty_position = 0;
                self.envelope.restart();
            }
        }
    }

    fn set_period(&mut self, period: u16) {
        self.real_period = period;
        // The sequencer runs on APU cycles (every other CPU cycle)
        self.timer.set_period(period * 2 + 1);
        self.update_target_period();
    }

    fn update_target_period(&mut self) {
        let period = self.real_period as u32;
        let change = period >> self.sweep_shift;
        self.target_period = if self.sweep_negate {
            let extra = if self.channel1 { 1 } else { 0 };
            period.saturating_sub(change + extra)
        } else {
            period + change
        };
    }

    fn muted(&self) -> bool {
        self.real_period < 8 || (!self.sweep_negate && self.target_period > 0x7FF)
    }

    /// CPU-cycle clock of the timer
    pub fn clock_timer(&mut self) {
        if self.timer.tick() {
            self.duty_position = self.duty_position.wrapping_sub(1) & 0x07;
        }
    }

    pub fn clock_quarter_frame(&mut self) {
        self.envelope.clock(self.length.halted());
    }

    pub fn clock_half_frame(&mut self) {
        self.length.clock();
        self.clock_sweep();
    }

    fn clock_sweep(&mut self) {
        if self.sweep_divider == 0 && self.sweep_enabled && self.sweep_shift > 0 && !self.muted()
        {
            self.set_period(self.target_period as u16);
        }
        if self.sweep_divider == 0 || self.sweep_reload {
            self.sweep_divider = self.sweep_period;
            self.sweep_reload = false;
        } else {
            self.sweep_divider -= 1;
        }
    }

    pub fn length_counter(&mut self) -> &mut LengthCounter {
        &mut self.length
    }

    pub fn active(&self) -> bool {
        self.length.active()
    }

    /// 4-bit output level
    /// Sequencer state indexes inside the duty table
    pub fn is_valid(&self) -> bool {
        (self.duty as usize) < DUTY_SEQUENCES.len() && self.duty_position < 8
    }

    pub fn output(&self) -> u8 {
        if self.muted() || !self.length.active() {
            return 0;
        }
        DUTY_SEQUENCES[self.duty as usize][self.duty_position as usize] * self.envelope.volume()
    }
}
