//! Delta modulation channel ($4010-$4013).
//!
//! Sample bytes are fetched from CPU memory by the DMA unit. The channel only
//! requests a fetch; the byte comes back through `set_read_buffer`.

use super::dma::Dma;
use super::timer::Timer;

/// Rate periods in CPU cycles
const DMC_RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Dmc {
    timer: Timer,
    irq_enabled: bool,
    loop_flag: bool,
    irq_flag: bool,

    // Memory reader
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    read_buffer: u8,
    buffer_empty: bool,

    // Output unit
    output_level: u8,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,

    // $4015 enable/disable latency in CPU cycles
    start_delay: u8,
    disable_delay: u8,
}

impl Default for Dmc {
    fn default() -> Self {
        Self::new()
    }
}

impl Dmc {
    pub fn new() -> Self {
        Self {
            timer: Timer::new(DMC_RATE_TABLE[0] - 1),
            irq_enabled: false,
            loop_flag: false,
            irq_flag: false,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            read_buffer: 0,
            buffer_empty: true,
            output_level: 0,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
            start_delay: 0,
            disable_delay: 0,
        }
    }

    /// Register write; `reg` is the address offset 0-3
    pub fn write_register(&mut self, reg: u16, value: u8) {
        match reg & 0x03 {
            0 => {
                self.irq_enabled = value & 0x80 != 0;
                self.loop_flag = value & 0x40 != 0;
                self.timer
                    .set_period(DMC_RATE_TABLE[(value & 0x0F) as usize] - 1);
                if !self.irq_enabled {
                    self.irq_flag = false;
                }
            }
            1 => self.output_level = value & 0x7F,
            2 => self.sample_address = 0xC000 | (value as u16) << 6,
            _ => self.sample_length = (value as u16) << 4 | 0x0001,
        }
    }

    fn restart_sample(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    /// $4015 bit 4. Takes effect 2-3 CPU cycles later depending on parity.
    pub fn set_enabled(&mut self, enabled: bool, cpu_cycle: u64) {
        let delay = if cpu_cycle & 0x01 == 0 { 2 } else { 3 };
        if !enabled {
            if self.disable_delay == 0 {
                self.disable_delay = delay;
            }
        } else if self.bytes_remaining == 0 {
            self.restart_sample();
            self.start_delay = delay;
        }
    }

    fn start_transfer(&mut self, dma: &mut Dma) {
        if self.buffer_empty && self.bytes_remaining > 0 {
            dma.start_dmc();
        }
    }

    /// Address of the next sample byte
    pub fn current_address(&self) -> u16 {
        self.current_address
    }

    /// A sample byte arrived from DMA
    pub fn set_read_buffer(&mut self, value: u8) {
        if self.bytes_remaining == 0 {
            return;
        }
        self.read_buffer = value;
        self.buffer_empty = false;
        self.current_address = self.current_address.wrapping_add(1);
        if self.current_address == 0 {
            self.current_address = 0x8000;
        }
        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 {
            if self.loop_flag {
                self.restart_sample();
            } else if self.irq_enabled {
                self.irq_flag = true;
            }
        }
    }

    /// Per-CPU-cycle clock: pending $4015 effects, then the timer
    pub fn clock(&mut self, dma: &mut Dma) {
        if self.disable_delay > 0 {
            self.disable_delay -= 1;
            if self.disable_delay == 0 {
                self.bytes_remaining = 0;
                dma.stop_dmc();
            }
        }
        if self.start_delay > 0 {
            self.start_delay -= 1;
            if self.start_delay == 0 {
                self.start_transfer(dma);
            }
        }

        if self.timer.tick() {
            self.clock_output(dma);
        }
    }

    fn clock_output(&mut self, dma: &mut Dma) {
        if !self.silence {
            if self.shift_register & 0x01 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
        }
        self.shift_register >>= 1;
        self.bits_remaining -= 1;

        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            if self.buffer_empty {
                self.silence = true;
            } else {
                self.silence = false;
                self.shift_register = self.read_buffer;
                self.buffer_empty = true;
                self.start_transfer(dma);
            }
        }
    }

    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub fn irq_flag(&self) -> bool {
        self.irq_flag
    }

    pub fn clear_irq(&mut self) {
        self.irq_flag = false;
    }

    /// Soft reset: playback stops, registers keep their values
    pub fn reset(&mut self) {
        self.bytes_remaining = 0;
        self.irq_flag = false;
        self.start_delay = 0;
        self.disable_delay = 0;
    }

    /// 7-bit output level
    pub fn output(&self) -> u8 {
        self.output_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBus;

    struct SampleBus;

    impl CpuBus for SampleBus {
        fn read(&mut self, _addr: u16) -> u8 {
            0x55
        }

        fn write(&mut self, _addr: u16, _value: u8) {}
    }

    /// One CPU cycle in machine order: the DMA (or its halt) in the CPU stage, then
    /// the channel clock. Returns true when the cycle was stolen from the CPU.
    fn run_cycle(dmc: &mut Dmc, dma: &mut Dma, cycle: u64) -> bool {
        let stolen = if dma.in_progress() {
            if let Some(value) = dma.cycle(&mut SampleBus, dmc.current_address(), cycle) {
                dmc.set_read_buffer(value);
            }
            true
        } else if dma.need_halt() {
            dma.halt(0x8000);
            true
        } else {
            false
        };
        dmc.clock(dma);
        stolen
    }

    /// Sample playing with a full buffer; the output unit empties it on the
    /// `clocks`-th clock and asks for a refill
    fn about_to_refill(clocks: u8) -> Dmc {
        let mut dmc = Dmc::new();
        dmc.write_register(3, 0x01);
        dmc.restart_sample();
        dmc.set_read_buffer(0xAA);
        dmc.timer = Timer::new(0);
        dmc.bits_remaining = clocks;
        dmc
    }

    #[test]
    fn test_register_decoding() {
        let mut dmc = Dmc::new();
        dmc.write_register(0, 0xC5);
        assert!(dmc.irq_enabled);
        assert!(dmc.loop_flag);
        assert_eq!(dmc.timer.period(), 253);

        dmc.write_register(2, 0xFF);
        assert_eq!(dmc.sample_address, 0xFFC0);
        dmc.write_register(3, 0xFF);
        assert_eq!(dmc.sample_length, 0xFF1);
    }

    #[test]
    fn test_enable_requests_dma_after_delay() {
        let mut dmc = Dmc::new();
        let mut dma = Dma::new();
        dmc.set_enabled(true, 0);
        assert!(dmc.active());
        dmc.clock(&mut dma);
        assert!(!dma.need_halt());
        dmc.clock(&mut dma);
        assert!(dma.need_halt());
    }

    #[test]
    fn test_odd_cycle_enable_takes_one_more_cycle() {
        let mut dmc = Dmc::new();
        let mut dma = Dma::new();
        dmc.set_enabled(true, 1);
        dmc.clock(&mut dma);
        dmc.clock(&mut dma);
        assert!(!dma.need_halt());
        dmc.clock(&mut dma);
        assert!(dma.need_halt());
    }

    #[test]
    fn test_last_byte_raises_irq() {
        let mut dmc = Dmc::new();
        dmc.write_register(0, 0x80);
        dmc.set_enabled(true, 0);
        dmc.set_read_buffer(0x55);
        assert!(!dmc.active());
        assert!(dmc.irq_flag());
    }

    #[test]
    fn test_loop_restarts_sample() {
        let mut dmc = Dmc::new();
        dmc.write_register(0, 0xC0);
        dmc.write_register(2, 0x10);
        dmc.set_enabled(true, 0);
        dmc.set_read_buffer(0x55);
        assert!(dmc.active());
        assert!(!dmc.irq_flag());
        assert_eq!(dmc.current_address(), 0xC400);
    }

    #[test]
    fn test_address_wraps_to_8000() {
        let mut dmc = Dmc::new();
        dmc.write_register(2, 0xFF);
        dmc.write_register(3, 0xFF);
        dmc.set_enabled(true, 0);
        for _ in 0..0x40 {
            dmc.set_read_buffer(0);
        }
        assert_eq!(dmc.current_address(), 0x8000);
    }

    #[test]
    fn test_output_unit_follows_shift_register() {
        let mut dmc = Dmc::new();
        let mut dma = Dma::new();
        dmc.write_register(0, 0x0F);
        dmc.write_register(1, 0x40);
        dmc.set_enabled(true, 0);
        dmc.set_read_buffer(0xFF);
        // Drain the initial silent byte so the buffer is loaded into the shifter
        for _ in 0..8 * 54 {
            dmc.clock(&mut dma);
        }
        let level = dmc.output();
        for _ in 0..54 {
            dmc.clock(&mut dma);
        }
        assert_eq!(dmc.output(), level + 2);
    }

    #[test]
    fn test_refill_request_then_disable_steals_only_halt_cycle() {
        // The refill DMA is requested one cycle before the disable lands; the
        // disable then hits the halt cycle. Even writes land after 2 clocks, odd after 3.
        for (write_cycle, refill_clock) in [(10u64, 1u8), (11, 2)] {
            let mut dmc = about_to_refill(refill_clock);
            let mut dma = Dma::new();
            let mut stolen = Vec::new();
            dmc.set_enabled(false, write_cycle);
            for cycle in write_cycle..write_cycle + 8 {
                if run_cycle(&mut dmc, &mut dma, cycle) {
                    stolen.push(cycle);
                }
            }
            assert_eq!(stolen, vec![write_cycle + refill_clock as u64]);
            assert_eq!(dmc.bytes_remaining, 0);
            assert!(!dma.dmc_pending());
            assert!(!dma.in_progress());
        }
    }

    #[test]
    fn test_disable_before_refill_request_steals_nothing() {
        let mut dmc = about_to_refill(3);
        let mut dma = Dma::new();
        dmc.set_enabled(false, 10);
        let stolen = (10..18).filter(|&cycle| run_cycle(&mut dmc, &mut dma, cycle)).count();
        assert_eq!(stolen, 0);
        assert_eq!(dmc.bytes_remaining, 0);
    }

    #[test]
    fn test_disable_clears_after_delay() {
        let mut dmc = Dmc::new();
        let mut dma = Dma::new();
        dmc.write_register(3, 0x01);
        dmc.set_enabled(true, 0);
        dmc.set_enabled(false, 0);
        dmc.clock(&mut dma);
        assert!(dmc.active());
        dmc.clock(&mut dma);
        assert!(!dmc.active());
    }
}
