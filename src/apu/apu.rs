use super::dma::Dma;
use super::dmc::Dmc;
use super::frame_counter::{FrameClock, FrameCounter};
use super::noise::Noise;
use super::pulse::Pulse;
use super::triangle::Triangle;
use crate::signals::{BusLines, IrqSource};

/// Main APU module integrating the frame counter, the five sound channels and
/// the DMA unit. Clocked once per CPU cycle, after the CPU and PPU stages.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Apu {
    frame_counter: FrameCounter,
    pulse1: Pulse,
    pulse2: Pulse,
    triangle: Triangle,
    noise: Noise,
    dmc: Dmc,
    dma: Dma,
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}

impl Apu {
    /// Power-on state
    pub fn new() -> Self {
        Self {
            frame_counter: FrameCounter::new(),
            pulse1: Pulse::new(true),
            pulse2: Pulse::new(false),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),
            dma: Dma::new(),
        }
    }

    /// Soft reset: as if $4015 was cleared; the frame counter re-applies its last mode
    pub fn reset(&mut self) {
        self.set_channels_enabled(0x00, 0);
        self.dmc.reset();
        self.frame_counter.reset();
        self.frame_counter.clear_irq();
        self.dma = Dma::new();
    }

    /// Clock the APU by one CPU cycle
    pub fn tick(&mut self, lines: &mut BusLines) {
        match self.frame_counter.clock() {
            FrameClock::None => {}
            FrameClock::Quarter => self.clock_quarter_frame(),
            FrameClock::Half => {
                self.clock_quarter_frame();
                self.clock_half_frame();
            }
        }

        self.pulse1.clock_timer();
        self.pulse2.clock_timer();
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.clock(&mut self.dma);

        // Staged length counter writes land at the end of the cycle
        self.pulse1.length_counter().commit();
        self.pulse2.length_counter().commit();
        self.triangle.length_counter().commit();
        self.noise.length_counter().commit();

        self.update_irq(lines);
    }

    fn clock_quarter_frame(&mut self) {
        self.pulse1.clock_quarter_frame();
        self.pulse2.clock_quarter_frame();
        self.triangle.clock_quarter_frame();
        self.noise.clock_quarter_frame();
    }

    fn clock_half_frame(&mut self) {
        self.pulse1.clock_half_frame();
        self.pulse2.clock_half_frame();
        self.triangle.clock_half_frame();
        self.noise.clock_half_frame();
    }

    fn update_irq(&self, lines: &mut BusLines) {
        lines.set_irq(IrqSource::FrameCounter, self.frame_counter.irq_flag());
        lines.set_irq(IrqSource::Dmc, self.dmc.irq_flag());
    }

    fn set_channels_enabled(&mut self, value: u8, cpu_cycle: u64) {
        self.pulse1.length_counter().set_enabled(value & 0x01 != 0);
        self.pulse2.length_counter().set_enabled(value & 0x02 != 0);
        self.triangle.length_counter().set_enabled(value & 0x04 != 0);
        self.noise.length_counter().set_enabled(value & 0x08 != 0);
        self.dmc.set_enabled(value & 0x10 != 0, cpu_cycle);
    }

    /// Write to $4000-$4017 (except $4016, which belongs to the controllers)
    pub fn write_register(&mut self, addr: u16, value: u8, cpu_cycle: u64, lines: &mut BusLines) {
        match addr {
            0x4000..=0x4003 => self.pulse1.write_register(addr, value),
            0x4004..=0x4007 => self.pulse2.write_register(addr, value),
            0x4008..=0x400B => self.triangle.write_register(addr, value),
            0x400C..=0x400F => self.noise.write_register(addr, value),
            0x4010..=0x4013 => self.dmc.write_register(addr, value),
            0x4014 => self.dma.start_oam(value),
            0x4015 => {
                self.dmc.clear_irq();
                self.set_channels_enabled(value, cpu_cycle);
            }
            0x4017 => self.frame_counter.write_register(value, cpu_cycle),
            _ => {}
        }
        self.update_irq(lines);
    }

    /// Status bits of $4015 without side effects. Bit 5 is not driven.
    pub fn peek_status(&self) -> u8 {
        let mut status = 0;
        if self.pulse1.active() {
            status |= 0x01;
        }
        if self.pulse2.active() {
            status |= 0x02;
        }
        if self.triangle.active() {
            status |= 0x04;
        }
        if self.noise.active() {
            status |= 0x08;
        }
        if self.dmc.active() {
            status |= 0x10;
        }
        if self.frame_counter.irq_flag() {
            status |= 0x40;
        }
        if self.dmc.irq_flag() {
            status |= 0x80;
        }
        status
    }

    /// Read $4015. Clears the frame IRQ flag.
    pub fn read_status(&mut self, open_bus: u8, lines: &mut BusLines) -> u8 {
        let status = self.peek_status() | (open_bus & 0x20);
        self.frame_counter.clear_irq();
        self.update_irq(lines);
        status
    }

    /// Check state that indexes fixed tables (used on restored snapshots)
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.pulse1.is_valid() || !self.pulse2.is_valid() {
            return Err("pulse sequencer out of range");
        }
        if !self.triangle.is_valid() {
            return Err("triangle sequencer out of range");
        }
        if !self.frame_counter.is_valid() {
            return Err("frame counter step out of range");
        }
        Ok(())
    }

    pub fn dma(&self) -> &Dma {
        &self.dma
    }

    pub fn dma_mut(&mut self) -> &mut Dma {
        &mut self.dma
    }

    /// Address the DMC will fetch next
    pub fn dmc_address(&self) -> u16 {
        self.dmc.current_address()
    }

    /// Hand a DMA-fetched byte to the DMC
    pub fn dmc_fetched(&mut self, value: u8, lines: &mut BusLines) {
        self.dmc.set_read_buffer(value);
        self.update_irq(lines);
    }

    /// Current mixed output level in 0.0..=1.0 using the non-linear mixer
    pub fn sample(&self) -> f32 {
        let pulse = (self.pulse1.output() + self.pulse2.output()) as f32;
        let pulse_out = if pulse == 0.0 {
            0.0
        } else {
            95.88 / (8128.0 / pulse + 100.0)
        };

        let tnd = self.triangle.output() as f32 / 8227.0
            + self.noise.output() as f32 / 12241.0
            + self.dmc.output() as f32 / 22638.0;
        let tnd_out = if tnd == 0.0 {
            0.0
        } else {
            159.79 / (1.0 / tnd + 100.0)
        };

        pulse_out + tnd_out
    }
}
