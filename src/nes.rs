use bincode::error::DecodeError;
use tracing::{debug, info};

use crate::apu::Apu;
use crate::bus::{RAM_SIZE, SystemBus};
use crate::cartridge::Cartridge;
use crate::clock::{MASTER_PER_CPU, MasterClock};
use crate::config::MachineConfig;
use crate::cpu::{Cpu, CpuBus};
use crate::joypad::Joypads;
use crate::ppu::{EmptySlot, FrameSink, Ppu};
use crate::signals::{BusLines, IrqSource};

/// Build the CPU-side bus over the machine's parts, leaving `cpu` free
macro_rules! system_bus {
    ($nes:expr) => {
        SystemBus {
            ram: &mut $nes.ram[..],
            ppu: &mut $nes.ppu,
            apu: &mut $nes.apu,
            cartridge: $nes.cartridge.as_mut(),
            joypads: &mut $nes.joypads,
            lines: &mut $nes.lines,
            open_bus: &mut $nes.open_bus,
            cpu_cycle: $nes.clock.cpu_cycles(),
        }
    };
}

/// One console: every piece of mutable machine state plus the scheduler.
///
/// The cartridge is held separately from CPU/PPU/APU state and may be replaced
/// between any two ticks. The whole machine (cartridge included) is `Clone` and
/// serializes to a snapshot that resumes at the same master tick.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Nes {
    config: MachineConfig,
    clock: MasterClock,
    cpu: Cpu,
    ppu: Ppu,
    apu: Apu,
    ram: Vec<u8>,
    joypads: Joypads,
    lines: BusLines,
    open_bus: u8,
    cartridge: Option<Cartridge>,
}

impl Default for Nes {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

impl Nes {
    /// A powered-on console with an empty cartridge slot
    pub fn new(config: MachineConfig) -> Self {
        let mut ram = vec![0; RAM_SIZE];
        config.ram_init.fill(&mut ram);
        Self {
            config,
            clock: MasterClock::new(config.alignment()),
            cpu: Cpu::new(),
            ppu: Ppu::new(&config),
            apu: Apu::new(),
            ram,
            joypads: Joypads::new(),
            lines: BusLines::new(),
            open_bus: 0,
            cartridge: None,
        }
    }

    /// Convenience: a powered-on console with `cartridge` inserted
    pub fn with_cartridge(config: MachineConfig, cartridge: Cartridge) -> Self {
        let mut nes = Self::new(config);
        nes.insert_cartridge(cartridge);
        nes
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Advance the master oscillator by one period. Returns true when the CPU
    /// finished an instruction (or interrupt sequence) on this tick.
    ///
    /// Stages run in a fixed order and later stages see what earlier ones did:
    /// CPU, PPU dot, PPU half dot, APU.
    pub fn tick(&mut self) -> bool {
        let phases = self.clock.phases();
        let mut done = false;
        if phases.cpu {
            done = self.cpu_cycle();
        }
        if phases.ppu {
            self.ppu_dot();
        }
        if phases.ppu_half {
            self.ppu.half_tick(&mut self.lines);
        }
        if phases.apu {
            self.apu.tick(&mut self.lines);
        }
        self.clock.advance(phases);
        done
    }

    /// Run until the CPU completes the instruction in flight, then to the end of
    /// that CPU cycle. Returns the number of CPU cycles consumed, DMA steals included.
    /// A jammed CPU never completes; this returns after one cycle in that case.
    pub fn step_instruction(&mut self) -> u64 {
        let start = self.clock.cpu_cycles();
        loop {
            let done = self.tick();
            if done || self.cpu.is_jammed() {
                break;
            }
        }
        self.finish_cpu_cycle();
        self.clock.cpu_cycles() - start
    }

    /// Run until the PPU next enters vertical blank
    pub fn step_frame(&mut self) {
        self.ppu.poll_frame_complete();
        while !self.ppu.poll_frame_complete() {
            self.tick();
        }
    }

    /// Run `cycles` whole CPU cycles
    pub fn step_cycles(&mut self, cycles: u64) {
        for _ in 0..cycles * MASTER_PER_CPU {
            self.tick();
        }
    }

    fn finish_cpu_cycle(&mut self) {
        while !self.clock.phases().cpu {
            self.tick();
        }
    }

    /// Console reset button. CPU registers survive (the reset sequence sets I and
    /// lowers SP by 3); PPU and APU latches are cleared. RAM is untouched.
    pub fn reset(&mut self) {
        debug!("reset");
        self.cpu.reset();
        self.ppu.reset();
        self.apu.reset();
    }

    /// Power cycle: every register and work RAM return to their power-on state.
    /// The cartridge stays inserted.
    pub fn power_on(&mut self) {
        debug!("power on");
        let cartridge = self.cartridge.take();
        *self = Self::new(self.config);
        self.cartridge = cartridge;
        self.update_mapper_irq();
    }

    /// Swap in a cartridge without touching the rest of the machine.
    /// Returns the cartridge that was in the slot.
    pub fn insert_cartridge(&mut self, cartridge: Cartridge) -> Option<Cartridge> {
        info!(mapper = cartridge.mapper_id(), "cartridge inserted");
        let previous = self.cartridge.replace(cartridge);
        self.update_mapper_irq();
        previous
    }

    pub fn eject_cartridge(&mut self) -> Option<Cartridge> {
        let previous = self.cartridge.take();
        if previous.is_some() {
            info!("cartridge ejected");
        }
        self.update_mapper_irq();
        previous
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    /// Battery-backed save RAM of the inserted cartridge
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.cartridge.as_ref().and_then(Cartridge::battery_ram)
    }

    pub fn restore_battery_ram(&mut self, data: &[u8]) {
        if let Some(cartridge) = self.cartridge.as_mut() {
            cartridge.restore_battery_ram(data);
        }
    }

    /// Encode the complete machine state
    pub fn save_state(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::encode_to_vec(self, bincode::config::standard())
    }

    /// Replace the machine with a snapshot taken by `save_state`. A snapshot that
    /// decodes but describes an impossible machine is rejected and `self` is kept.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let (state, _): (Nes, usize) = bincode::decode_from_slice(data, bincode::config::standard())?;
        state.validate().map_err(DecodeError::Other)?;
        *self = state;
        debug!(
            master_ticks = self.clock.master_ticks(),
            "snapshot restored"
        );
        Ok(())
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.ram.len() != RAM_SIZE {
            return Err("work RAM size mismatch");
        }
        self.ppu.validate()?;
        self.apu.validate()?;
        if let Some(cartridge) = &self.cartridge {
            cartridge.validate()?;
        }
        Ok(())
    }

    /// Replay the last complete frame into `sink`
    pub fn present<S: FrameSink>(&self, sink: &mut S) {
        self.ppu.present(sink);
    }

    /// Last complete frame as `(x, y, pixel)`; pixel is a 6-bit palette index with
    /// the three emphasis bits above it.
    pub fn frame(&self) -> impl Iterator<Item = (usize, usize, u16)> + '_ {
        self.ppu.frame()
    }

    pub fn joypads(&self) -> &Joypads {
        &self.joypads
    }

    pub fn joypads_mut(&mut self) -> &mut Joypads {
        &mut self.joypads
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn clock(&self) -> &MasterClock {
        &self.clock
    }

    pub fn lines(&self) -> &BusLines {
        &self.lines
    }

    /// Current mixed audio level
    pub fn audio_sample(&self) -> f32 {
        self.apu.sample()
    }

    /// Side-effect-free view of work RAM and cartridge space; registers read as 0
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram[(addr as usize) & (RAM_SIZE - 1)],
            0x4020..=0xFFFF => self
                .cartridge
                .as_ref()
                .and_then(|cartridge| cartridge.cpu_read(addr))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Perform a CPU bus write outside of the scheduler (debugger pokes)
    pub fn poke(&mut self, addr: u16, value: u8) {
        system_bus!(self).write(addr, value);
        self.update_mapper_irq();
    }

    /// One CPU cycle, or the DMA cycle that replaces it
    fn cpu_cycle(&mut self) -> bool {
        self.cpu.sample_lines(&self.lines);

        let done = if self.apu.dma().in_progress() {
            self.cpu.note_dma_halt();
            system_bus!(self).run_dma_cycle();
            false
        } else if self.apu.dma().need_halt() {
            // The DMA can only halt the CPU on a read cycle. Run the cycle; if it
            // was a read, it becomes the halt cycle and the CPU repeats it later.
            let cpu = self.cpu.clone();
            let joypads = self.joypads.clone();
            let done = self.cpu.tick(&mut system_bus!(self));
            if self.cpu.last_cycle_was_write() {
                done
            } else {
                let addr = self.cpu.address_bus();
                self.cpu = cpu;
                self.joypads = joypads;
                self.cpu.note_dma_halt();
                self.apu.dma_mut().halt(addr);
                false
            }
        } else {
            self.cpu.tick(&mut system_bus!(self))
        };

        self.cpu.settle_nmi_cancel(&mut self.lines);
        self.update_mapper_irq();
        done
    }

    fn ppu_dot(&mut self) {
        match self.cartridge.as_mut() {
            Some(cartridge) => self.ppu.tick(cartridge),
            None => self.ppu.tick(&mut EmptySlot),
        }
        self.update_mapper_irq();
    }

    fn update_mapper_irq(&mut self) {
        let asserted = self.cartridge.as_ref().is_some_and(Cartridge::irq);
        self.lines.set_irq(IrqSource::Mapper, asserted);
    }
}
