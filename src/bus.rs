use crate::apu::Apu;
use crate::cartridge::Cartridge;
use crate::cpu::CpuBus;
use crate::joypad::Joypads;
use crate::ppu::{EmptySlot, Ppu};
use crate::signals::BusLines;

/// Size of the console's work RAM; mirrored across $0000-$1FFF
pub const RAM_SIZE: usize = 0x0800;

/// CPU address decoder for one CPU cycle.
///
/// Borrows the machine parts it routes to instead of owning them, so the cartridge
/// can be swapped between cycles. Every read and write leaves its value on
/// `open_bus`, which is what unmapped addresses return.
pub struct SystemBus<'a> {
    pub ram: &'a mut [u8],
    pub ppu: &'a mut Ppu,
    pub apu: &'a mut Apu,
    pub cartridge: Option<&'a mut Cartridge>,
    pub joypads: &'a mut Joypads,
    pub lines: &'a mut BusLines,
    pub open_bus: &'a mut u8,
    /// Index of the CPU cycle in flight (even = get, odd = put)
    pub cpu_cycle: u64,
}

impl SystemBus<'_> {
    /// Run one cycle of the active DMA in place of a CPU cycle. A fetched DMC
    /// sample byte goes straight to the DMC.
    pub fn run_dma_cycle(&mut self) {
        let mut dma = *self.apu.dma();
        let dmc_addr = self.apu.dmc_address();
        let cpu_cycle = self.cpu_cycle;
        let fetched = dma.cycle(self, dmc_addr, cpu_cycle);
        *self.apu.dma_mut() = dma;
        if let Some(value) = fetched {
            self.apu.dmc_fetched(value, self.lines);
        }
    }

    fn read_ppu(&mut self, addr: u16) -> u8 {
        match self.cartridge.as_deref_mut() {
            Some(cartridge) => self.ppu.cpu_read(addr, cartridge, self.lines),
            None => self.ppu.cpu_read(addr, &mut EmptySlot, self.lines),
        }
    }

    fn write_ppu(&mut self, addr: u16, value: u8) {
        match self.cartridge.as_deref_mut() {
            Some(cartridge) => self.ppu.cpu_write(addr, value, cartridge),
            None => self.ppu.cpu_write(addr, value, &mut EmptySlot),
        }
    }
}

impl CpuBus for SystemBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        let value = match addr {
            // RAM ($0000-$1FFF) with mirroring
            0x0000..=0x1FFF => self.ram[(addr as usize) & (RAM_SIZE - 1)],

            // PPU registers ($2000-$3FFF), mirrored every 8 bytes
            0x2000..=0x3FFF => self.read_ppu(addr),

            // $4015 is internal to the CPU package and does not drive the external bus
            0x4015 => return self.apu.read_status(*self.open_bus, self.lines),

            // Controllers drive only the low bits
            0x4016 => self.joypads.read(0) | (*self.open_bus & 0xE0),
            0x4017 => self.joypads.read(1) | (*self.open_bus & 0xE0),

            // Write-only APU registers and the disabled test range
            0x4000..=0x401F => *self.open_bus,

            // Cartridge space ($4020-$FFFF)
            _ => self
                .cartridge
                .as_deref()
                .and_then(|cartridge| cartridge.cpu_read(addr))
                .unwrap_or(*self.open_bus),
        };
        *self.open_bus = value;
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        *self.open_bus = value;
        match addr {
            0x0000..=0x1FFF => self.ram[(addr as usize) & (RAM_SIZE - 1)] = value,
            0x2000..=0x3FFF => self.write_ppu(addr, value),
            0x4016 => self.joypads.write_strobe(value),
            0x4000..=0x4017 => self.apu.write_register(addr, value, self.cpu_cycle, self.lines),
            0x4018..=0x401F => {}
            _ => {
                if let Some(cartridge) = self.cartridge.as_deref_mut() {
                    cartridge.cpu_write(addr, value, self.cpu_cycle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Mirroring;
    use crate::config::MachineConfig;
    use crate::joypad::Button;

    struct Parts {
        ram: Vec<u8>,
        ppu: Ppu,
        apu: Apu,
        cartridge: Option<Cartridge>,
        joypads: Joypads,
        lines: BusLines,
        open_bus: u8,
    }

    impl Parts {
        fn new(cartridge: Option<Cartridge>) -> Self {
            Self {
                ram: vec![0; RAM_SIZE],
                ppu: Ppu::new(&MachineConfig::default()),
                apu: Apu::new(),
                cartridge,
                joypads: Joypads::new(),
                lines: BusLines::new(),
                open_bus: 0,
            }
        }

        fn bus(&mut self) -> SystemBus<'_> {
            SystemBus {
                ram: &mut self.ram,
                ppu: &mut self.ppu,
                apu: &mut self.apu,
                cartridge: self.cartridge.as_mut(),
                joypads: &mut self.joypads,
                lines: &mut self.lines,
                open_bus: &mut self.open_bus,
                cpu_cycle: 0,
            }
        }
    }

    fn nrom() -> Cartridge {
        let mut prg = vec![0xEA; 0x4000];
        prg[0] = 0x42;
        Cartridge::new(0, prg, vec![0; 0x2000], Mirroring::Vertical, false)
    }

    #[test]
    fn test_ram_mirroring() {
        let mut parts = Parts::new(None);
        let mut bus = parts.bus();
        bus.write(0x0800, 0x5A);
        assert_eq!(bus.read(0x0000), 0x5A);
        assert_eq!(bus.read(0x1000), 0x5A);
        assert_eq!(bus.read(0x1800), 0x5A);
    }

    #[test]
    fn test_prg_rom_reads_and_mirrors() {
        let mut parts = Parts::new(Some(nrom()));
        let mut bus = parts.bus();
        // 16KB NROM appears at both $8000 and $C000
        assert_eq!(bus.read(0x8000), 0x42);
        assert_eq!(bus.read(0xC000), 0x42);
    }

    #[test]
    fn test_unmapped_reads_return_open_bus() {
        let mut parts = Parts::new(None);
        let mut bus = parts.bus();
        bus.write(0x0010, 0xA5);
        assert_eq!(bus.read(0x5000), 0xA5);
        assert_eq!(bus.read(0x8000), 0xA5);
        assert_eq!(bus.read(0x4000), 0xA5);
    }

    #[test]
    fn test_status_read_keeps_open_bus() {
        let mut parts = Parts::new(None);
        let mut bus = parts.bus();
        bus.write(0x0010, 0x20);
        let status = bus.read(0x4015);
        assert_eq!(status & 0x20, 0x20);
        assert_eq!(*bus.open_bus, 0x20);
    }

    #[test]
    fn test_controller_reads_keep_open_bus_high_bits() {
        let mut parts = Parts::new(None);
        parts.joypads.port_mut(0).set_button(Button::A, true);
        let mut bus = parts.bus();
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        // The strobe write left $00 on the bus; $40 comes from the address high byte
        *bus.open_bus = 0x40;
        assert_eq!(bus.read(0x4016), 0x41);
        assert_eq!(bus.read(0x4016), 0x40);
    }

    #[test]
    fn test_ppu_registers_mirror_every_eight_bytes() {
        let mut parts = Parts::new(Some(nrom()));
        let mut bus = parts.bus();
        // OAMADDR via a mirror, then OAMDATA via another mirror
        bus.write(0x3FFB, 0x10);
        bus.write(0x200C, 0x77);
        bus.write(0x2003, 0x10);
        assert_eq!(bus.read(0x2004), 0x77);
    }

    #[test]
    fn test_oam_dma_runs_through_the_bus() {
        let mut parts = Parts::new(None);
        for i in 0..256 {
            parts.ram[0x200 + i] = i as u8;
        }
        parts.apu.dma_mut().start_oam(0x02);
        let mut cycles = 0u64;
        parts.apu.dma_mut().halt(0x8000);
        while parts.apu.dma().in_progress() {
            let mut bus = parts.bus();
            bus.cpu_cycle = cycles;
            bus.run_dma_cycle();
            cycles += 1;
        }
        let mut bus = parts.bus();
        bus.write(0x2003, 0x05);
        assert_eq!(bus.read(0x2004), 0x05);
        bus.write(0x2003, 0xFF);
        assert_eq!(bus.read(0x2004), 0xFF);
    }
}
