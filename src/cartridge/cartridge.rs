use crate::cartridge::mapper::{Board, Mapper, Mirroring, RamAccess};

// Memory size constants
const CHR_RAM_SIZE: usize = 8192; // 8KB
const PRG_RAM_SIZE: usize = 8192; // 8KB

/// A cartridge: PRG/CHR images plus the bank and IRQ registers of its board.
///
/// The machine holds the cartridge by value and can swap it out between ticks.
/// Addresses beyond the extent of a ROM or RAM wrap to its size.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Cartridge {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    prg_ram: Vec<u8>,
    battery: bool,
    mirroring: Mirroring,
    mapper: Mapper,
}

impl Cartridge {
    /// Build a cartridge from its parts. An empty `chr_rom` means 8KB of CHR-RAM.
    pub fn new(
        mapper_id: u8,
        prg_rom: Vec<u8>,
        chr_rom: Vec<u8>,
        mirroring: Mirroring,
        battery: bool,
    ) -> Self {
        let chr_is_ram = chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0; CHR_RAM_SIZE]
        } else {
            chr_rom
        };

        Self {
            mapper: Mapper::new(mapper_id, prg_rom.len()),
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: vec![0; PRG_RAM_SIZE],
            battery,
            mirroring,
        }
    }

    /// Parse an iNES image
    pub fn from_ines(data: &[u8]) -> std::io::Result<Self> {
        crate::cartridge::ines::parse(data)
    }

    pub fn mapper_id(&self) -> u8 {
        self.mapper.id()
    }

    /// CPU read in $4020-$FFFF. `None` means nothing drives the bus.
    pub fn cpu_read(&self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => match self.mapper.prg_ram_access() {
                RamAccess::Disabled => None,
                _ => Some(self.prg_ram[(addr & 0x1FFF) as usize]),
            },
            0x8000..=0xFFFF => {
                if self.prg_rom.is_empty() {
                    return None;
                }
                let offset = self.mapper.prg_offset(addr) % self.prg_rom.len();
                Some(self.prg_rom[offset])
            }
            _ => None,
        }
    }

    /// CPU write in $4020-$FFFF. `cpu_cycle` lets boards detect back-to-back writes.
    pub fn cpu_write(&mut self, addr: u16, value: u8, cpu_cycle: u64) {
        match addr {
            0x6000..=0x7FFF => {
                if self.mapper.prg_ram_access() == RamAccess::ReadWrite {
                    self.prg_ram[(addr & 0x1FFF) as usize] = value;
                }
            }
            0x8000..=0xFFFF => self.mapper.write_register(addr, value, cpu_cycle),
            _ => {}
        }
    }

    /// PPU read in $0000-$1FFF
    pub fn chr_read(&self, addr: u16) -> u8 {
        let offset = self.mapper.chr_offset(addr) % self.chr.len();
        self.chr[offset]
    }

    /// PPU write in $0000-$1FFF; ignored for CHR ROM
    pub fn chr_write(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let offset = self.mapper.chr_offset(addr) % self.chr.len();
            self.chr[offset] = value;
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring(self.mirroring)
    }

    /// Notify the board of the address currently on the PPU bus
    pub fn ppu_address(&mut self, addr: u16, ppu_cycle: u64) {
        self.mapper.ppu_address(addr, ppu_cycle);
    }

    /// Check the memory images a restored snapshot brought along
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.chr.is_empty() {
            return Err("cartridge has no CHR memory");
        }
        if self.prg_ram.len() != PRG_RAM_SIZE {
            return Err("PRG RAM size mismatch");
        }
        Ok(())
    }

    pub fn irq(&self) -> bool {
        self.mapper.irq()
    }

    /// Battery-backed work RAM, if the board has a battery
    pub fn battery_ram(&self) -> Option<&[u8]> {
        self.battery.then_some(self.prg_ram.as_slice())
    }

    /// Restore battery-backed RAM; a blob of the wrong size restores the common prefix
    pub fn restore_battery_ram(&mut self, data: &[u8]) {
        if self.battery {
            let len = data.len().min(self.prg_ram.len());
            self.prg_ram[..len].copy_from_slice(&data[..len]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prg_with_bank_markers(banks_16k: usize) -> Vec<u8> {
        let mut prg = vec![0; banks_16k * 0x4000];
        for (bank, chunk) in prg.chunks_mut(0x4000).enumerate() {
            chunk.fill(bank as u8 + 1);
        }
        prg
    }

    #[test]
    fn test_nrom_128_mirrors_prg() {
        let cart = Cartridge::new(0, prg_with_bank_markers(1), vec![0; 0x2000], Mirroring::Horizontal, false);
        assert_eq!(cart.cpu_read(0x8000), Some(1));
        assert_eq!(cart.cpu_read(0xC000), Some(1));
    }

    #[test]
    fn test_chr_ram_when_no_chr_rom() {
        let mut cart = Cartridge::new(0, vec![0; 0x4000], Vec::new(), Mirroring::Vertical, false);
        cart.chr_write(0x0123, 0x5A);
        assert_eq!(cart.chr_read(0x0123), 0x5A);
    }

    #[test]
    fn test_chr_rom_is_read_only() {
        let mut cart = Cartridge::new(0, vec![0; 0x4000], vec![0x11; 0x2000], Mirroring::Vertical, false);
        cart.chr_write(0x0123, 0x5A);
        assert_eq!(cart.chr_read(0x0123), 0x11);
    }

    #[test]
    fn test_prg_ram_read_write() {
        let mut cart = Cartridge::new(0, vec![0; 0x4000], Vec::new(), Mirroring::Vertical, false);
        cart.cpu_write(0x6000, 0x42, 0);
        assert_eq!(cart.cpu_read(0x6000), Some(0x42));
        assert_eq!(cart.cpu_read(0x5000), None);
    }

    #[test]
    fn test_battery_ram_only_with_battery() {
        let cart = Cartridge::new(0, vec![0; 0x4000], Vec::new(), Mirroring::Vertical, false);
        assert!(cart.battery_ram().is_none());

        let mut cart = Cartridge::new(1, vec![0; 0x8000], Vec::new(), Mirroring::Vertical, true);
        cart.restore_battery_ram(&[1, 2, 3]);
        let ram = cart.battery_ram().unwrap();
        assert_eq!(ram.len(), PRG_RAM_SIZE);
        assert_eq!(&ram[..4], &[1, 2, 3, 0]);
    }

    #[test]
    fn test_uxrom_bank_switch_through_cartridge() {
        let mut cart = Cartridge::new(2, prg_with_bank_markers(4), Vec::new(), Mirroring::Vertical, false);
        assert_eq!(cart.cpu_read(0x8000), Some(1));
        assert_eq!(cart.cpu_read(0xC000), Some(4));
        cart.cpu_write(0x8000, 2, 0);
        assert_eq!(cart.cpu_read(0x8000), Some(3));
    }

    #[test]
    fn test_out_of_range_bank_wraps() {
        let mut cart = Cartridge::new(2, prg_with_bank_markers(4), Vec::new(), Mirroring::Vertical, false);
        cart.cpu_write(0x8000, 6, 0);
        assert_eq!(cart.cpu_read(0x8000), Some(3));
    }

    #[test]
    fn test_axrom_overrides_mirroring() {
        let mut cart = Cartridge::new(7, vec![0; 0x8000], Vec::new(), Mirroring::Vertical, false);
        assert_eq!(cart.mirroring(), Mirroring::SingleScreenLower);
        cart.cpu_write(0x8000, 0x10, 0);
        assert_eq!(cart.mirroring(), Mirroring::SingleScreenUpper);
    }
}
