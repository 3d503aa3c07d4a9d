use crate::cartridge::{Axrom, Cnrom, Mmc1, Mmc3, Nrom, Uxrom};
use tracing::warn;

// Bank window sizes shared by the boards
pub(crate) const PRG_BANK_32K: usize = 0x8000;
pub(crate) const PRG_BANK_16K: usize = 0x4000;
pub(crate) const PRG_BANK_8K: usize = 0x2000;
pub(crate) const CHR_BANK_8K: usize = 0x2000;
pub(crate) const CHR_BANK_4K: usize = 0x1000;
pub(crate) const CHR_BANK_1K: usize = 0x0400;

/// Nametable mirroring arrangement
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum Mirroring {
    /// $2000/$2400 share the first table, $2800/$2C00 the second
    Horizontal,
    /// $2000/$2800 share the first table, $2400/$2C00 the second
    Vertical,
    /// All four nametables map to the first table
    SingleScreenLower,
    /// All four nametables map to the second table
    SingleScreenUpper,
    /// Four independent tables (extra VRAM on the board)
    FourScreen,
}

impl Mirroring {
    /// Map a PPU nametable address ($2000-$3EFF) to an offset in 4 KiB of VRAM
    pub fn vram_offset(self, addr: u16) -> usize {
        let index = (addr & 0x0FFF) as usize;
        let table = index / 0x400;
        let offset = index % 0x400;
        let physical = match self {
            Mirroring::Horizontal => table >> 1,
            Mirroring::Vertical => table & 1,
            Mirroring::SingleScreenLower => 0,
            Mirroring::SingleScreenUpper => 1,
            Mirroring::FourScreen => table,
        };
        physical * 0x400 + offset
    }
}

/// Access rights to the $6000-$7FFF work RAM as programmed on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamAccess {
    ReadWrite,
    ReadOnly,
    Disabled,
}

/// Uniform capability implemented by every board variant.
///
/// Offsets returned by `prg_offset`/`chr_offset` are unmasked; the cartridge wraps
/// them to the size of the ROM/RAM actually present.
pub trait Board {
    /// Byte offset into PRG ROM for a CPU address in $8000-$FFFF
    fn prg_offset(&self, addr: u16) -> usize;

    /// Byte offset into CHR memory for a PPU address in $0000-$1FFF
    fn chr_offset(&self, addr: u16) -> usize {
        (addr & 0x1FFF) as usize
    }

    /// CPU store to $8000-$FFFF. `cpu_cycle` is the CPU cycle of the write.
    fn write_register(&mut self, addr: u16, value: u8, cpu_cycle: u64);

    /// Current mirroring; `wired` is the solder-pad setting from the header
    fn mirroring(&self, wired: Mirroring) -> Mirroring {
        wired
    }

    fn prg_ram_access(&self) -> RamAccess {
        RamAccess::ReadWrite
    }

    /// The PPU drove `addr` onto its address bus during PPU cycle `ppu_cycle`
    fn ppu_address(&mut self, _addr: u16, _ppu_cycle: u64) {}

    /// True while the board holds the IRQ line
    fn irq(&self) -> bool {
        false
    }
}

/// Closed set of supported boards, selected once at load time
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub enum Mapper {
    Nrom(Nrom),
    Mmc1(Mmc1),
    Uxrom(Uxrom),
    Cnrom(Cnrom),
    Mmc3(Mmc3),
    Axrom(Axrom),
}

macro_rules! dispatch {
    ($self:expr, $board:ident => $body:expr) => {
        match $self {
            Mapper::Nrom($board) => $body,
            Mapper::Mmc1($board) => $body,
            Mapper::Uxrom($board) => $body,
            Mapper::Cnrom($board) => $body,
            Mapper::Mmc3($board) => $body,
            Mapper::Axrom($board) => $body,
        }
    };
}

impl Mapper {
    /// Build the board for an iNES mapper id. Unsupported ids fall back to NROM.
    pub fn new(id: u8, prg_len: usize) -> Self {
        match id {
            0 => Mapper::Nrom(Nrom::new()),
            1 => Mapper::Mmc1(Mmc1::new(prg_len)),
            2 => Mapper::Uxrom(Uxrom::new(prg_len)),
            3 => Mapper::Cnrom(Cnrom::new()),
            4 => Mapper::Mmc3(Mmc3::new(prg_len)),
            7 => Mapper::Axrom(Axrom::new()),
            _ => {
                warn!(mapper = id, "unsupported mapper, falling back to NROM");
                Mapper::Nrom(Nrom::new())
            }
        }
    }

    /// iNES id of the board actually emulated
    pub fn id(&self) -> u8 {
        match self {
            Mapper::Nrom(_) => 0,
            Mapper::Mmc1(_) => 1,
            Mapper::Uxrom(_) => 2,
            Mapper::Cnrom(_) => 3,
            Mapper::Mmc3(_) => 4,
            Mapper::Axrom(_) => 7,
        }
    }
}

impl Board for Mapper {
    fn prg_offset(&self, addr: u16) -> usize {
        dispatch!(self, board => board.prg_offset(addr))
    }

    fn chr_offset(&self, addr: u16) -> usize {
        dispatch!(self, board => board.chr_offset(addr))
    }

    fn write_register(&mut self, addr: u16, value: u8, cpu_cycle: u64) {
        dispatch!(self, board => board.write_register(addr, value, cpu_cycle))
    }

    fn mirroring(&self, wired: Mirroring) -> Mirroring {
        dispatch!(self, board => board.mirroring(wired))
    }

    fn prg_ram_access(&self) -> RamAccess {
        dispatch!(self, board => board.prg_ram_access())
    }

    fn ppu_address(&mut self, addr: u16, ppu_cycle: u64) {
        dispatch!(self, board => board.ppu_address(addr, ppu_cycle))
    }

    fn irq(&self) -> bool {
        dispatch!(self, board => board.irq())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_mirroring_offsets() {
        let m = Mirroring::Horizontal;
        assert_eq!(m.vram_offset(0x2000), 0x000);
        assert_eq!(m.vram_offset(0x2400), 0x000);
        assert_eq!(m.vram_offset(0x2800), 0x400);
        assert_eq!(m.vram_offset(0x2C00), 0x400);
    }

    #[test]
    fn test_vertical_mirroring_offsets() {
        let m = Mirroring::Vertical;
        assert_eq!(m.vram_offset(0x2000), 0x000);
        assert_eq!(m.vram_offset(0x2400), 0x400);
        assert_eq!(m.vram_offset(0x2800), 0x000);
        assert_eq!(m.vram_offset(0x2C05), 0x405);
    }

    #[test]
    fn test_single_and_four_screen_offsets() {
        assert_eq!(Mirroring::SingleScreenLower.vram_offset(0x2C10), 0x010);
        assert_eq!(Mirroring::SingleScreenUpper.vram_offset(0x2010), 0x410);
        assert_eq!(Mirroring::FourScreen.vram_offset(0x2C10), 0xC10);
    }

    #[test]
    fn test_mirror_of_3000_region() {
        // $3000-$3EFF mirrors $2000-$2EFF
        assert_eq!(
            Mirroring::Vertical.vram_offset(0x3123),
            Mirroring::Vertical.vram_offset(0x2123)
        );
    }

    #[test]
    fn test_unknown_mapper_falls_back_to_nrom() {
        let mapper = Mapper::new(99, 0x8000);
        assert_eq!(mapper.id(), 0);
    }

    #[test]
    fn test_known_mapper_ids() {
        for id in [0u8, 1, 2, 3, 4, 7] {
            assert_eq!(Mapper::new(id, 0x20000).id(), id);
        }
    }
}
