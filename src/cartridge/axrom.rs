use crate::cartridge::mapper::{Board, Mirroring, PRG_BANK_32K};

/// AxROM board (Mapper 7)
///
/// 32KB PRG banking with software-selected single-screen mirroring.
/// Supports:
/// - 32KB switchable PRG bank at $8000-$FFFF (bits 0-2)
/// - Nametable select (bit 4): lower or upper single-screen
/// - 8KB CHR-RAM
///
/// Used in games like Battletoads, Marble Madness, Wizards & Warriors.
#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct Axrom {
    bank_select: u8,
}

impl Axrom {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Board for Axrom {
    fn prg_offset(&self, addr: u16) -> usize {
        (self.bank_select & 0x07) as usize * PRG_BANK_32K + (addr & 0x7FFF) as usize
    }

    fn write_register(&mut self, _addr: u16, value: u8, _cpu_cycle: u64) {
        self.bank_select = value;
    }

    fn mirroring(&self, _wired: Mirroring) -> Mirroring {
        if self.bank_select & 0x10 != 0 {
            Mirroring::SingleScreenUpper
        } else {
            Mirroring::SingleScreenLower
        }
    }
}
