use crate::cartridge::mapper::{Board, PRG_BANK_16K};

/// UxROM board (Mapper 2)
///
/// PRG banking mapper with switchable lower bank and fixed upper bank.
/// Supports:
/// - 16KB switchable PRG bank at $8000-$BFFF
/// - 16KB fixed PRG bank at $C000-$FFFF (always last bank)
/// - 8KB CHR-RAM (no CHR banking)
/// - Bank select register at $8000-$FFFF (any write)
///
/// Common in games like Mega Man, Castlevania, Contra, Duck Tales, Metal Gear.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Uxrom {
    bank_select: u8,
    last_bank: usize,
}

impl Uxrom {
    pub fn new(prg_len: usize) -> Self {
        Self {
            bank_select: 0,
            last_bank: (prg_len / PRG_BANK_16K).saturating_sub(1),
        }
    }
}

impl Board for Uxrom {
    fn prg_offset(&self, addr: u16) -> usize {
        let bank = if addr < 0xC000 {
            self.bank_select as usize
        } else {
            self.last_bank
        };
        bank * PRG_BANK_16K + (addr & 0x3FFF) as usize
    }

    fn write_register(&mut self, _addr: u16, value: u8, _cpu_cycle: u64) {
        self.bank_select = value & 0x0F;
    }
}
