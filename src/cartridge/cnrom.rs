use crate::cartridge::mapper::{Board, CHR_BANK_8K};

/// CNROM board (Mapper 3)
///
/// Fixed PRG with switchable 8KB CHR ROM banks.
/// Supports:
/// - 16KB or 32KB PRG ROM, not switchable
/// - 8KB switchable CHR ROM bank at PPU $0000-$1FFF
/// - Bank select register at $8000-$FFFF (any write)
///
/// Used in games like Arkanoid, Gradius, Solomon's Key.
#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct Cnrom {
    chr_bank: u8,
}

impl Cnrom {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Board for Cnrom {
    fn prg_offset(&self, addr: u16) -> usize {
        (addr & 0x7FFF) as usize
    }

    fn chr_offset(&self, addr: u16) -> usize {
        self.chr_bank as usize * CHR_BANK_8K + (addr & 0x1FFF) as usize
    }

    fn write_register(&mut self, _addr: u16, value: u8, _cpu_cycle: u64) {
        self.chr_bank = value;
    }
}
