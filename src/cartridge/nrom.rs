use crate::cartridge::mapper::Board;

/// NROM board (Mapper 0)
///
/// No bank switching at all.
/// Supports:
/// - 16KB PRG ROM mirrored at $8000 and $C000, or 32KB at $8000-$FFFF
/// - 8KB CHR ROM or CHR-RAM
/// - Mirroring fixed by solder pads
///
/// Also the fallback for every unsupported board id.
///
/// Used in games like Super Mario Bros., Donkey Kong, Balloon Fight.
#[derive(Debug, Clone, Default, bincode::Encode, bincode::Decode)]
pub struct Nrom;

impl Nrom {
    pub fn new() -> Self {
        Self
    }
}

impl Board for Nrom {
    fn prg_offset(&self, addr: u16) -> usize {
        // The cartridge wraps this to 16KB on NROM-128
        (addr & 0x7FFF) as usize
    }

    fn write_register(&mut self, _addr: u16, _value: u8, _cpu_cycle: u64) {}
}
