use crate::cartridge::mapper::{
    Board, CHR_BANK_4K, CHR_BANK_8K, Mirroring, PRG_BANK_16K, PRG_BANK_32K, RamAccess,
};

const MMC1_SHIFT_REGISTER_RESET: u8 = 0x80; // Bit 7 set triggers reset
const MMC1_WRITE_COUNT_MAX: u8 = 5; // Number of writes to load a register
const MMC1_DEFAULT_CONTROL: u8 = 0x0C; // PRG mode 3, CHR mode 0

/// MMC1 board (Mapper 1)
///
/// One of the most common NES mappers with sophisticated banking capabilities.
/// Supports:
/// - PRG ROM: Switchable 16KB or 32KB banks
/// - PRG RAM: 8KB at $6000-$7FFF, disabled by bit 4 of the PRG bank register
/// - CHR: Switchable 4KB or 8KB banks (or CHR-RAM if no CHR ROM)
/// - Mirroring: Programmable (horizontal, vertical, one-screen)
/// - Serial shift register: 5-bit values loaded via sequential writes
///
/// Register loading mechanism:
/// - Write to $8000-$FFFF with bit 0 containing the next bit
/// - After 5 writes, the 5-bit value is loaded into the target register
/// - Writing with bit 7 set resets the shift register and sets control to mode 3
/// - A write on the CPU cycle right after another write is ignored. Read-modify-write
///   instructions rely on this: only their first (dummy) store reaches the board.
///
/// Registers (selected by address):
/// - $8000-$9FFF: Control (mirroring, PRG mode, CHR mode)
/// - $A000-$BFFF: CHR bank 0 (4KB at $0000 or 8KB at $0000)
/// - $C000-$DFFF: CHR bank 1 (4KB at $1000)
/// - $E000-$FFFF: PRG bank (16KB switchable) + PRG RAM disable
///
/// Used in games like The Legend of Zelda, Metroid, Mega Man 2, Final Fantasy.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Mmc1 {
    // Shift register state
    shift_register: u8, // 5-bit shift register
    write_count: u8,    // Number of writes (0-4)
    last_write_cycle: u64,

    // Internal registers (5 bits each)
    control: u8,    // Mirroring and banking mode control
    chr_bank_0: u8, // CHR bank 0 select
    chr_bank_1: u8, // CHR bank 1 select
    prg_bank: u8,   // PRG bank select

    last_bank: usize,
}

impl Mmc1 {
    pub fn new(prg_len: usize) -> Self {
        Self {
            shift_register: 0,
            write_count: 0,
            last_write_cycle: u64::MAX - 1,
            control: MMC1_DEFAULT_CONTROL,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
            last_bank: (prg_len / PRG_BANK_16K).saturating_sub(1),
        }
    }

    fn reset_shift_register(&mut self) {
        self.shift_register = 0;
        self.write_count = 0;
        self.control |= MMC1_DEFAULT_CONTROL;
    }

    fn prg_mode(&self) -> u8 {
        (self.control >> 2) & 0x03
    }

    fn chr_mode(&self) -> u8 {
        (self.control >> 4) & 0x01
    }
}

impl Board for Mmc1 {
    fn prg_offset(&self, addr: u16) -> usize {
        let bank = (self.prg_bank & 0x0F) as usize;
        match self.prg_mode() {
            // 32KB mode: switch entire $8000-$FFFF, ignore low bit of bank number
            0 | 1 => (bank >> 1) * PRG_BANK_32K + (addr & 0x7FFF) as usize,
            _ => {
                let window = if addr < 0xC000 {
                    // Mode 2 fixes the first bank, mode 3 switches
                    if self.prg_mode() == 2 { 0 } else { bank }
                } else if self.prg_mode() == 2 {
                    bank
                } else {
                    self.last_bank
                };
                window * PRG_BANK_16K + (addr & 0x3FFF) as usize
            }
        }
    }

    fn chr_offset(&self, addr: u16) -> usize {
        if self.chr_mode() == 0 {
            // 8KB mode: ignore low bit
            (self.chr_bank_0 >> 1) as usize * CHR_BANK_8K + (addr & 0x1FFF) as usize
        } else {
            let bank = if addr < 0x1000 {
                self.chr_bank_0
            } else {
                self.chr_bank_1
            };
            bank as usize * CHR_BANK_4K + (addr & 0x0FFF) as usize
        }
    }

    fn write_register(&mut self, addr: u16, value: u8, cpu_cycle: u64) {
        let consecutive = cpu_cycle == self.last_write_cycle.wrapping_add(1);
        self.last_write_cycle = cpu_cycle;
        if consecutive {
            return;
        }

        if value & MMC1_SHIFT_REGISTER_RESET != 0 {
            self.reset_shift_register();
            return;
        }

        self.shift_register >>= 1;
        self.shift_register |= (value & 0x01) << 4;
        self.write_count += 1;

        if self.write_count == MMC1_WRITE_COUNT_MAX {
            let register_value = self.shift_register & 0x1F;
            match addr {
                0x8000..=0x9FFF => self.control = register_value,
                0xA000..=0xBFFF => self.chr_bank_0 = register_value,
                0xC000..=0xDFFF => self.chr_bank_1 = register_value,
                _ => self.prg_bank = register_value,
            }
            self.shift_register = 0;
            self.write_count = 0;
        }
    }

    fn mirroring(&self, _wired: Mirroring) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn prg_ram_access(&self) -> RamAccess {
        if self.prg_bank & 0x10 != 0 {
            RamAccess::Disabled
        } else {
            RamAccess::ReadWrite
        }
    }
}
