use crate::cartridge::mapper::{Board, CHR_BANK_1K, Mirroring, PRG_BANK_8K, RamAccess};

// A12 must stay low this many PPU cycles before a rise clocks the counter
const A12_FILTER_CYCLES: u64 = 10;

/// MMC3 board (Mapper 4)
///
/// Fine-grained banking plus a scanline counter clocked by PPU address line A12.
/// Supports:
/// - PRG ROM: two switchable 8KB banks, one fixed to the second-last bank, last bank fixed
/// - CHR: two 2KB and four 1KB switchable banks, halves swappable
/// - PRG RAM: 8KB at $6000-$7FFF with enable/write-protect
/// - Mirroring: horizontal/vertical unless the board is wired for four-screen
/// - IRQ counter: reloaded from the latch or decremented on each filtered A12 rise
///
/// Registers (even/odd address pairs):
/// - $8000/$8001: bank select / bank data
/// - $A000/$A001: mirroring / PRG RAM protect
/// - $C000/$C001: IRQ latch / IRQ reload
/// - $E000/$E001: IRQ disable+acknowledge / IRQ enable
///
/// Used in games like Super Mario Bros. 3, Kirby's Adventure, Mega Man 3-6.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Mmc3 {
    bank_select: u8,
    registers: [u8; 8],
    horizontal: bool,
    ram_protect: u8,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,

    a12_high: bool,
    a12_low_since: u64,

    second_last_bank: usize,
}

impl Mmc3 {
    pub fn new(prg_len: usize) -> Self {
        Self {
            bank_select: 0,
            registers: [0, 2, 4, 5, 6, 7, 0, 1],
            horizontal: false,
            ram_protect: 0x80,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            a12_high: false,
            a12_low_since: 0,
            second_last_bank: (prg_len / PRG_BANK_8K).saturating_sub(2),
        }
    }

    fn clock_irq_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }

        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }
}

impl Board for Mmc3 {
    fn prg_offset(&self, addr: u16) -> usize {
        let prg_mode = self.bank_select & 0x40 != 0;
        let bank = match (addr >> 13) & 0x03 {
            0 if prg_mode => self.second_last_bank,
            0 => self.registers[6] as usize,
            1 => self.registers[7] as usize,
            2 if prg_mode => self.registers[6] as usize,
            2 => self.second_last_bank,
            _ => self.second_last_bank + 1,
        };
        bank * PRG_BANK_8K + (addr & 0x1FFF) as usize
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let addr = if self.bank_select & 0x80 != 0 {
            addr ^ 0x1000
        } else {
            addr
        };
        let bank = match (addr >> 10) & 0x07 {
            0 => self.registers[0] & 0xFE,
            1 => self.registers[0] | 0x01,
            2 => self.registers[1] & 0xFE,
            3 => self.registers[1] | 0x01,
            slot => self.registers[slot as usize - 2],
        };
        bank as usize * CHR_BANK_1K + (addr & 0x03FF) as usize
    }

    fn write_register(&mut self, addr: u16, value: u8, _cpu_cycle: u64) {
        let odd = addr & 0x01 != 0;
        match (addr & 0xE000, odd) {
            (0x8000, false) => self.bank_select = value,
            (0x8000, true) => self.registers[(self.bank_select & 0x07) as usize] = value,
            (0xA000, false) => self.horizontal = value & 0x01 != 0,
            (0xA000, true) => self.ram_protect = value,
            (0xC000, false) => self.irq_latch = value,
            (0xC000, true) => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            (0xE000, false) => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            _ => self.irq_enabled = true,
        }
    }

    fn mirroring(&self, wired: Mirroring) -> Mirroring {
        if wired == Mirroring::FourScreen {
            wired
        } else if self.horizontal {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    fn prg_ram_access(&self) -> RamAccess {
        match self.ram_protect & 0xC0 {
            0x80 => RamAccess::ReadWrite,
            0xC0 => RamAccess::ReadOnly,
            _ => RamAccess::Disabled,
        }
    }

    fn ppu_address(&mut self, addr: u16, ppu_cycle: u64) {
        let high = addr & 0x1000 != 0;
        if high && !self.a12_high {
            if ppu_cycle.saturating_sub(self.a12_low_since) >= A12_FILTER_CYCLES {
                self.clock_irq_counter();
            }
        } else if !high && self.a12_high {
            self.a12_low_since = ppu_cycle;
        }
        self.a12_high = high;
    }

    fn irq(&self) -> bool {
        self.irq_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mmc3() -> Mmc3 {
        Mmc3::new(32 * PRG_BANK_8K)
    }

    /// Drive A12 low then high, far enough apart to pass the filter
    fn scanline(mmc3: &mut Mmc3, cycle: &mut u64) {
        mmc3.ppu_address(0x0000, *cycle);
        *cycle += 20;
        mmc3.ppu_address(0x1000, *cycle);
        *cycle += 20;
    }

    #[test]
    fn test_prg_mode_0_layout() {
        let mut mmc3 = mmc3();
        mmc3.write_register(0x8000, 6, 0);
        mmc3.write_register(0x8001, 3, 0);
        mmc3.write_register(0x8000, 7, 0);
        mmc3.write_register(0x8001, 9, 0);
        assert_eq!(mmc3.prg_offset(0x8000), 3 * PRG_BANK_8K);
        assert_eq!(mmc3.prg_offset(0xA000), 9 * PRG_BANK_8K);
        assert_eq!(mmc3.prg_offset(0xC000), 30 * PRG_BANK_8K);
        assert_eq!(mmc3.prg_offset(0xE000), 31 * PRG_BANK_8K);
    }

    #[test]
    fn test_prg_mode_1_swaps_8000_and_c000() {
        let mut mmc3 = mmc3();
        mmc3.write_register(0x8000, 0x46, 0);
        mmc3.write_register(0x8001, 3, 0);
        assert_eq!(mmc3.prg_offset(0x8000), 30 * PRG_BANK_8K);
        assert_eq!(mmc3.prg_offset(0xC000), 3 * PRG_BANK_8K);
    }

    #[test]
    fn test_chr_inversion() {
        let mut mmc3 = mmc3();
        mmc3.write_register(0x8000, 0x00, 0);
        mmc3.write_register(0x8001, 0x09, 0); // R0, low bit ignored
        mmc3.write_register(0x8000, 0x02, 0);
        mmc3.write_register(0x8001, 0x20, 0); // R2
        assert_eq!(mmc3.chr_offset(0x0000), 8 * CHR_BANK_1K);
        assert_eq!(mmc3.chr_offset(0x0400), 9 * CHR_BANK_1K);
        assert_eq!(mmc3.chr_offset(0x1000), 0x20 * CHR_BANK_1K);

        mmc3.write_register(0x8000, 0x80, 0);
        assert_eq!(mmc3.chr_offset(0x0000), 0x20 * CHR_BANK_1K);
        assert_eq!(mmc3.chr_offset(0x1400), 9 * CHR_BANK_1K);
    }

    #[test]
    fn test_mirroring_register() {
        let mut mmc3 = mmc3();
        mmc3.write_register(0xA000, 1, 0);
        assert_eq!(mmc3.mirroring(Mirroring::Vertical), Mirroring::Horizontal);
        mmc3.write_register(0xA000, 0, 0);
        assert_eq!(mmc3.mirroring(Mirroring::Horizontal), Mirroring::Vertical);
        assert_eq!(
            mmc3.mirroring(Mirroring::FourScreen),
            Mirroring::FourScreen
        );
    }

    #[test]
    fn test_irq_after_latch_scanlines() {
        let mut mmc3 = mmc3();
        let mut cycle = 100;
        mmc3.write_register(0xC000, 3, 0);
        mmc3.write_register(0xC001, 0, 0);
        mmc3.write_register(0xE001, 0, 0);

        scanline(&mut mmc3, &mut cycle); // reload to 3
        scanline(&mut mmc3, &mut cycle); // 2
        scanline(&mut mmc3, &mut cycle); // 1
        assert!(!mmc3.irq());
        scanline(&mut mmc3, &mut cycle); // 0
        assert!(mmc3.irq());

        mmc3.write_register(0xE000, 0, 0);
        assert!(!mmc3.irq());
    }

    #[test]
    fn test_latch_zero_reload_fires_on_first_rise() {
        let mut mmc3 = mmc3();
        mmc3.write_register(0xC000, 0, 0);
        mmc3.write_register(0xC001, 0, 0);
        mmc3.write_register(0xE001, 0, 0);

        mmc3.ppu_address(0x0000, 40);
        assert!(!mmc3.irq());
        mmc3.ppu_address(0x1000, 60);
        assert!(mmc3.irq());
    }

    #[test]
    fn test_a12_filter_ignores_short_low_pulses() {
        let mut mmc3 = mmc3();
        let mut cycle = 100;
        mmc3.write_register(0xC000, 5, 0);
        mmc3.write_register(0xC001, 0, 0);
        scanline(&mut mmc3, &mut cycle);
        assert_eq!(mmc3.irq_counter, 5);

        // Sprite fetches toggle A12 every few cycles
        for _ in 0..8 {
            mmc3.ppu_address(0x2000, cycle);
            cycle += 4;
            mmc3.ppu_address(0x1000, cycle);
            cycle += 4;
        }
        assert_eq!(mmc3.irq_counter, 5);
    }

    #[test]
    fn test_prg_ram_protect() {
        let mut mmc3 = mmc3();
        assert_eq!(mmc3.prg_ram_access(), RamAccess::ReadWrite);
        mmc3.write_register(0xA001, 0xC0, 0);
        assert_eq!(mmc3.prg_ram_access(), RamAccess::ReadOnly);
        mmc3.write_register(0xA001, 0x00, 0);
        assert_eq!(mmc3.prg_ram_access(), RamAccess::Disabled);
    }
}
