use crate::cartridge::{Cartridge, Mirroring};

/// Nametable RAM inside the console (4 KiB so four-screen boards need no extra storage)
const VRAM_SIZE: usize = 4096;

/// What the PPU sees of the cartridge: pattern memory, the mirroring wiring
/// and the address lines that mapper IRQ counters listen to.
pub trait VideoBus {
    /// Read from pattern memory ($0000-$1FFF)
    fn chr_read(&self, addr: u16) -> u8;
    /// Write to pattern memory ($0000-$1FFF)
    fn chr_write(&mut self, addr: u16, value: u8);
    fn mirroring(&self) -> Mirroring;
    /// Address placed on the PPU bus during `ppu_cycle`
    fn ppu_address(&mut self, addr: u16, ppu_cycle: u64);
}

impl VideoBus for Cartridge {
    fn chr_read(&self, addr: u16) -> u8 {
        Cartridge::chr_read(self, addr)
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        Cartridge::chr_write(self, addr, value);
    }

    fn mirroring(&self) -> Mirroring {
        Cartridge::mirroring(self)
    }

    fn ppu_address(&mut self, addr: u16, ppu_cycle: u64) {
        Cartridge::ppu_address(self, addr, ppu_cycle);
    }
}

/// Empty cartridge slot: pattern reads float to 0
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySlot;

impl VideoBus for EmptySlot {
    fn chr_read(&self, _addr: u16) -> u8 {
        0
    }

    fn chr_write(&mut self, _addr: u16, _value: u8) {}

    fn mirroring(&self) -> Mirroring {
        Mirroring::Horizontal
    }

    fn ppu_address(&mut self, _addr: u16, _ppu_cycle: u64) {}
}

/// Manages PPU memory: nametable RAM and palette RAM.
/// Pattern memory lives on the cartridge and is reached through a `VideoBus`.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Memory {
    /// Nametables - 4KB (supports all four nametables for FourScreen mode)
    vram: Vec<u8>,
    /// Palette RAM - 32 bytes, 6 bits each
    palette: [u8; 32],
}

impl Memory {
    pub fn new() -> Self {
        Self {
            vram: vec![0; VRAM_SIZE],
            palette: [0; 32],
        }
    }

    /// Read anywhere in the 14-bit PPU address space
    pub fn read<V: VideoBus>(&self, addr: u16, video: &V) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => video.chr_read(addr),
            0x2000..=0x3EFF => self.vram[video.mirroring().vram_offset(addr)],
            _ => self.read_palette(addr),
        }
    }

    /// Write anywhere in the 14-bit PPU address space
    pub fn write<V: VideoBus>(&mut self, addr: u16, value: u8, video: &mut V) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => video.chr_write(addr, value),
            0x2000..=0x3EFF => self.vram[video.mirroring().vram_offset(addr)] = value,
            _ => self.write_palette(addr, value),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.vram.len() == VRAM_SIZE
    }

    /// Read from palette at the specified address (with mirroring)
    pub fn read_palette(&self, addr: u16) -> u8 {
        self.palette[Self::palette_index(addr)]
    }

    /// Write to palette at the specified address (with mirroring)
    /// Palette RAM only stores 6 bits (0-5), bits 6-7 are ignored
    pub fn write_palette(&mut self, addr: u16, value: u8) {
        self.palette[Self::palette_index(addr)] = value & 0x3F;
    }

    /// Addresses $3F10, $3F14, $3F18, $3F1C mirror to $3F00, $3F04, $3F08, $3F0C
    fn palette_index(addr: u16) -> usize {
        let offset = (addr & 0x1F) as usize;
        if offset & 0x13 == 0x10 {
            offset & 0x0F
        } else {
            offset
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8 KiB of pattern RAM with a selectable mirroring
    struct TestVideo {
        chr: Vec<u8>,
        mirroring: Mirroring,
    }

    impl TestVideo {
        fn new(mirroring: Mirroring) -> Self {
            Self {
                chr: vec![0; 0x2000],
                mirroring,
            }
        }
    }

    impl VideoBus for TestVideo {
        fn chr_read(&self, addr: u16) -> u8 {
            self.chr[addr as usize]
        }

        fn chr_write(&mut self, addr: u16, value: u8) {
            self.chr[addr as usize] = value;
        }

        fn mirroring(&self) -> Mirroring {
            self.mirroring
        }

        fn ppu_address(&mut self, _addr: u16, _ppu_cycle: u64) {}
    }

    #[test]
    fn test_palette_read_write() {
        let mut mem = Memory::new();
        mem.write_palette(0x3F00, 0x42);
        // Palette RAM only stores 6 bits (0x42 & 0x3F = 0x02)
        assert_eq!(mem.read_palette(0x3F00), 0x02);
    }

    #[test]
    fn test_palette_mirroring() {
        let mut mem = Memory::new();
        mem.write_palette(0x3F00, 0x21);
        mem.write_palette(0x3F14, 0x15);
        assert_eq!(mem.read_palette(0x3F10), 0x21);
        assert_eq!(mem.read_palette(0x3F04), 0x15);
        // $3F20-$3FFF repeat the 32 entries
        assert_eq!(mem.read_palette(0x3FE0), 0x21);
        // $3F11 is not a mirror
        mem.write_palette(0x3F11, 0x05);
        assert_eq!(mem.read_palette(0x3F01), 0x00);
    }

    #[test]
    fn test_vertical_mirroring() {
        let mut mem = Memory::new();
        let mut video = TestVideo::new(Mirroring::Vertical);
        mem.write(0x2000, 0x11, &mut video);
        mem.write(0x2400, 0x22, &mut video);
        assert_eq!(mem.read(0x2800, &video), 0x11);
        assert_eq!(mem.read(0x2C00, &video), 0x22);
    }

    #[test]
    fn test_horizontal_mirroring() {
        let mut mem = Memory::new();
        let mut video = TestVideo::new(Mirroring::Horizontal);
        mem.write(0x2000, 0x22, &mut video);
        assert_eq!(mem.read(0x2400, &video), 0x22);
        assert_ne!(mem.read(0x2800, &video), 0x22);
    }

    #[test]
    fn test_four_screen_mirroring() {
        let mut mem = Memory::new();
        let mut video = TestVideo::new(Mirroring::FourScreen);
        for (i, addr) in [0x2000u16, 0x2400, 0x2800, 0x2C00].into_iter().enumerate() {
            mem.write(addr, i as u8 + 1, &mut video);
        }
        assert_eq!(mem.read(0x2000, &video), 1);
        assert_eq!(mem.read(0x2400, &video), 2);
        assert_eq!(mem.read(0x2800, &video), 3);
        assert_eq!(mem.read(0x2C00, &video), 4);
    }

    #[test]
    fn test_mirroring_3000_to_2000() {
        let mut mem = Memory::new();
        let mut video = TestVideo::new(Mirroring::Horizontal);
        mem.write(0x2000, 0x33, &mut video);
        assert_eq!(mem.read(0x3000, &video), 0x33);
    }

    #[test]
    fn test_pattern_access_goes_to_video_bus() {
        let mut mem = Memory::new();
        let mut video = TestVideo::new(Mirroring::Horizontal);
        mem.write(0x1FFF, 0xCC, &mut video);
        assert_eq!(video.chr[0x1FFF], 0xCC);
        assert_eq!(mem.read(0x1FFF, &video), 0xCC);
    }

    #[test]
    fn test_empty_slot_reads_zero() {
        let mem = Memory::new();
        assert_eq!(mem.read(0x0123, &EmptySlot), 0);
    }
}
