/// OAM attribute byte mask - bits 2-4 are unimplemented and always read as 0
/// Mask: 11100011 (0xE3) - preserves bits 7-5 (priority/palette) and 1-0 (flip bits)
pub const OAM_ATTRIBUTE_MASK: u8 = 0xE3;

/// Sprite slots per scanline
const SLOTS: usize = 8;
/// OAM rows of 8 bytes that can be overwritten by the row corruption
const OAM_ROWS: usize = 32;

/// Pattern data of one sprite slot, ready for the current scanline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
struct Slot {
    pattern_lo: u8,
    pattern_hi: u8,
    attributes: u8,
    x: u8,
}

/// A sprite pixel that is not transparent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpritePixel {
    /// Palette RAM index (16-31)
    pub palette_index: u8,
    /// Drawn behind opaque background pixels
    pub behind_background: bool,
    /// Produced by OAM sprite 0
    pub sprite_0: bool,
}

/// Manages OAM, sprite evaluation for the next scanline and the per-line sprite slots
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Sprites {
    /// OAM (Object Attribute Memory) - 256 bytes for sprite data
    oam: [u8; 256],
    /// Secondary OAM - 32 bytes for up to 8 sprites on the next scanline
    secondary_oam: [u8; 32],

    /// Byte last read by the evaluation logic, visible through $2004 while rendering
    copy_buffer: u8,
    /// Sprite index (OAMADDR bits 2-7) during evaluation
    addr_h: u8,
    /// Byte within the sprite (OAMADDR bits 0-1) during evaluation
    addr_l: u8,
    secondary_addr: u8,
    in_range: bool,
    copy_done: bool,
    overflow_bug_counter: u8,
    sprite_0_added: bool,
    /// Result of the last evaluation
    found: u8,
    next_has_sprite_0: bool,

    /// Slots being drawn on the current scanline
    slots: [Slot; SLOTS],
    count: u8,
    has_sprite_0: bool,

    /// Rows to be overwritten by row 0 when rendering resumes
    corrupt_rows: [bool; OAM_ROWS],
}

impl Sprites {
    pub fn new() -> Self {
        Self {
            oam: [0xFF; 256],
            secondary_oam: [0xFF; 32],
            copy_buffer: 0xFF,
            addr_h: 0,
            addr_l: 0,
            secondary_addr: 0,
            in_range: false,
            copy_done: false,
            overflow_bug_counter: 0,
            sprite_0_added: false,
            found: 0,
            next_has_sprite_0: false,
            slots: [Slot::default(); SLOTS],
            count: 0,
            has_sprite_0: false,
            corrupt_rows: [false; OAM_ROWS],
        }
    }

    /// Slot counts and the secondary OAM cursor are within their hardware limits
    pub fn is_valid(&self) -> bool {
        (self.count as usize) <= SLOTS
            && (self.found as usize) <= SLOTS
            && (self.secondary_addr as usize) <= self.secondary_oam.len()
    }

    pub fn read_oam(&self, addr: u8) -> u8 {
        self.oam[addr as usize]
    }

    /// Write OAM data; the unimplemented attribute bits are dropped
    pub fn write_oam(&mut self, addr: u8, value: u8) {
        let value = if addr & 0x03 == 2 {
            value & OAM_ATTRIBUTE_MASK
        } else {
            value
        };
        self.oam[addr as usize] = value;
    }

    /// Byte the evaluation/fetch logic is currently looking at ($2004 read while rendering)
    pub fn copy_buffer(&self) -> u8 {
        self.copy_buffer
    }

    /// During sprite fetches $2004 exposes the secondary OAM byte being loaded
    pub fn fetch_buffer(&mut self, dot: u16) -> u8 {
        let step = ((dot - 257) % 8).min(3);
        self.secondary_addr = (((dot - 257) / 8) * 4 + step) as u8;
        self.copy_buffer = self.secondary_oam[self.secondary_addr as usize & 0x1F];
        self.copy_buffer
    }

    /// Dots 1-64: fill secondary OAM with $FF, two dots per byte
    pub fn clear_secondary_oam(&mut self, dot: u16) {
        self.copy_buffer = 0xFF;
        self.secondary_oam[((dot - 1) >> 1) as usize] = 0xFF;
    }

    /// Dots 65-256: scan OAM for sprites in range of the next scanline.
    /// Odd dots read primary OAM at OAMADDR, even dots write secondary OAM.
    /// Returns true when the sprite overflow flag must be set.
    pub fn evaluate(
        &mut self,
        dot: u16,
        scanline: u16,
        height: u8,
        oam_address: &mut u8,
        overflow_bug: bool,
    ) -> bool {
        if dot == 65 {
            self.in_range = false;
            self.secondary_addr = 0;
            self.overflow_bug_counter = 0;
            self.copy_done = false;
            self.sprite_0_added = false;
            self.addr_h = (*oam_address >> 2) & 0x3F;
            self.addr_l = *oam_address & 0x03;
        } else if dot == 256 {
            self.next_has_sprite_0 = self.sprite_0_added;
            self.found = self.secondary_addr >> 2;
        }

        if dot & 0x01 == 1 {
            self.copy_buffer = self.oam[*oam_address as usize];
            return false;
        }

        let mut overflow = false;
        if self.copy_done {
            self.addr_h = (self.addr_h + 1) & 0x3F;
            if self.secondary_addr >= 0x20 {
                // With secondary OAM full, writes turn into reads
                self.copy_buffer = self.secondary_oam[(self.secondary_addr & 0x1F) as usize];
            }
        } else {
            let y = self.copy_buffer as u16;
            if !self.in_range && scanline >= y && scanline < y + height as u16 {
                self.in_range = true;
            }

            if self.secondary_addr < 0x20 {
                self.secondary_oam[self.secondary_addr as usize] = self.copy_buffer;
                if self.in_range {
                    self.addr_l += 1;
                    self.secondary_addr += 1;
                    if self.addr_h == 0 {
                        self.sprite_0_added = true;
                    }
                    // Alignment of the secondary address, not addr_l, ends the copy
                    if self.secondary_addr & 0x03 == 0 {
                        self.in_range = false;
                        self.addr_l = 0;
                        self.next_sprite();
                    }
                } else {
                    self.next_sprite();
                }
            } else {
                self.copy_buffer = self.secondary_oam[(self.secondary_addr & 0x1F) as usize];
                overflow = self.check_overflow(overflow_bug);
            }
        }

        *oam_address = (self.addr_l & 0x03) | (self.addr_h << 2);
        overflow
    }

    fn next_sprite(&mut self) {
        self.addr_h = (self.addr_h + 1) & 0x3F;
        if self.addr_h == 0 {
            self.copy_done = true;
        }
    }

    /// Ninth-sprite search once eight sprites were found
    fn check_overflow(&mut self, overflow_bug: bool) -> bool {
        if !overflow_bug {
            if self.in_range {
                self.copy_done = true;
                return true;
            }
            self.next_sprite();
            return false;
        }

        if self.in_range {
            self.addr_l += 1;
            if self.addr_l == 4 {
                self.addr_h = (self.addr_h + 1) & 0x3F;
                self.addr_l = 0;
            }
            if self.overflow_bug_counter == 0 {
                self.overflow_bug_counter = 3;
            } else {
                self.overflow_bug_counter -= 1;
                if self.overflow_bug_counter == 0 {
                    self.copy_done = true;
                    self.addr_l = 0;
                }
            }
            true
        } else {
            // Out of range: sprite index and byte index both advance
            self.addr_h = (self.addr_h + 1) & 0x3F;
            self.addr_l = (self.addr_l + 1) & 0x03;
            if self.addr_h == 0 {
                self.copy_done = true;
            }
            false
        }
    }

    /// Dot 257: the evaluated sprites become the slots of the next scanline.
    /// The pre-render line loads no sprites for line 0.
    pub fn begin_fetch(&mut self, prerender: bool) {
        self.count = if prerender { 0 } else { self.found };
        self.has_sprite_0 = !prerender && self.next_has_sprite_0;
    }

    /// Pattern address of the low plane for `slot`. Empty slots fetch tile $FF.
    pub fn pattern_address(&self, slot: usize, scanline: u16, height: u8, table: u16) -> u16 {
        let base = slot * 4;
        let (row, tile, attributes) = if slot < self.count as usize {
            let y = self.secondary_oam[base] as u16;
            (
                scanline.wrapping_sub(y) as u8,
                self.secondary_oam[base + 1],
                self.secondary_oam[base + 2],
            )
        } else {
            (0, 0xFF, 0)
        };

        let row = if attributes & 0x80 != 0 {
            (height - 1).wrapping_sub(row) & (height - 1)
        } else {
            row & (height - 1)
        };

        if height == 16 {
            let table = ((tile & 0x01) as u16) << 12;
            let tile = (tile & 0xFE) as u16 + (row >> 3) as u16;
            table | (tile << 4) | (row & 0x07) as u16
        } else {
            table | ((tile as u16) << 4) | row as u16
        }
    }

    pub fn load_pattern_lo(&mut self, slot: usize, value: u8) {
        self.slots[slot].pattern_lo = value;
    }

    /// Completes the slot with the high plane, attributes and X position
    pub fn load_pattern_hi(&mut self, slot: usize, value: u8) {
        if slot >= self.count as usize {
            self.slots[slot] = Slot::default();
            return;
        }
        let base = slot * 4;
        let attributes = self.secondary_oam[base + 2];
        let entry = &mut self.slots[slot];
        entry.pattern_hi = value;
        entry.attributes = attributes;
        entry.x = self.secondary_oam[base + 3];
        if attributes & 0x40 != 0 {
            entry.pattern_lo = entry.pattern_lo.reverse_bits();
            entry.pattern_hi = entry.pattern_hi.reverse_bits();
        }
    }

    /// First opaque sprite pixel at screen column `x`
    pub fn pixel(&self, x: u8) -> Option<SpritePixel> {
        for (index, slot) in self.slots[..self.count as usize].iter().enumerate() {
            let shift = x.wrapping_sub(slot.x);
            if x < slot.x || shift >= 8 {
                continue;
            }
            let bit_pos = 7 - shift;
            let lo = (slot.pattern_lo >> bit_pos) & 0x01;
            let hi = (slot.pattern_hi >> bit_pos) & 0x01;
            let pattern = (hi << 1) | lo;
            if pattern == 0 {
                continue;
            }
            return Some(SpritePixel {
                palette_index: 16 + (slot.attributes & 0x03) * 4 + pattern,
                behind_background: slot.attributes & 0x20 != 0,
                sprite_0: index == 0 && self.has_sprite_0,
            });
        }
        None
    }

    /// Rendering was switched off on a render scanline at `dot`: mark the rows
    /// that the stalled OAM address logic will overwrite later
    pub fn mark_corruption(&mut self, dot: u16) {
        if dot < 64 {
            // Every 2 dots shift the corruption down one row
            self.corrupt_rows[(dot >> 1) as usize] = true;
        } else if (256..320).contains(&dot) {
            let base = ((dot - 256) >> 3) as usize;
            let offset = ((dot - 256) & 0x07).min(3) as usize;
            self.corrupt_rows[base * 4 + offset] = true;
        }
    }

    /// Rendering resumed: copy OAM row 0 over every marked row
    pub fn apply_corruption(&mut self) {
        for row in 0..OAM_ROWS {
            if std::mem::take(&mut self.corrupt_rows[row]) && row > 0 {
                self.oam.copy_within(0..8, row * 8);
            }
        }
    }
}

impl Default for Sprites {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Run one scanline's evaluation (dots 1-256) and return whether overflow was set
    fn evaluate_line(sprites: &mut Sprites, scanline: u16, height: u8, bug: bool) -> bool {
        let mut oam_address = 0u8;
        let mut overflow = false;
        for dot in 1..=64 {
            sprites.clear_secondary_oam(dot);
        }
        for dot in 65..=256 {
            overflow |= sprites.evaluate(dot, scanline, height, &mut oam_address, bug);
        }
        sprites.begin_fetch(false);
        overflow
    }

    fn place(sprites: &mut Sprites, index: usize, y: u8, tile: u8, attributes: u8, x: u8) {
        let base = (index * 4) as u8;
        sprites.write_oam(base, y);
        sprites.write_oam(base + 1, tile);
        sprites.write_oam(base + 2, attributes);
        sprites.write_oam(base + 3, x);
    }

    #[test]
    fn test_slot_count_beyond_eight_is_invalid() {
        let mut sprites = Sprites::new();
        assert!(sprites.is_valid());
        sprites.count = 9;
        assert!(!sprites.is_valid());
        sprites.count = 8;
        sprites.secondary_addr = 0x40;
        assert!(!sprites.is_valid());
    }

    #[test]
    fn test_attribute_bits_masked() {
        let mut sprites = Sprites::new();
        sprites.write_oam(2, 0xFF);
        assert_eq!(sprites.read_oam(2), 0xE3);
        sprites.write_oam(3, 0xFF);
        assert_eq!(sprites.read_oam(3), 0xFF);
    }

    #[test]
    fn test_evaluation_finds_sprites_in_range() {
        let mut sprites = Sprites::new();
        place(&mut sprites, 0, 10, 0x01, 0x00, 20);
        place(&mut sprites, 5, 12, 0x02, 0x01, 40);
        place(&mut sprites, 9, 100, 0x03, 0x00, 60);

        assert!(!evaluate_line(&mut sprites, 15, 8, true));
        assert_eq!(sprites.count, 2);
        assert!(sprites.has_sprite_0);
        assert_eq!(&sprites.secondary_oam[0..8], &[10, 1, 0, 20, 12, 2, 1, 40]);
        assert_eq!(sprites.secondary_oam[8], 0xFF);
    }

    #[test]
    fn test_sprite_0_flag_requires_sprite_0_in_range() {
        let mut sprites = Sprites::new();
        place(&mut sprites, 0, 200, 0x01, 0x00, 20);
        place(&mut sprites, 1, 10, 0x01, 0x00, 20);
        evaluate_line(&mut sprites, 12, 8, true);
        assert_eq!(sprites.count, 1);
        assert!(!sprites.has_sprite_0);
    }

    #[test]
    fn test_nine_sprites_set_overflow() {
        let mut sprites = Sprites::new();
        for i in 0..9 {
            place(&mut sprites, i, 50, 0, 0, i as u8 * 8);
        }
        assert!(evaluate_line(&mut sprites, 52, 8, true));
        assert_eq!(sprites.count, 8);
    }

    #[test]
    fn test_overflow_bug_misses_ninth_sprite() {
        // Sprites 0-7 on the line, sprite 8 out of range, sprite 9 on the line.
        // The buggy scan reads sprite 9's tile byte as its Y coordinate.
        let mut sprites = Sprites::new();
        for i in 0..8 {
            place(&mut sprites, i, 50, 0, 0, 0);
        }
        place(&mut sprites, 9, 50, 0xF0, 0, 0);
        assert!(!evaluate_line(&mut sprites, 52, 8, true));

        // Without the bug the ninth sprite is found
        let mut sprites = Sprites::new();
        for i in 0..8 {
            place(&mut sprites, i, 50, 0, 0, 0);
        }
        place(&mut sprites, 9, 50, 0xF0, 0, 0);
        assert!(evaluate_line(&mut sprites, 52, 8, false));
    }

    #[test]
    fn test_8x16_pattern_address() {
        let mut sprites = Sprites::new();
        place(&mut sprites, 0, 10, 0x21, 0x00, 0);
        evaluate_line(&mut sprites, 20, 16, true);
        // Row 10 lands in the second tile; odd tile selects $1000
        assert_eq!(sprites.pattern_address(0, 20, 16, 0), 0x1000 | (0x21 << 4) | 2);

        // Vertical flip mirrors the row across both tiles
        place(&mut sprites, 0, 10, 0x20, 0x80, 0);
        evaluate_line(&mut sprites, 20, 16, true);
        assert_eq!(sprites.pattern_address(0, 20, 16, 0), (0x20 << 4) | 5);
    }

    #[test]
    fn test_empty_slot_fetches_tile_ff() {
        let sprites = Sprites::new();
        assert_eq!(sprites.pattern_address(3, 5, 8, 0x1000), 0x1FF0);
    }

    #[test]
    fn test_pixel_priority_and_flip() {
        let mut sprites = Sprites::new();
        place(&mut sprites, 0, 10, 0, 0x40 | 0x20 | 0x02, 100);
        place(&mut sprites, 1, 10, 0, 0x01, 100);
        evaluate_line(&mut sprites, 10, 8, true);
        sprites.load_pattern_lo(0, 0b0000_0001);
        sprites.load_pattern_hi(0, 0);
        sprites.load_pattern_lo(1, 0xFF);
        sprites.load_pattern_hi(1, 0xFF);

        // Horizontal flip moves sprite 0's only pixel to the left edge
        let pixel = sprites.pixel(100).expect("opaque");
        assert_eq!(pixel.palette_index, 16 + 2 * 4 + 1);
        assert!(pixel.behind_background);
        assert!(pixel.sprite_0);

        // Transparent sprite 0 pixel lets sprite 1 through
        let pixel = sprites.pixel(101).expect("opaque");
        assert_eq!(pixel.palette_index, 16 + 4 + 3);
        assert!(!pixel.sprite_0);

        assert!(sprites.pixel(108).is_none());
        assert!(sprites.pixel(99).is_none());
    }

    #[test]
    fn test_row_corruption_copies_row_zero() {
        let mut sprites = Sprites::new();
        for i in 0..8u8 {
            sprites.write_oam(i, i);
        }
        sprites.mark_corruption(6);
        sprites.apply_corruption();
        assert_eq!(sprites.read_oam(24), 0);
        assert_eq!(sprites.read_oam(31), 7);
        assert_eq!(sprites.read_oam(32), 0xFF);

        // Flags are consumed
        sprites.write_oam(24, 0x55);
        sprites.apply_corruption();
        assert_eq!(sprites.read_oam(24), 0x55);
    }
}
