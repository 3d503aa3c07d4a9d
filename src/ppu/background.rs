/// Background tile pipeline: fetch latches feeding 16-bit shift registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Background {
    /// Background pattern shift register - low bit plane (16 bits)
    pattern_shift_lo: u16,
    /// Background pattern shift register - high bit plane (16 bits)
    pattern_shift_hi: u16,
    /// Background attribute shift register - low bit (16 bits)
    attribute_shift_lo: u16,
    /// Background attribute shift register - high bit (16 bits)
    attribute_shift_hi: u16,
    /// Nametable byte latch (tile index)
    nametable_latch: u8,
    /// Palette selected by the attribute byte (2 bits)
    attribute_latch: u8,
    /// Pattern table low byte latch
    pattern_lo_latch: u8,
    /// Pattern table high byte latch
    pattern_hi_latch: u8,
}

/// Nametable byte address for the tile under v
pub fn nametable_address(v: u16) -> u16 {
    0x2000 | (v & 0x0FFF)
}

/// Attribute byte address for the tile under v
pub fn attribute_address(v: u16) -> u16 {
    0x23C0 | (v & 0x0C00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07)
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_nametable(&mut self, value: u8) {
        self.nametable_latch = value;
    }

    /// Latch the 2-bit palette of the attribute quadrant v points into
    pub fn set_attribute(&mut self, v: u16, value: u8) {
        let coarse_x = v & 0x1F;
        let coarse_y = (v >> 5) & 0x1F;
        let shift = ((coarse_y & 0x02) << 1) | (coarse_x & 0x02);
        self.attribute_latch = (value >> shift) & 0x03;
    }

    /// Pattern byte address of the latched tile; `plane` 0 = low, 8 = high
    pub fn pattern_address(&self, table: u16, v: u16, plane: u16) -> u16 {
        let fine_y = (v >> 12) & 0x07;
        table | ((self.nametable_latch as u16) << 4) | plane | fine_y
    }

    pub fn set_pattern_lo(&mut self, value: u8) {
        self.pattern_lo_latch = value;
    }

    pub fn set_pattern_hi(&mut self, value: u8) {
        self.pattern_hi_latch = value;
    }

    /// Load shift registers from latches
    pub fn load_shift_registers(&mut self) {
        self.pattern_shift_lo = (self.pattern_shift_lo & 0xFF00) | self.pattern_lo_latch as u16;
        self.pattern_shift_hi = (self.pattern_shift_hi & 0xFF00) | self.pattern_hi_latch as u16;

        let palette_lo_bits = if self.attribute_latch & 0x01 != 0 { 0xFF } else { 0x00 };
        let palette_hi_bits = if self.attribute_latch & 0x02 != 0 { 0xFF } else { 0x00 };
        self.attribute_shift_lo = (self.attribute_shift_lo & 0xFF00) | palette_lo_bits;
        self.attribute_shift_hi = (self.attribute_shift_hi & 0xFF00) | palette_hi_bits;
    }

    /// Shift all background rendering shift registers left by 1
    pub fn shift_registers(&mut self) {
        self.pattern_shift_lo <<= 1;
        self.pattern_shift_hi <<= 1;
        self.attribute_shift_lo <<= 1;
        self.attribute_shift_hi <<= 1;
    }

    /// Current background pixel as a palette RAM index (0-15); 0 means transparent
    pub fn pixel(&self, fine_x: u8) -> u8 {
        let bit_position = 15 - fine_x as u16;

        let pattern_lo_bit = ((self.pattern_shift_lo >> bit_position) & 0x01) as u8;
        let pattern_hi_bit = ((self.pattern_shift_hi >> bit_position) & 0x01) as u8;
        let pattern = (pattern_hi_bit << 1) | pattern_lo_bit;
        if pattern == 0 {
            return 0;
        }

        let attr_lo_bit = ((self.attribute_shift_lo >> bit_position) & 0x01) as u8;
        let attr_hi_bit = ((self.attribute_shift_hi >> bit_position) & 0x01) as u8;
        let palette = (attr_hi_bit << 1) | attr_lo_bit;

        palette * 4 + pattern
    }
}
