/// PPU Control Register ($2000) bit constants
const GENERATE_NMI: u8 = 0b1000_0000;
const SPRITE_SIZE: u8 = 0b0010_0000;
const BG_PATTERN_TABLE_ADDR: u8 = 0b0001_0000;
const SPRITE_PATTERN_TABLE_ADDR: u8 = 0b0000_1000;
const VRAM_ADDR_INCREMENT: u8 = 0b0000_0100;
const BASE_NAMETABLE_ADDR: u8 = 0b0000_0011;

/// PPU Mask Register ($2001) bit constants
const SHOW_BACKGROUND: u8 = 0b0000_1000;
const SHOW_SPRITES: u8 = 0b0001_0000;
const SHOW_BACKGROUND_LEFT: u8 = 0b0000_0010;
const SHOW_SPRITES_LEFT: u8 = 0b0000_0100;
const GRAYSCALE: u8 = 0b0000_0001;

/// Register whose write lands after a delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum DelayedWrite {
    Control(u8),
    Mask(u8),
    ScrollX(u8),
    ScrollY(u8),
    /// Second $2006 write: copy t into v
    Address(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
struct PendingWrite {
    write: DelayedWrite,
    dots: u8,
}

const QUEUE_SIZE: usize = 4;

/// Small fixed-size queue of register writes waiting to take effect, counted in PPU dots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct WriteQueue {
    entries: [Option<PendingWrite>; QUEUE_SIZE],
}

impl WriteQueue {
    /// Queue `write` to land after `dots` dots. When the queue is full the oldest
    /// entry is removed and returned so the caller can apply it immediately.
    pub fn push(&mut self, write: DelayedWrite, dots: u8) -> Option<DelayedWrite> {
        let entry = PendingWrite { write, dots };
        if let Some(slot) = self.entries.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(entry);
            return None;
        }
        let oldest = self.entries[0].map(|entry| entry.write);
        self.entries.rotate_left(1);
        self.entries[QUEUE_SIZE - 1] = Some(entry);
        oldest
    }

    /// Count one dot down. Writes that became due are returned in write order.
    pub fn advance(&mut self) -> [Option<DelayedWrite>; QUEUE_SIZE] {
        let mut due = [None; QUEUE_SIZE];
        let mut count = 0;
        for slot in self.entries.iter_mut() {
            if let Some(entry) = slot {
                entry.dots -= 1;
                if entry.dots == 0 {
                    due[count] = Some(entry.write);
                    count += 1;
                    *slot = None;
                }
            }
        }
        // Keep remaining entries in order at the front
        self.entries.sort_by_key(|slot| slot.is_none());
        due
    }

    pub fn clear(&mut self) {
        self.entries = [None; QUEUE_SIZE];
    }
}

/// Manages PPU registers including PPUCTRL, PPUMASK, and Loopy scroll registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Registers {
    /// Control register value ($2000)
    control_register: u8,
    /// Mask register value ($2001)
    mask_register: u8,
    /// OAM address register ($2003)
    pub oam_address: u8,
    /// PPU data read buffer
    pub data_buffer: u8,
    /// PPU I/O bus latch - holds last value written or read from PPU registers
    pub io_bus: u8,
    /// v: Current VRAM address (15 bits)
    pub v: u16,
    /// t: Temporary VRAM address (15 bits)
    pub t: u16,
    /// x: Fine X scroll (3 bits)
    pub x: u8,
    /// w: Write toggle (1 bit) - false=first write, true=second write
    pub w: bool,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset button: control, mask, scroll latches and the read buffer are cleared
    pub fn reset(&mut self) {
        self.control_register = 0;
        self.mask_register = 0;
        self.data_buffer = 0;
        self.t = 0;
        self.x = 0;
        self.w = false;
    }

    /// Apply a write to the control register ($2000)
    pub fn write_control(&mut self, value: u8) {
        self.control_register = value;
        // t: ...GH.. ........ <- d: ......GH
        let nametable_bits = (value & BASE_NAMETABLE_ADDR) as u16;
        self.t = (self.t & 0xF3FF) | (nametable_bits << 10);
    }

    /// Apply a write to the mask register ($2001)
    pub fn write_mask(&mut self, value: u8) {
        self.mask_register = value;
    }

    /// First $2005 write
    pub fn write_scroll_x(&mut self, value: u8) {
        // t: ....... ...ABCDE <- d: ABCDE...
        // x:              FGH <- d: .....FGH
        self.t = (self.t & 0xFFE0) | ((value as u16) >> 3);
        self.x = value & 0x07;
    }

    /// Second $2005 write
    pub fn write_scroll_y(&mut self, value: u8) {
        // t: FGH..AB CDE..... <- d: ABCDEFGH
        self.t = (self.t & 0x8FFF) | (((value as u16) & 0x07) << 12);
        self.t = (self.t & 0xFC1F) | (((value as u16) & 0xF8) << 2);
    }

    /// First $2006 write: high byte of t (bit 14 cleared)
    pub fn write_address_high(&mut self, value: u8) {
        self.t = (self.t & 0x80FF) | (((value & 0x3F) as u16) << 8);
    }

    /// Second $2006 write: low byte of t. v follows after a delay.
    pub fn write_address_low(&mut self, value: u8) -> u16 {
        self.t = (self.t & 0xFF00) | (value as u16);
        self.t
    }

    /// Increment VRAM address by the amount specified in control register
    pub fn increment_vram_address(&mut self) {
        let increment = if (self.control_register & VRAM_ADDR_INCREMENT) != 0 {
            32
        } else {
            1
        };
        self.v = self.v.wrapping_add(increment) & 0x7FFF;
    }

    /// Increment coarse X (used during rendering)
    pub fn increment_coarse_x(&mut self) {
        if (self.v & 0x001F) == 31 {
            // Coarse X = 0, switch horizontal nametable
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v += 1;
        }
    }

    /// Increment fine Y (used during rendering)
    pub fn increment_fine_y(&mut self) {
        if (self.v & 0x7000) != 0x7000 {
            self.v += 0x1000;
        } else {
            // Fine Y = 7, reset and increment coarse Y
            self.v &= !0x7000;
            let mut y = (self.v & 0x03E0) >> 5;
            if y == 29 {
                // Coarse Y = 29, reset and switch vertical nametable
                y = 0;
                self.v ^= 0x0800;
            } else if y == 31 {
                // Coarse Y = 31, reset (no nametable switch)
                y = 0;
            } else {
                y += 1;
            }
            self.v = (self.v & !0x03E0) | (y << 5);
        }
    }

    /// Copy horizontal bits from t to v (used during rendering)
    pub fn copy_horizontal_bits(&mut self) {
        // v: ....A.. ...BCDEF <- t: ....A.. ...BCDEF
        self.v = (self.v & 0xFBE0) | (self.t & 0x041F);
    }

    /// Copy vertical bits from t to v (used during rendering)
    pub fn copy_vertical_bits(&mut self) {
        // v: GHIA.BC DEF..... <- t: GHIA.BC DEF.....
        self.v = (self.v & 0x841F) | (self.t & 0x7BE0);
    }

    /// PPUDATA access while rendering bumps coarse X and Y together
    pub fn increment_with_rendering_glitch(&mut self) {
        self.increment_coarse_x();
        self.increment_fine_y();
    }

    pub fn nmi_enabled(&self) -> bool {
        (self.control_register & GENERATE_NMI) != 0
    }

    pub fn background_enabled(&self) -> bool {
        (self.mask_register & SHOW_BACKGROUND) != 0
    }

    pub fn sprites_enabled(&self) -> bool {
        (self.mask_register & SHOW_SPRITES) != 0
    }

    pub fn rendering_enabled(&self) -> bool {
        self.background_enabled() || self.sprites_enabled()
    }

    pub fn show_background_left(&self) -> bool {
        (self.mask_register & SHOW_BACKGROUND_LEFT) != 0
    }

    pub fn show_sprites_left(&self) -> bool {
        (self.mask_register & SHOW_SPRITES_LEFT) != 0
    }

    pub fn grayscale(&self) -> bool {
        (self.mask_register & GRAYSCALE) != 0
    }

    /// Color emphasis bits (red, green, blue)
    pub fn color_emphasis(&self) -> u8 {
        (self.mask_register >> 5) & 0x07
    }

    pub fn sprite_height(&self) -> u8 {
        if (self.control_register & SPRITE_SIZE) != 0 {
            16
        } else {
            8
        }
    }

    pub fn bg_pattern_table_addr(&self) -> u16 {
        if (self.control_register & BG_PATTERN_TABLE_ADDR) != 0 {
            0x1000
        } else {
            0x0000
        }
    }

    pub fn sprite_pattern_table_addr(&self) -> u16 {
        if (self.control_register & SPRITE_PATTERN_TABLE_ADDR) != 0 {
            0x1000
        } else {
            0x0000
        }
    }
}
