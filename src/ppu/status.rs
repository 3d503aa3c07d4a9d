const VBLANK: u8 = 0b1000_0000;
const SPRITE_0_HIT: u8 = 0b0100_0000;
const SPRITE_OVERFLOW: u8 = 0b0010_0000;

/// PPU status flags ($2002) plus the frame-complete latch used by the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Status {
    /// VBlank flag (bit 7 of status register)
    vblank: bool,
    /// Sprite 0 Hit flag (bit 6 of status register)
    sprite_0_hit: bool,
    /// Sprite Overflow flag (bit 5 of status register)
    sprite_overflow: bool,
    /// Set when VBlank starts, regardless of NMI generation
    frame_complete: bool,
    /// A $2002 read landed just before VBlank: the flag stays clear this frame
    suppress_vblank: bool,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter VBlank period unless a racing status read suppressed it
    pub fn enter_vblank(&mut self) {
        if !std::mem::take(&mut self.suppress_vblank) {
            self.vblank = true;
        }
        self.frame_complete = true;
    }

    /// End of VBlank on the pre-render scanline clears all three flags
    pub fn exit_vblank(&mut self) {
        self.vblank = false;
        self.sprite_0_hit = false;
        self.sprite_overflow = false;
    }

    pub fn suppress_vblank(&mut self) {
        self.suppress_vblank = true;
    }

    pub fn vblank(&self) -> bool {
        self.vblank
    }

    /// Upper three bits of $2002. Reading clears VBlank.
    pub fn read(&mut self) -> u8 {
        let value = self.peek();
        self.vblank = false;
        value
    }

    /// Upper three bits of $2002 without side effects
    pub fn peek(&self) -> u8 {
        let mut value = 0;
        if self.vblank {
            value |= VBLANK;
        }
        if self.sprite_0_hit {
            value |= SPRITE_0_HIT;
        }
        if self.sprite_overflow {
            value |= SPRITE_OVERFLOW;
        }
        value
    }

    pub fn set_sprite_0_hit(&mut self) {
        self.sprite_0_hit = true;
    }

    pub fn sprite_0_hit(&self) -> bool {
        self.sprite_0_hit
    }

    pub fn set_sprite_overflow(&mut self) {
        self.sprite_overflow = true;
    }

    pub fn sprite_overflow(&self) -> bool {
        self.sprite_overflow
    }

    /// Consume the frame-complete latch
    pub fn poll_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }
}
