/// Number of PPU cycles (dots) per scanline
pub const DOTS_PER_SCANLINE: u16 = 341;
/// Scanlines per NTSC frame, including the pre-render line
pub const SCANLINES_PER_FRAME: u16 = 262;
/// First scanline of vertical blank
pub const VBLANK_SCANLINE: u16 = 241;
/// Pre-render scanline
pub const PRERENDER_SCANLINE: u16 = 261;

/// Tracks the PPU beam position and the frame counter.
///
/// `scanline`/`dot` always name the next dot to be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Timing {
    /// Total number of dots processed since power-on
    total_cycles: u64,
    /// Scanline of the next dot (0-261)
    scanline: u16,
    /// Dot within the scanline (0-340)
    dot: u16,
    /// Completed frames; bit 0 is the odd/even frame parity
    frame_count: u64,
}

impl Timing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance past the current dot.
    /// Returns true if the odd frame dot skip happened.
    pub fn advance(&mut self, rendering_enabled: bool) -> bool {
        self.total_cycles += 1;

        // Odd frames with rendering enabled drop the last dot of the pre-render line
        let skip = self.is_odd_frame()
            && rendering_enabled
            && self.scanline == PRERENDER_SCANLINE
            && self.dot == 339;

        if skip {
            self.start_frame();
            return true;
        }

        self.dot += 1;
        if self.dot == DOTS_PER_SCANLINE {
            self.dot = 0;
            self.scanline += 1;
            if self.scanline == SCANLINES_PER_FRAME {
                self.start_frame();
            }
        }
        false
    }

    fn start_frame(&mut self) {
        self.scanline = 0;
        self.dot = 0;
        self.frame_count += 1;
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    /// Beam position lies inside the frame
    pub fn is_valid(&self) -> bool {
        self.scanline < SCANLINES_PER_FRAME && self.dot < DOTS_PER_SCANLINE
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_odd_frame(&self) -> bool {
        self.frame_count & 1 == 1
    }

    /// Visible scanlines (0-239)
    pub fn is_visible_scanline(&self) -> bool {
        self.scanline < 240
    }

    pub fn is_prerender_scanline(&self) -> bool {
        self.scanline == PRERENDER_SCANLINE
    }

    /// Scanlines on which the rendering pipeline fetches (visible + pre-render)
    pub fn is_render_scanline(&self) -> bool {
        self.is_visible_scanline() || self.is_prerender_scanline()
    }

    /// True when the next dot to be processed is `(scanline, dot)`
    pub fn at(&self, scanline: u16, dot: u16) -> bool {
        self.scanline == scanline && self.dot == dot
    }
}
