use crate::config::{MachineConfig, Quirks};
use crate::ppu::background::{attribute_address, nametable_address};
use crate::ppu::registers::{DelayedWrite, WriteQueue};
use crate::ppu::timing::VBLANK_SCANLINE;
use crate::ppu::{Background, Memory, Registers, Sprites, Status, Timing, VideoBus};
use crate::signals::BusLines;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;

/// Receiver of finished frames.
///
/// `value` is a 9-bit pixel: palette index in bits 0-5, PPUMASK emphasis bits in 6-8.
pub trait FrameSink {
    fn set_pixel(&mut self, x: usize, y: usize, value: u16);
}

/// Register write delays in dots for CPU/PPU alignments 0-1; one more for 2-3
const CONTROL_DELAY: u8 = 1;
const MASK_DELAY: u8 = 2;
const SCROLL_DELAY: u8 = 1;
const ADDRESS_DELAY: u8 = 4;

/// Picture processing unit, advanced one dot per `tick`
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Ppu {
    /// Beam position and frame parity
    timing: Timing,
    /// Status flags (VBlank, sprite 0 hit, overflow)
    status: Status,
    /// Register management (PPUCTRL, PPUMASK, Loopy registers)
    registers: Registers,
    /// Register writes still propagating
    writes: WriteQueue,
    /// Nametable and palette RAM
    memory: Memory,
    background: Background,
    sprites: Sprites,
    /// Frame being drawn
    back_buffer: Vec<u16>,
    /// Last complete frame
    front_buffer: Vec<u16>,
    alignment: u8,
    quirks: Quirks,
}

impl Ppu {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            timing: Timing::new(),
            status: Status::new(),
            registers: Registers::new(),
            writes: WriteQueue::default(),
            memory: Memory::new(),
            background: Background::new(),
            sprites: Sprites::new(),
            back_buffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            front_buffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
            alignment: config.alignment(),
            quirks: config.quirks,
        }
    }

    /// Reset button: control, mask, scroll latches, read buffer and in-flight writes cleared.
    /// Memory, OAM and the beam position are kept.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.writes.clear();
    }

    /// Check buffer sizes and counters that index memory (used on restored snapshots)
    pub fn validate(&self) -> Result<(), &'static str> {
        let pixels = SCREEN_WIDTH * SCREEN_HEIGHT;
        if self.back_buffer.len() != pixels || self.front_buffer.len() != pixels {
            return Err("frame buffer size mismatch");
        }
        if !self.memory.is_valid() {
            return Err("nametable RAM size mismatch");
        }
        if !self.timing.is_valid() {
            return Err("beam position out of range");
        }
        if !self.sprites.is_valid() {
            return Err("sprite evaluation state out of range");
        }
        Ok(())
    }

    pub fn scanline(&self) -> u16 {
        self.timing.scanline()
    }

    pub fn dot(&self) -> u16 {
        self.timing.dot()
    }

    pub fn frame_count(&self) -> u64 {
        self.timing.frame_count()
    }

    /// Consume the flag raised when VBlank starts
    pub fn poll_frame_complete(&mut self) -> bool {
        self.status.poll_frame_complete()
    }

    /// Last complete frame, row-major 256x240
    pub fn front_buffer(&self) -> &[u16] {
        &self.front_buffer
    }

    /// Replay the last complete frame into `sink`
    pub fn present<S: FrameSink>(&self, sink: &mut S) {
        for (x, y, value) in self.frame() {
            sink.set_pixel(x, y, value);
        }
    }

    /// Lazily iterate the last complete frame as `(x, y, value)`
    pub fn frame(&self) -> impl Iterator<Item = (usize, usize, u16)> + '_ {
        self.front_buffer
            .iter()
            .enumerate()
            .map(|(i, &value)| (i % SCREEN_WIDTH, i / SCREEN_WIDTH, value))
    }

    fn delay(&self, dots: u8) -> u8 {
        if self.alignment >= 2 { dots + 1 } else { dots }
    }

    /// Queue a register write; a write pushed out of a full queue lands now
    fn schedule<V: VideoBus>(&mut self, write: DelayedWrite, dots: u8, video: &mut V) {
        let dots = self.delay(dots);
        if let Some(evicted) = self.writes.push(write, dots) {
            self.apply_write(evicted, video);
        }
    }

    /// Rendering enabled on a line where the pipeline fetches
    fn is_rendering(&self) -> bool {
        self.registers.rendering_enabled() && self.timing.is_render_scanline()
    }

    /// Read through the PPU bus, exposing the address to the cartridge
    fn fetch<V: VideoBus>(&self, addr: u16, video: &mut V) -> u8 {
        video.ppu_address(addr, self.timing.total_cycles());
        self.memory.read(addr, video)
    }

    /// Process one full PPU cycle (dot)
    pub fn tick<V: VideoBus>(&mut self, video: &mut V) {
        let scanline = self.timing.scanline();
        let dot = self.timing.dot();

        if self.registers.rendering_enabled() && self.timing.is_render_scanline() {
            if self.quirks.oam_corruption && self.timing.is_prerender_scanline() && dot == 0 {
                self.sprites.apply_corruption();
            }
            self.render_background(dot, video);
            self.render_sprites(scanline, dot, video);
        }

        if self.timing.is_visible_scanline() && (1..=256).contains(&dot) {
            self.output_pixel(scanline, dot);
        }

        if self.timing.at(VBLANK_SCANLINE, 1) {
            self.status.enter_vblank();
            std::mem::swap(&mut self.front_buffer, &mut self.back_buffer);
        } else if self.timing.at(261, 1) {
            self.status.exit_vblank();
        }

        for write in self.writes.advance().into_iter().flatten() {
            self.apply_write(write, video);
        }

        self.timing.advance(self.registers.rendering_enabled());
    }

    /// Half-cycle: drive the NMI output
    pub fn half_tick(&mut self, lines: &mut BusLines) {
        lines.set_nmi(self.status.vblank() && self.registers.nmi_enabled());
    }

    fn render_background<V: VideoBus>(&mut self, dot: u16, video: &mut V) {
        if (2..=257).contains(&dot) || (322..=337).contains(&dot) {
            self.background.shift_registers();
        }

        let fetch_dot = (1..=256).contains(&dot) || (321..=336).contains(&dot);
        if (fetch_dot || dot == 257 || dot == 337) && (dot - 1) % 8 == 0 {
            self.background.load_shift_registers();
        }

        let v = self.registers.v;
        if fetch_dot {
            match (dot - 1) % 8 {
                0 => {
                    let value = self.fetch(nametable_address(v), video);
                    self.background.set_nametable(value);
                }
                2 => {
                    let value = self.fetch(attribute_address(v), video);
                    self.background.set_attribute(v, value);
                }
                4 => {
                    let table = self.registers.bg_pattern_table_addr();
                    let addr = self.background.pattern_address(table, v, 0);
                    let value = self.fetch(addr, video);
                    self.background.set_pattern_lo(value);
                }
                6 => {
                    let table = self.registers.bg_pattern_table_addr();
                    let addr = self.background.pattern_address(table, v, 8);
                    let value = self.fetch(addr, video);
                    self.background.set_pattern_hi(value);
                }
                7 => self.registers.increment_coarse_x(),
                _ => {}
            }
        } else if dot == 337 || dot == 339 {
            // Unused nametable fetches
            self.fetch(nametable_address(v), video);
        }

        if dot == 256 {
            self.registers.increment_fine_y();
        } else if dot == 257 {
            self.registers.copy_horizontal_bits();
        } else if self.timing.is_prerender_scanline() && (280..=304).contains(&dot) {
            self.registers.copy_vertical_bits();
        }
    }

    fn render_sprites<V: VideoBus>(&mut self, scanline: u16, dot: u16, video: &mut V) {
        if self.timing.is_visible_scanline() {
            if (1..=64).contains(&dot) {
                self.sprites.clear_secondary_oam(dot);
            } else if (65..=256).contains(&dot) {
                let height = self.registers.sprite_height();
                let overflow = self.sprites.evaluate(
                    dot,
                    scanline,
                    height,
                    &mut self.registers.oam_address,
                    self.quirks.sprite_overflow_bug,
                );
                if overflow {
                    self.status.set_sprite_overflow();
                }
            }
        }

        if !(257..=320).contains(&dot) {
            return;
        }
        self.registers.oam_address = 0;

        let slot = ((dot - 257) / 8) as usize;
        let height = self.registers.sprite_height();
        let table = self.registers.sprite_pattern_table_addr();
        let v = self.registers.v;
        match (dot - 257) % 8 {
            0 => {
                if slot == 0 {
                    self.sprites
                        .begin_fetch(self.timing.is_prerender_scanline());
                }
                self.fetch(nametable_address(v), video);
            }
            2 => {
                self.fetch(attribute_address(v), video);
            }
            4 => {
                let addr = self.sprites.pattern_address(slot, scanline, height, table);
                let value = self.fetch(addr, video);
                self.sprites.load_pattern_lo(slot, value);
            }
            6 => {
                let addr = self.sprites.pattern_address(slot, scanline, height, table) | 0x08;
                let value = self.fetch(addr, video);
                self.sprites.load_pattern_hi(slot, value);
            }
            _ => {}
        }
    }

    fn output_pixel(&mut self, scanline: u16, dot: u16) {
        let x = (dot - 1) as u8;
        let regs = &self.registers;

        let color = if regs.rendering_enabled() {
            let bg = if regs.background_enabled() && (x >= 8 || regs.show_background_left()) {
                self.background.pixel(regs.x)
            } else {
                0
            };
            let sprite = if regs.sprites_enabled() && (x >= 8 || regs.show_sprites_left()) {
                self.sprites.pixel(x)
            } else {
                None
            };

            let index = match sprite {
                Some(sprite) => {
                    if sprite.sprite_0 && bg != 0 && x != 255 {
                        self.status.set_sprite_0_hit();
                    }
                    if bg == 0 || !sprite.behind_background {
                        sprite.palette_index
                    } else {
                        bg
                    }
                }
                None => bg,
            };
            self.memory.read_palette(0x3F00 | index as u16)
        } else if regs.v & 0x3F00 == 0x3F00 {
            // Forced blank with v inside palette RAM shows that entry
            self.memory.read_palette(regs.v)
        } else {
            self.memory.read_palette(0x3F00)
        };

        let color = if regs.grayscale() { color & 0x30 } else { color };
        let value = color as u16 | (regs.color_emphasis() as u16) << 6;
        self.back_buffer[scanline as usize * SCREEN_WIDTH + x as usize] = value;
    }

    fn apply_write<V: VideoBus>(&mut self, write: DelayedWrite, video: &mut V) {
        match write {
            DelayedWrite::Control(value) => self.registers.write_control(value),
            DelayedWrite::Mask(value) => {
                let was_rendering = self.registers.rendering_enabled();
                self.registers.write_mask(value);
                let now_rendering = self.registers.rendering_enabled();
                if self.quirks.oam_corruption
                    && self.timing.is_render_scanline()
                    && was_rendering != now_rendering
                {
                    if now_rendering {
                        self.sprites.apply_corruption();
                    } else {
                        self.sprites.mark_corruption(self.timing.dot());
                    }
                }
            }
            DelayedWrite::ScrollX(value) => self.registers.write_scroll_x(value),
            DelayedWrite::ScrollY(value) => self.registers.write_scroll_y(value),
            DelayedWrite::Address(addr) => self.update_address(addr, video),
        }
    }

    /// Second $2006 write reaching v
    fn update_address<V: VideoBus>(&mut self, addr: u16, video: &mut V) {
        let dot = self.timing.dot();
        let old = self.registers.v;

        if self.is_rendering() {
            // Landing on a scroll increment ANDs the new value with the incremented one
            if dot == 257 {
                self.registers.v &= addr;
            } else if dot > 0 && dot & 0x07 == 0 && (dot <= 256 || dot > 320) {
                self.registers.v = (addr & !0x041F) | (old & addr & 0x041F);
            } else {
                self.registers.v = addr;
            }
            return;
        }

        self.registers.v = addr;
        if self.quirks.palette_corruption
            && self.alignment >= 2
            && old & 0x3F00 == 0x3F00
            && addr & 0x3F00 != 0x3F00
        {
            let value = self.memory.read_palette(old);
            self.memory.write_palette(0x3F00 | (addr & 0x1F), value);
        }
        video.ppu_address(addr & 0x3FFF, self.timing.total_cycles());
    }

    /// $2007 access moves v: coarse X and Y together while rendering, else by 1 or 32
    fn increment_after_access<V: VideoBus>(&mut self, video: &mut V) {
        if self.is_rendering() {
            self.registers.increment_with_rendering_glitch();
        } else {
            self.registers.increment_vram_address();
            video.ppu_address(self.registers.v & 0x3FFF, self.timing.total_cycles());
        }
    }

    /// CPU read of $2000-$2007 (`reg` is the address; only the low 3 bits decode)
    pub fn cpu_read<V: VideoBus>(&mut self, reg: u16, video: &mut V, lines: &mut BusLines) -> u8 {
        match reg & 0x07 {
            2 => self.read_status(lines),
            4 => {
                let value = if self.is_rendering() {
                    let dot = self.timing.dot();
                    if (257..=320).contains(&dot) {
                        self.sprites.fetch_buffer(dot)
                    } else {
                        self.sprites.copy_buffer()
                    }
                } else {
                    self.sprites.read_oam(self.registers.oam_address)
                };
                self.registers.io_bus = value;
                value
            }
            7 => self.read_data(video),
            // Write-only registers return the I/O latch
            _ => self.registers.io_bus,
        }
    }

    /// $2002 with the VBlank start race
    fn read_status(&mut self, lines: &mut BusLines) -> u8 {
        if self.timing.at(VBLANK_SCANLINE, 1) {
            // One dot early: the flag is never set this frame and no NMI occurs
            self.status.suppress_vblank();
        }
        let status = self.status.read();
        if status & 0x80 != 0
            && (self.timing.at(VBLANK_SCANLINE, 2) || self.timing.at(VBLANK_SCANLINE, 3))
        {
            lines.cancel_nmi();
        }
        self.registers.w = false;
        self.registers.io_bus = status | (self.registers.io_bus & 0x1F);
        self.registers.io_bus
    }

    fn read_data<V: VideoBus>(&mut self, video: &mut V) -> u8 {
        let addr = self.registers.v & 0x3FFF;
        if !self.is_rendering() {
            video.ppu_address(addr, self.timing.total_cycles());
        }

        let value = if addr >= 0x3F00 {
            // Palette reads bypass the buffer, which gets the nametable byte underneath
            let mut palette = self.memory.read_palette(addr);
            if self.registers.grayscale() {
                palette &= 0x30;
            }
            self.registers.data_buffer = self.memory.read(addr - 0x1000, video);
            palette | (self.registers.io_bus & 0xC0)
        } else {
            let buffered = self.registers.data_buffer;
            self.registers.data_buffer = self.memory.read(addr, video);
            buffered
        };

        self.increment_after_access(video);
        self.registers.io_bus = value;
        value
    }

    /// CPU write of $2000-$2007
    pub fn cpu_write<V: VideoBus>(&mut self, reg: u16, value: u8, video: &mut V) {
        self.registers.io_bus = value;
        match reg & 0x07 {
            0 => self.schedule(DelayedWrite::Control(value), CONTROL_DELAY, video),
            1 => self.schedule(DelayedWrite::Mask(value), MASK_DELAY, video),
            2 => {}
            3 => self.registers.oam_address = value,
            4 => {
                if self.is_rendering() {
                    // Ignored, but OAMADDR gets a glitchy increment of the sprite index
                    self.registers.oam_address = self.registers.oam_address.wrapping_add(4);
                } else {
                    self.sprites.write_oam(self.registers.oam_address, value);
                    self.registers.oam_address = self.registers.oam_address.wrapping_add(1);
                }
            }
            5 => {
                let write = if self.registers.w {
                    DelayedWrite::ScrollY(value)
                } else {
                    DelayedWrite::ScrollX(value)
                };
                self.schedule(write, SCROLL_DELAY, video);
                self.registers.w = !self.registers.w;
            }
            6 => {
                if self.registers.w {
                    let addr = self.registers.write_address_low(value);
                    self.schedule(DelayedWrite::Address(addr), ADDRESS_DELAY, video);
                } else {
                    self.registers.write_address_high(value);
                }
                self.registers.w = !self.registers.w;
            }
            _ => {
                let addr = self.registers.v & 0x3FFF;
                if !self.is_rendering() {
                    video.ppu_address(addr, self.timing.total_cycles());
                }
                self.memory.write(addr, value, video);
                self.increment_after_access(video);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Mirroring;

    /// 8 KiB of pattern RAM that records rising edges of A12
    struct ChrRam {
        chr: Vec<u8>,
        a12: bool,
        a12_rises: u32,
    }

    impl ChrRam {
        fn new() -> Self {
            Self {
                chr: vec![0; 0x2000],
                a12: false,
                a12_rises: 0,
            }
        }
    }

    impl VideoBus for ChrRam {
        fn chr_read(&self, addr: u16) -> u8 {
            self.chr[addr as usize & 0x1FFF]
        }

        fn chr_write(&mut self, addr: u16, value: u8) {
            self.chr[addr as usize & 0x1FFF] = value;
        }

        fn mirroring(&self) -> Mirroring {
            Mirroring::Vertical
        }

        fn ppu_address(&mut self, addr: u16, _ppu_cycle: u64) {
            let high = addr & 0x1000 != 0;
            if high && !self.a12 {
                self.a12_rises += 1;
            }
            self.a12 = high;
        }
    }

    #[derive(Default)]
    struct CaptureSink {
        pixels: Vec<(usize, usize, u16)>,
    }

    impl FrameSink for CaptureSink {
        fn set_pixel(&mut self, x: usize, y: usize, value: u16) {
            self.pixels.push((x, y, value));
        }
    }

    fn ppu() -> Ppu {
        Ppu::new(&MachineConfig::default())
    }

    fn run_until(ppu: &mut Ppu, video: &mut ChrRam, scanline: u16, dot: u16) {
        while !ppu.timing.at(scanline, dot) {
            ppu.tick(video);
        }
    }

    fn run_dots(ppu: &mut Ppu, video: &mut ChrRam, dots: u32) {
        for _ in 0..dots {
            ppu.tick(video);
        }
    }

    /// Point v at `addr` and let the delayed $2006 write land
    fn set_address(ppu: &mut Ppu, video: &mut ChrRam, addr: u16) {
        ppu.cpu_write(0x2006, (addr >> 8) as u8, video);
        ppu.cpu_write(0x2006, addr as u8, video);
        run_dots(ppu, video, 6);
    }

    #[test]
    fn test_control_write_is_delayed() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        run_until(&mut ppu, &mut video, 241, 10);

        ppu.cpu_write(0x2000, 0x80, &mut video);
        ppu.half_tick(&mut lines);
        assert!(!lines.nmi());

        ppu.tick(&mut video);
        ppu.half_tick(&mut lines);
        assert!(lines.nmi());
    }

    #[test]
    fn test_control_write_delay_grows_with_alignment() {
        let config = MachineConfig {
            alignment: 3,
            ..MachineConfig::default()
        };
        let mut ppu = Ppu::new(&config);
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        run_until(&mut ppu, &mut video, 241, 10);

        ppu.cpu_write(0x2000, 0x80, &mut video);
        ppu.tick(&mut video);
        ppu.half_tick(&mut lines);
        assert!(!lines.nmi());
        ppu.tick(&mut video);
        ppu.half_tick(&mut lines);
        assert!(lines.nmi());
    }

    #[test]
    fn test_vblank_sets_and_swaps_frame() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        run_until(&mut ppu, &mut video, 241, 1);
        assert!(!ppu.poll_frame_complete());
        ppu.tick(&mut video);
        assert!(ppu.poll_frame_complete());
        run_until(&mut ppu, &mut video, 241, 20);
        let mut lines = BusLines::new();
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x80, 0x80);
        assert!(!lines.take_nmi_cancel());
    }

    #[test]
    fn test_status_read_one_dot_early_suppresses_vblank() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        ppu.cpu_write(0x2000, 0x80, &mut video);
        run_until(&mut ppu, &mut video, 241, 1);

        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x80, 0);
        for _ in 0..20 {
            ppu.tick(&mut video);
            ppu.half_tick(&mut lines);
            assert!(!lines.nmi());
        }
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x80, 0);
        assert!(ppu.poll_frame_complete());
    }

    #[test]
    fn test_status_read_just_after_vblank_cancels_nmi() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        run_until(&mut ppu, &mut video, 241, 2);

        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x80, 0x80);
        assert!(lines.take_nmi_cancel());
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x80, 0);
    }

    #[test]
    fn test_status_read_clears_write_toggle_and_keeps_latch_bits() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        ppu.cpu_write(0x2006, 0x3F, &mut video);
        assert!(ppu.registers.w);
        ppu.cpu_write(0x2003, 0x1F, &mut video);
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines), 0x1F);
        assert!(!ppu.registers.w);
        // Write-only registers read back the latch
        assert_eq!(ppu.cpu_read(0x2005, &mut video, &mut lines), 0x1F);
    }

    #[test]
    fn test_vblank_cleared_on_prerender_line() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        run_until(&mut ppu, &mut video, 261, 1);
        assert!(ppu.status.vblank());
        ppu.tick(&mut video);
        assert!(!ppu.status.vblank());
    }

    #[test]
    fn test_data_read_is_buffered() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        set_address(&mut ppu, &mut video, 0x2000);
        ppu.cpu_write(0x2007, 0x11, &mut video);
        ppu.cpu_write(0x2007, 0x22, &mut video);

        set_address(&mut ppu, &mut video, 0x2000);
        let _ = ppu.cpu_read(0x2007, &mut video, &mut lines);
        assert_eq!(ppu.cpu_read(0x2007, &mut video, &mut lines), 0x11);
        assert_eq!(ppu.cpu_read(0x2007, &mut video, &mut lines), 0x22);
    }

    #[test]
    fn test_palette_read_bypasses_buffer() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        // Nametable byte under the palette ($2F00)
        set_address(&mut ppu, &mut video, 0x2F00);
        ppu.cpu_write(0x2007, 0x77, &mut video);
        set_address(&mut ppu, &mut video, 0x3F00);
        ppu.cpu_write(0x2007, 0x2A, &mut video);

        set_address(&mut ppu, &mut video, 0x3F00);
        assert_eq!(ppu.cpu_read(0x2007, &mut video, &mut lines) & 0x3F, 0x2A);
        assert_eq!(ppu.registers.data_buffer, 0x77);
    }

    /// Value left in $3F01 after v moves from $3F05 to $2001 during forced blank
    fn palette_after_leaving(config: &MachineConfig) -> u8 {
        let mut ppu = Ppu::new(config);
        let mut video = ChrRam::new();
        set_address(&mut ppu, &mut video, 0x3F05);
        ppu.cpu_write(0x2007, 0x21, &mut video);
        set_address(&mut ppu, &mut video, 0x3F05);
        set_address(&mut ppu, &mut video, 0x2001);
        assert_eq!(ppu.memory.read_palette(0x3F05), 0x21);
        ppu.memory.read_palette(0x3F01)
    }

    #[test]
    fn test_palette_corruption_on_late_alignment() {
        let early = MachineConfig {
            alignment: 0,
            ..MachineConfig::default()
        };
        assert_eq!(palette_after_leaving(&early), 0x00);

        let late = MachineConfig {
            alignment: 2,
            ..MachineConfig::default()
        };
        assert_eq!(palette_after_leaving(&late), 0x21);

        let quirk_off = MachineConfig {
            alignment: 2,
            quirks: Quirks {
                palette_corruption: false,
                ..Quirks::default()
            },
            ..MachineConfig::default()
        };
        assert_eq!(palette_after_leaving(&quirk_off), 0x00);
    }

    #[test]
    fn test_increment_32() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        ppu.cpu_write(0x2000, 0x04, &mut video);
        set_address(&mut ppu, &mut video, 0x2000);
        ppu.cpu_write(0x2007, 0x01, &mut video);
        assert_eq!(ppu.registers.v, 0x2020);
    }

    #[test]
    fn test_oam_write_during_rendering_bumps_address() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        ppu.cpu_write(0x2003, 0x10, &mut video);
        ppu.cpu_write(0x2004, 0xAB, &mut video);
        assert_eq!(ppu.sprites.read_oam(0x10), 0xAB);
        assert_eq!(ppu.registers.oam_address, 0x11);

        ppu.cpu_write(0x2001, 0x18, &mut video);
        run_until(&mut ppu, &mut video, 10, 10);
        ppu.cpu_write(0x2003, 0x20, &mut video);
        ppu.cpu_write(0x2004, 0xCD, &mut video);
        assert_eq!(ppu.registers.oam_address, 0x24);
        assert_eq!(ppu.sprites.read_oam(0x20), 0xFF);
    }

    #[test]
    fn test_oam_read_during_clear_returns_ff() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        ppu.cpu_write(0x2003, 0x00, &mut video);
        ppu.cpu_write(0x2004, 0x12, &mut video);
        ppu.cpu_write(0x2003, 0x00, &mut video);
        assert_eq!(ppu.cpu_read(0x2004, &mut video, &mut lines), 0x12);

        ppu.cpu_write(0x2001, 0x18, &mut video);
        run_until(&mut ppu, &mut video, 5, 30);
        assert_eq!(ppu.cpu_read(0x2004, &mut video, &mut lines), 0xFF);
    }

    #[test]
    fn test_odd_frame_skip_with_rendering() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        ppu.cpu_write(0x2001, 0x08, &mut video);
        // Frame 0 is even and full length
        run_dots(&mut ppu, &mut video, 341 * 262);
        assert!(ppu.timing.at(0, 0));
        // Frame 1 is odd and one dot shorter
        run_dots(&mut ppu, &mut video, 341 * 262 - 1);
        assert!(ppu.timing.at(0, 0));
        assert_eq!(ppu.frame_count(), 2);
    }

    #[test]
    fn test_frame_wraps_without_rendering() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        run_dots(&mut ppu, &mut video, 341 * 262);
        assert!(ppu.timing.at(0, 0));
        run_dots(&mut ppu, &mut video, 341 * 262);
        assert!(ppu.timing.at(0, 0));
        assert_eq!(ppu.frame_count(), 2);
    }

    /// Solid tile 0 (color 1), palette entries 0 and 1 set
    fn setup_solid_background(ppu: &mut Ppu, video: &mut ChrRam) {
        for row in 0..8 {
            video.chr[row] = 0xFF;
        }
        set_address(ppu, video, 0x3F00);
        ppu.cpu_write(0x2007, 0x0F, video);
        ppu.cpu_write(0x2007, 0x21, video);
        set_address(ppu, video, 0x2000);
    }

    #[test]
    fn test_background_renders_and_left_clip() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        setup_solid_background(&mut ppu, &mut video);
        ppu.cpu_write(0x2001, 0x08, &mut video);

        for _ in 0..2 {
            run_dots(&mut ppu, &mut video, 341 * 262);
        }
        let frame = ppu.front_buffer();
        assert_eq!(frame[100 * SCREEN_WIDTH + 100], 0x21);
        // Leftmost 8 pixels show the backdrop
        assert_eq!(frame[100 * SCREEN_WIDTH + 3], 0x0F);
    }

    #[test]
    fn test_forced_blank_shows_backdrop_and_palette_hack() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        set_address(&mut ppu, &mut video, 0x3F00);
        ppu.cpu_write(0x2007, 0x0F, &mut video);
        ppu.cpu_write(0x2007, 0x16, &mut video);
        set_address(&mut ppu, &mut video, 0x2000);
        run_dots(&mut ppu, &mut video, 341 * 262 * 2);
        assert!(ppu.front_buffer().iter().all(|&p| p == 0x0F));

        // v parked on $3F01 displays that entry everywhere
        set_address(&mut ppu, &mut video, 0x3F01);
        run_dots(&mut ppu, &mut video, 341 * 262 * 2);
        assert!(ppu.front_buffer().iter().all(|&p| p == 0x16));
    }

    #[test]
    fn test_emphasis_and_grayscale_bits() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        set_address(&mut ppu, &mut video, 0x3F00);
        ppu.cpu_write(0x2007, 0x2D, &mut video);
        set_address(&mut ppu, &mut video, 0x2000);
        ppu.cpu_write(0x2001, 0xA1, &mut video);
        run_dots(&mut ppu, &mut video, 341 * 262 * 2);
        assert_eq!(ppu.front_buffer()[0], 0x20 | (0b101 << 6));
    }

    #[test]
    fn test_sprite_0_hit() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        setup_solid_background(&mut ppu, &mut video);
        ppu.cpu_write(0x2003, 0, &mut video);
        for value in [50, 0, 0, 60] {
            ppu.cpu_write(0x2004, value, &mut video);
        }
        ppu.cpu_write(0x2001, 0x1E, &mut video);

        run_until(&mut ppu, &mut video, 50, 0);
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x40, 0);
        run_until(&mut ppu, &mut video, 52, 0);
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x40, 0x40);
    }

    #[test]
    fn test_sprite_0_hit_needs_opaque_background() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        let mut lines = BusLines::new();
        // Sprite uses tile 1 (opaque), background tile 0 stays transparent
        for row in 16..24 {
            video.chr[row] = 0xFF;
        }
        ppu.cpu_write(0x2003, 0, &mut video);
        for value in [50, 1, 0, 60] {
            ppu.cpu_write(0x2004, value, &mut video);
        }
        ppu.cpu_write(0x2001, 0x1E, &mut video);
        run_until(&mut ppu, &mut video, 200, 0);
        assert_eq!(ppu.cpu_read(0x2002, &mut video, &mut lines) & 0x40, 0);
    }

    #[test]
    fn test_sprite_fetches_toggle_a12_per_slot() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        // Background at $0000, sprites at $1000
        ppu.cpu_write(0x2000, 0x08, &mut video);
        ppu.cpu_write(0x2001, 0x18, &mut video);
        run_until(&mut ppu, &mut video, 10, 0);
        video.a12_rises = 0;
        run_until(&mut ppu, &mut video, 11, 0);
        // Garbage nametable fetches pull A12 low between the eight pattern fetches
        assert_eq!(video.a12_rises, 8);
    }

    #[test]
    fn test_address_write_glitch_on_coarse_x_increment() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        ppu.cpu_write(0x2001, 0x08, &mut video);
        run_until(&mut ppu, &mut video, 20, 101);
        // Lands on dot 104 right after coarse X reached 15: the new coarse X is ANDed with it
        ppu.cpu_write(0x2006, 0x00, &mut video);
        ppu.cpu_write(0x2006, 0x1F, &mut video);
        run_dots(&mut ppu, &mut video, 4);
        assert_eq!(ppu.registers.v & 0x041F, 0x0F);
    }

    #[test]
    fn test_present_and_frame_iterate_front_buffer() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        set_address(&mut ppu, &mut video, 0x3F00);
        ppu.cpu_write(0x2007, 0x05, &mut video);
        set_address(&mut ppu, &mut video, 0x2000);
        run_dots(&mut ppu, &mut video, 341 * 262);

        let mut sink = CaptureSink::default();
        ppu.present(&mut sink);
        assert_eq!(sink.pixels.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
        assert_eq!(sink.pixels[SCREEN_WIDTH + 2], (2, 1, 0x05));
        assert_eq!(ppu.frame().count(), SCREEN_WIDTH * SCREEN_HEIGHT);
    }

    #[test]
    fn test_oam_corruption_after_mid_line_disable() {
        let mut ppu = ppu();
        let mut video = ChrRam::new();
        ppu.cpu_write(0x2003, 0, &mut video);
        for i in 0..=255u8 {
            ppu.cpu_write(0x2004, i & 0xE3, &mut video);
        }
        ppu.cpu_write(0x2001, 0x18, &mut video);
        run_until(&mut ppu, &mut video, 30, 8);
        // Disable lands at dot 9 (row 4), re-enable resumes rendering
        ppu.cpu_write(0x2001, 0x00, &mut video);
        run_until(&mut ppu, &mut video, 30, 40);
        ppu.cpu_write(0x2001, 0x18, &mut video);
        run_dots(&mut ppu, &mut video, 4);
        assert_eq!(ppu.sprites.read_oam(32), ppu.sprites.read_oam(0));
        assert_eq!(ppu.sprites.read_oam(33), ppu.sprites.read_oam(1));
        assert_eq!(ppu.sprites.read_oam(40), 40 & 0xE3);
    }
}
