use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::Canvas;
use sdl2::video::Window;
use tracing::{info, warn};

use crate::joypad::Button;
use crate::nes::Nes;
use crate::ppu::{FrameSink, SCREEN_HEIGHT, SCREEN_WIDTH};

/// 2C02 colors for the 64 palette entries
const PALETTE_RGB: [(u8, u8, u8); 64] = [
    (84, 84, 84), (0, 30, 116), (8, 16, 144), (48, 0, 136), (68, 0, 100), (92, 0, 48), (84, 4, 0), (60, 24, 0),
    (32, 42, 0), (8, 58, 0), (0, 64, 0), (0, 60, 0), (0, 50, 60), (0, 0, 0), (0, 0, 0), (0, 0, 0),
    (152, 150, 152), (8, 76, 196), (48, 50, 236), (92, 30, 228), (136, 20, 176), (160, 20, 100), (152, 34, 32), (120, 60, 0),
    (84, 90, 0), (40, 114, 0), (8, 124, 0), (0, 118, 40), (0, 102, 120), (0, 0, 0), (0, 0, 0), (0, 0, 0),
    (236, 238, 236), (76, 154, 236), (120, 124, 236), (176, 98, 236), (228, 84, 236), (236, 88, 180), (236, 106, 100), (212, 136, 32),
    (160, 170, 0), (116, 196, 0), (76, 208, 32), (56, 204, 108), (56, 180, 204), (60, 60, 60), (0, 0, 0), (0, 0, 0),
    (236, 238, 236), (168, 204, 236), (188, 188, 236), (212, 178, 236), (236, 174, 236), (236, 174, 212), (236, 180, 176), (228, 196, 144),
    (204, 210, 120), (180, 222, 120), (168, 226, 144), (152, 226, 180), (160, 214, 228), (160, 162, 160), (0, 0, 0), (0, 0, 0),
];

/// NTSC frame rate
const FRAME_RATE: f64 = 60.0988;

/// Convert a 9-bit PPU pixel (palette index + emphasis bits) to RGB
pub fn pixel_to_rgb(pixel: u16) -> (u8, u8, u8) {
    let (mut r, mut g, mut b) = PALETTE_RGB[(pixel & 0x3F) as usize];
    let emphasis = (pixel >> 6) & 0x07;
    if emphasis != 0 {
        const ATTENUATION: f32 = 0.75;
        let dim = |c: u8| ((c as f32) * ATTENUATION) as u8;
        // Each emphasis bit darkens the two other primaries
        if emphasis & 0x01 == 0 {
            r = dim(r);
        }
        if emphasis & 0x02 == 0 {
            g = dim(g);
        }
        if emphasis & 0x04 == 0 {
            b = dim(b);
        }
    }
    (r, g, b)
}

/// RGB24 frame assembled from the PPU's pixel output
struct Screen<'a> {
    buffer: &'a mut [u8],
    pitch: usize,
}

impl FrameSink for Screen<'_> {
    fn set_pixel(&mut self, x: usize, y: usize, value: u16) {
        let (r, g, b) = pixel_to_rgb(value);
        let offset = y * self.pitch + x * 3;
        self.buffer[offset] = r;
        self.buffer[offset + 1] = g;
        self.buffer[offset + 2] = b;
    }
}

/// EventLoop manages the SDL2 window, keyboard input and frame pacing.
pub struct EventLoop {
    _sdl_context: sdl2::Sdl,
    canvas: Canvas<Window>,
    event_pump: sdl2::EventPump,
    timer: sdl2::TimerSubsystem,
}

impl EventLoop {
    const MIN_SCALE: f32 = 1.0;
    const MAX_SCALE: f32 = 5.0;

    /// Open a window `scale` times the NES resolution. The scale is clamped to 1-5.
    pub fn new(scale: f32) -> Result<Self, String> {
        let scale = Self::clamp_scale(scale);
        let sdl_context = sdl2::init()?;
        let event_pump = sdl_context.event_pump()?;
        let timer = sdl_context.timer()?;
        let video_subsystem = sdl_context.video()?;

        let width = (SCREEN_WIDTH as f32 * scale) as u32;
        let height = (SCREEN_HEIGHT as f32 * scale) as u32;
        let window = video_subsystem
            .window("nescycle", width, height)
            .position_centered()
            .build()
            .map_err(|e| e.to_string())?;
        let canvas = window.into_canvas().build().map_err(|e| e.to_string())?;

        Ok(EventLoop {
            _sdl_context: sdl_context,
            canvas,
            event_pump,
            timer,
        })
    }

    fn clamp_scale(scale: f32) -> f32 {
        let clamped = scale.clamp(Self::MIN_SCALE, Self::MAX_SCALE);
        if clamped != scale {
            warn!(scale, clamped, "window scale out of range");
        }
        clamped
    }

    fn button_for(keycode: Keycode) -> Option<Button> {
        match keycode {
            Keycode::X => Some(Button::A),
            Keycode::Z => Some(Button::B),
            Keycode::RShift => Some(Button::Select),
            Keycode::Return => Some(Button::Start),
            Keycode::Up => Some(Button::Up),
            Keycode::Down => Some(Button::Down),
            Keycode::Left => Some(Button::Left),
            Keycode::Right => Some(Button::Right),
            _ => None,
        }
    }

    /// Returns false when the user asked to quit
    fn handle_events(&mut self, nes: &mut Nes) -> bool {
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => return false,
                Event::KeyDown {
                    keycode: Some(Keycode::F5),
                    repeat: false,
                    ..
                } => nes.reset(),
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(button) = Self::button_for(keycode) {
                        nes.joypads_mut().port_mut(0).set_button(button, true);
                    }
                }
                Event::KeyUp {
                    keycode: Some(keycode),
                    ..
                } => {
                    if let Some(button) = Self::button_for(keycode) {
                        nes.joypads_mut().port_mut(0).set_button(button, false);
                    }
                }
                _ => {}
            }
        }
        true
    }

    /// Run frames until the window closes or `frames` frames have been shown
    pub fn run(&mut self, nes: &mut Nes, frames: Option<u64>) -> Result<(), String> {
        let texture_creator = self.canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32)
            .map_err(|e| e.to_string())?;

        let frequency = self.timer.performance_frequency() as f64;
        let frame_time = 1.0 / FRAME_RATE;
        let mut shown = 0u64;

        while frames.is_none_or(|limit| shown < limit) {
            let start = self.timer.performance_counter();
            if !self.handle_events(nes) {
                break;
            }

            nes.step_frame();
            texture.with_lock(None, |buffer: &mut [u8], pitch: usize| {
                nes.present(&mut Screen { buffer, pitch });
            })?;
            self.canvas.clear();
            self.canvas.copy(&texture, None, None)?;
            self.canvas.present();
            shown += 1;

            let elapsed = (self.timer.performance_counter() - start) as f64 / frequency;
            if elapsed < frame_time {
                std::thread::sleep(std::time::Duration::from_secs_f64(frame_time - elapsed));
            }
        }
        info!(frames = shown, "window closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_to_rgb_plain() {
        assert_eq!(pixel_to_rgb(0x00), (84, 84, 84));
        assert_eq!(pixel_to_rgb(0x30), (236, 238, 236));
    }

    #[test]
    fn test_emphasis_dims_other_channels() {
        // Red emphasis keeps red and dims green/blue
        let (r, g, b) = pixel_to_rgb(0x30 | (0x01 << 6));
        assert_eq!(r, 236);
        assert_eq!(g, (238.0f32 * 0.75) as u8);
        assert_eq!(b, (236.0f32 * 0.75) as u8);
    }

    #[test]
    fn test_clamp_scale() {
        assert_eq!(EventLoop::clamp_scale(0.5), 1.0);
        assert_eq!(EventLoop::clamp_scale(9.0), 5.0);
        assert_eq!(EventLoop::clamp_scale(2.0), 2.0);
    }
}
