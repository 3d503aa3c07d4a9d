// Cycle-accurate NES core: master clock, 6502, PPU, APU/DMA and cartridge boards.
// The library has no I/O; hosts drive `nes::Nes` and consume frames through a sink.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod config;
pub mod cpu;
#[cfg(feature = "frontend")]
pub mod eventloop;
pub mod joypad;
pub mod nes;
pub mod ppu;
pub mod signals;
