#[allow(clippy::module_inception)]
mod apu;
mod dma;
mod dmc;
mod envelope;
mod frame_counter;
mod length_counter;
mod noise;
mod pulse;
mod timer;
mod triangle;

pub use apu::Apu;
pub use dma::Dma;
pub use frame_counter::FrameClock;
