mod background;
mod memory;
#[allow(clippy::module_inception)]
mod ppu;
mod registers;
mod sprites;
mod status;
mod timing;

pub use background::Background;
pub use memory::{EmptySlot, Memory, VideoBus};
pub use ppu::{FrameSink, Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use registers::Registers;
pub use sprites::Sprites;
pub use status::Status;
pub use timing::Timing;
