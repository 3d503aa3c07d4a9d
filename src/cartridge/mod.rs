mod axrom;
mod cartridge;
mod cnrom;
pub mod ines;
mod mapper;
mod mmc1;
mod mmc3;
mod nrom;
mod uxrom;

pub use axrom::Axrom;
pub use cartridge::Cartridge;
pub use cnrom::Cnrom;
pub use mapper::{Board, Mapper, Mirroring, RamAccess};
pub use mmc1::Mmc1;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use uxrom::Uxrom;
