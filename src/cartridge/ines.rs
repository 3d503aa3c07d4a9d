//! iNES image loader

use std::io;

use crate::cartridge::{Cartridge, Mirroring};

const HEADER_SIZE: usize = 16;
const TRAINER_SIZE: usize = 512;
const PRG_UNIT: usize = 16384; // 16 KB units
const CHR_UNIT: usize = 8192; // 8 KB units

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

/// Parse an iNES v1 image (NES 2.0 headers are read as v1)
pub fn parse(data: &[u8]) -> io::Result<Cartridge> {
    // Validate iNES header (first 4 bytes should be "NES\x1A")
    if data.len() < HEADER_SIZE || &data[0..4] != b"NES\x1A" {
        return Err(invalid("Invalid iNES file format"));
    }

    let prg_rom_size = data[4] as usize * PRG_UNIT;
    let chr_rom_size = data[5] as usize * CHR_UNIT;
    let flags6 = data[6];
    let mut flags7 = data[7];

    if prg_rom_size == 0 {
        return Err(invalid("iNES image has no PRG ROM"));
    }

    // Old dumps carry garbage ("DiskDude!") in bytes 7-15. The upper mapper nibble
    // is only trusted if the padding is clean or the header is NES 2.0.
    let nes2 = flags7 & 0x0C == 0x08;
    if !nes2 && data[12..16].iter().any(|&b| b != 0) {
        flags7 = 0;
    }
    let mapper_id = (flags6 >> 4) | (flags7 & 0xF0);

    // Bit 3: Four-screen mode, Bit 0: Mirroring (0 = horizontal, 1 = vertical)
    let mirroring = if flags6 & 0x08 != 0 {
        Mirroring::FourScreen
    } else if flags6 & 0x01 != 0 {
        Mirroring::Vertical
    } else {
        Mirroring::Horizontal
    };
    let battery = flags6 & 0x02 != 0;

    let trainer = if flags6 & 0x04 != 0 { TRAINER_SIZE } else { 0 };
    let prg_rom_start = HEADER_SIZE + trainer;
    let chr_rom_start = prg_rom_start + prg_rom_size;
    let chr_rom_end = chr_rom_start + chr_rom_size;

    if data.len() < chr_rom_end {
        return Err(invalid("File too small for specified ROM sizes"));
    }

    let prg_rom = data[prg_rom_start..chr_rom_start].to_vec();
    let chr_rom = data[chr_rom_start..chr_rom_end].to_vec();

    Ok(Cartridge::new(mapper_id, prg_rom, chr_rom, mirroring, battery))
}
