use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How CPU work RAM is filled on power-on
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum RamInit {
    /// Every byte cleared to $00
    Zeroed,
    /// Four $00 bytes followed by four $FF bytes, repeating
    Pattern,
    /// Bytes drawn from a seeded generator (reproducible for a given seed)
    Random { seed: u64 },
}

impl RamInit {
    /// Fill `ram` according to this policy
    pub fn fill(&self, ram: &mut [u8]) {
        match *self {
            RamInit::Zeroed => ram.fill(0),
            RamInit::Pattern => {
                for (i, byte) in ram.iter_mut().enumerate() {
                    *byte = if i & 0x04 == 0 { 0x00 } else { 0xFF };
                }
            }
            RamInit::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                rng.fill(ram);
            }
        }
    }
}

/// Hardware-revision dependent behaviors.
///
/// The corruption patterns were measured on a single console and differ between
/// PPU revisions, so each one can be switched off for differential testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Quirks {
    /// Copy OAM row 0 over rows flagged when rendering is toggled mid-scanline
    pub oam_corruption: bool,
    /// Corrupt palette RAM when v leaves $3F00-$3FFF during forced blank
    pub palette_corruption: bool,
    /// Diagonal OAM scan after the eighth sprite (buggy overflow flag)
    pub sprite_overflow_bug: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            oam_corruption: true,
            palette_corruption: true,
            sprite_overflow_bug: true,
        }
    }
}

/// Machine-wide configuration, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct MachineConfig {
    /// Power-on content of the 2 KiB work RAM
    pub ram_init: RamInit,
    /// CPU/PPU phase alignment (0-3): the master-clock offset of the first PPU dot
    pub alignment: u8,
    pub quirks: Quirks,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            ram_init: RamInit::Pattern,
            alignment: 0,
            quirks: Quirks::default(),
        }
    }
}

impl MachineConfig {
    /// Alignment clamped to the valid 0-3 range
    pub fn alignment(&self) -> u8 {
        self.alignment & 0x03
    }
}
