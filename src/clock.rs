/// Master oscillator periods per CPU cycle
pub const MASTER_PER_CPU: u64 = 12;
/// Master oscillator periods per PPU dot
pub const MASTER_PER_PPU: u64 = 4;

/// Which components run on one master tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Phases {
    pub cpu: bool,
    pub ppu: bool,
    pub ppu_half: bool,
    pub apu: bool,
}

/// The NTSC master oscillator and the four derived clock counters.
///
/// The CPU and APU share the phase where `master % 12 == 0`. The PPU's full dot
/// lands `alignment` periods later (mod 4) and its half dot two periods after that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct MasterClock {
    master: u64,
    cpu: u64,
    ppu: u64,
    /// APU half-cycles (one per CPU cycle)
    apu: u64,
    alignment: u8,
}

impl MasterClock {
    pub fn new(alignment: u8) -> Self {
        Self {
            alignment: alignment & 0x03,
            ..Self::default()
        }
    }

    /// Components clocked by the tick about to run
    pub fn phases(&self) -> Phases {
        let cpu = self.master % MASTER_PER_CPU == 0;
        let ppu_phase = (self.master % MASTER_PER_PPU) as u8;
        Phases {
            cpu,
            ppu: ppu_phase == self.alignment,
            ppu_half: ppu_phase == (self.alignment + 2) & 0x03,
            apu: cpu,
        }
    }

    /// Close the tick described by `phases`
    pub fn advance(&mut self, phases: Phases) {
        self.master += 1;
        if phases.cpu {
            self.cpu += 1;
        }
        if phases.ppu {
            self.ppu += 1;
        }
        if phases.apu {
            self.apu += 1;
        }
    }

    pub fn master_ticks(&self) -> u64 {
        self.master
    }

    /// CPU cycles started so far. During the CPU stage of a tick this is the index
    /// of the cycle in flight.
    pub fn cpu_cycles(&self) -> u64 {
        self.cpu
    }

    pub fn ppu_cycles(&self) -> u64 {
        self.ppu
    }

    pub fn apu_cycles(&self) -> u64 {
        self.apu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(clock: &mut MasterClock, ticks: u64) -> Vec<Phases> {
        (0..ticks)
            .map(|_| {
                let phases = clock.phases();
                clock.advance(phases);
                phases
            })
            .collect()
    }

    #[test]
    fn test_three_dots_per_cpu_cycle() {
        let mut clock = MasterClock::new(0);
        run(&mut clock, MASTER_PER_CPU * 100);
        assert_eq!(clock.cpu_cycles(), 100);
        assert_eq!(clock.apu_cycles(), 100);
        assert_eq!(clock.ppu_cycles(), 300);
        assert_eq!(clock.master_ticks(), 1200);
    }

    #[test]
    fn test_alignment_offsets_ppu_phase() {
        let mut clock = MasterClock::new(3);
        let phases = run(&mut clock, 12);
        let full: Vec<usize> = (0..12).filter(|&i| phases[i].ppu).collect();
        let half: Vec<usize> = (0..12).filter(|&i| phases[i].ppu_half).collect();
        assert_eq!(full, vec![3, 7, 11]);
        assert_eq!(half, vec![1, 5, 9]);
        assert!(phases[0].cpu && phases[0].apu);
        assert!((1..12).all(|i| !phases[i].cpu));
    }

    #[test]
    fn test_alignment_zero_shares_cpu_tick() {
        let clock = MasterClock::new(0);
        let phases = clock.phases();
        assert!(phases.cpu && phases.ppu && !phases.ppu_half);
    }
}
