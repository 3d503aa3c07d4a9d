//! DMA arbitration between sprite (OAM) copies and DMC sample fetches.
//!
//! Both units steal cycles from the CPU. A pending request first waits for the CPU
//! to reach a read cycle, which is replaced by a halt cycle. After that the DMA
//! owns the bus one cycle at a time: "get" cycles (even CPU cycles) read, "put"
//! cycles (odd) write. DMC wins a shared get cycle, OAM wins a shared put cycle,
//! and sprite DMA cycles also count as the DMC unit's halt/alignment cycles.

use tracing::trace;

use crate::cpu::CpuBus;

const OAM_DATA: u16 = 0x2004;
const OAM_TRANSFER_STEPS: u16 = 0x200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Dma {
    oam_running: bool,
    oam_page: u8,
    oam_offset: u8,
    oam_counter: u16,
    oam_latch: u8,

    dmc_running: bool,
    need_dummy: bool,
    abort_dmc: bool,

    /// A request is waiting for the CPU to reach a read cycle
    need_halt: bool,
    /// The CPU is halted and the bus belongs to the DMA
    in_progress: bool,
    /// Address the CPU was reading when halted; repeated on idle cycles
    halt_addr: u16,
    /// The current CPU cycle is the halt cycle
    halt_cycle: bool,
}

impl Dma {
    pub fn new() -> Self {
        Self::default()
    }

    /// $4014 write: copy 256 bytes from `page << 8` to OAM
    pub fn start_oam(&mut self, page: u8) {
        trace!(page, "OAM DMA requested");
        self.oam_running = true;
        self.oam_page = page;
        self.oam_offset = 0;
        self.oam_counter = 0;
        self.need_halt = true;
    }

    /// The DMC sample buffer emptied and more bytes remain
    pub fn start_dmc(&mut self) {
        self.dmc_running = true;
        self.need_dummy = true;
        self.need_halt = true;
    }

    /// The DMC channel was disabled through $4015
    pub fn stop_dmc(&mut self) {
        if self.dmc_running {
            if (self.need_halt && !self.in_progress) || self.halt_cycle {
                // Not past the halt cycle yet: cancel outright
                self.dmc_running = false;
                self.need_dummy = false;
                self.need_halt = self.need_halt && self.oam_running;
                self.in_progress = self.in_progress && self.oam_running;
            } else {
                self.abort_dmc = true;
            }
        }
    }

    /// True when the next CPU read cycle must be turned into a halt cycle
    pub fn need_halt(&self) -> bool {
        self.need_halt && !self.in_progress
    }

    /// True while the DMA owns the bus
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn dmc_pending(&self) -> bool {
        self.dmc_running
    }

    /// The halt cycle. The CPU's read of `addr` on this cycle has already been
    /// performed on the bus and its result discarded.
    pub fn halt(&mut self, addr: u16) {
        self.halt_addr = addr;
        self.halt_cycle = true;
        self.need_halt = false;
        self.in_progress = self.dmc_running || self.oam_running;
    }

    /// Flags consumed by every DMA cycle, in priority order
    fn process_cycle(&mut self) {
        if self.abort_dmc {
            self.dmc_running = false;
            self.abort_dmc = false;
            self.need_dummy = false;
            self.need_halt = false;
        } else if self.need_halt {
            self.need_halt = false;
        } else if self.need_dummy {
            self.need_dummy = false;
        }
    }

    fn dummy_read<B: CpuBus>(&self, bus: &mut B) {
        // Controller ports are not re-read by idle DMA cycles
        if self.halt_addr != 0x4016 && self.halt_addr != 0x4017 {
            bus.read(self.halt_addr);
        }
    }

    /// Run one bus cycle on behalf of the DMA. Returns the byte fetched for the
    /// DMC sample buffer, if this was the DMC's read cycle.
    pub fn cycle<B: CpuBus>(&mut self, bus: &mut B, dmc_addr: u16, cpu_cycle: u64) -> Option<u8> {
        let get_cycle = cpu_cycle & 0x01 == 0;
        let mut fetched = None;
        self.halt_cycle = false;

        if get_cycle {
            if self.dmc_running && !self.need_halt && !self.need_dummy {
                self.process_cycle();
                fetched = Some(bus.read(dmc_addr));
                self.dmc_running = false;
                self.abort_dmc = false;
            } else if self.oam_running {
                self.process_cycle();
                let addr = (self.oam_page as u16) << 8 | self.oam_offset as u16;
                self.oam_latch = bus.read(addr);
                self.oam_offset = self.oam_offset.wrapping_add(1);
                self.oam_counter += 1;
            } else {
                self.process_cycle();
                self.dummy_read(bus);
            }
        } else if self.oam_running && self.oam_counter & 0x01 == 1 {
            self.process_cycle();
            bus.write(OAM_DATA, self.oam_latch);
            self.oam_counter += 1;
            if self.oam_counter == OAM_TRANSFER_STEPS {
                self.oam_running = false;
            }
        } else {
            // Alignment cycle
            self.process_cycle();
            self.dummy_read(bus);
        }

        self.in_progress = self.dmc_running || self.oam_running;
        fetched
    }
}
