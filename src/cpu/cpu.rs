use tracing::warn;

use super::opcode::{Access, Mnemonic, Mode, OPCODES, OpCode};
use crate::signals::BusLines;

// Status register flags
pub(crate) const FLAG_C: u8 = 0b0000_0001; // Carry
pub(crate) const FLAG_Z: u8 = 0b0000_0010; // Zero
pub(crate) const FLAG_I: u8 = 0b0000_0100; // Interrupt disable
pub(crate) const FLAG_D: u8 = 0b0000_1000; // Decimal (no effect on this CPU)
pub(crate) const FLAG_B: u8 = 0b0001_0000; // Break (only exists on the stack)
pub(crate) const FLAG_U: u8 = 0b0010_0000; // Unused (always pushed as 1)
pub(crate) const FLAG_V: u8 = 0b0100_0000; // Overflow
pub(crate) const FLAG_N: u8 = 0b1000_0000; // Negative

// Interrupt vector addresses in memory
const NMI_VECTOR: u16 = 0xFFFA;
const RESET_VECTOR: u16 = 0xFFFC;
const IRQ_VECTOR: u16 = 0xFFFE;

const STACK_PAGE: u16 = 0x0100;

/// Memory seen by the CPU. Every call is exactly one bus cycle.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

/// Which variant of the shared opcode-0 microcode is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
enum Sequence {
    None,
    Break,
    Interrupt,
    Reset,
}

/// Which interrupt poll decides what runs after the current instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, bincode::Encode, bincode::Decode)]
enum PollMode {
    /// Poll taken at the start of the final cycle
    Final,
    /// Taken branch without page crossing: the poll of the operand cycle
    Branch,
    /// Interrupt sequences never poll
    Skip,
}

/// Cycle-stepped 6502 core.
///
/// `tick` performs exactly one bus cycle. `cycle` is the progress counter inside the
/// current instruction: 0 means the next tick fetches an opcode.
///
/// Interrupt lines are sampled through `sample_lines` once per CPU cycle before the
/// tick. The sample taken at the start of an instruction's final cycle is the one that
/// decides whether an interrupt sequence replaces the next opcode fetch.
#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
pub struct Cpu {
    /// Accumulator
    pub a: u8,
    /// X register
    pub x: u8,
    /// Y register
    pub y: u8,
    /// Stack pointer
    pub sp: u8,
    /// Program counter
    pub pc: u16,
    /// Status register (processor flags)
    pub p: u8,

    opcode: u8,
    cycle: u8,
    sequence: Sequence,
    poll_mode: PollMode,

    // Latches used while an instruction is in flight
    addr: u16,
    pointer: u8,
    data: u8,
    base_hi: u8,
    crossed: bool,

    // Last bus cycle
    address_bus: u16,
    last_write: bool,

    // Interrupt detection
    nmi_line: bool,
    nmi_edge: bool,
    nmi_detected: bool,
    irq_line: bool,
    poll_nmi: bool,
    poll_irq: bool,
    branch_poll_nmi: bool,
    branch_poll_irq: bool,
    pending_nmi: bool,
    pending_irq: bool,
    reset_pending: bool,

    jammed: bool,
    /// Cycle index at which a DMA last halted this instruction
    dma_cycle: Option<u8>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Power-on state. The first ticks run the reset sequence.
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x00,
            pc: 0,
            p: FLAG_U,
            opcode: 0,
            cycle: 0,
            sequence: Sequence::None,
            poll_mode: PollMode::Final,
            addr: 0,
            pointer: 0,
            data: 0,
            base_hi: 0,
            crossed: false,
            address_bus: 0,
            last_write: false,
            nmi_line: false,
            nmi_edge: false,
            nmi_detected: false,
            irq_line: false,
            poll_nmi: false,
            poll_irq: false,
            branch_poll_nmi: false,
            branch_poll_irq: false,
            pending_nmi: false,
            pending_irq: false,
            reset_pending: true,
            jammed: false,
            dma_cycle: None,
        }
    }

    /// Abort the current instruction and run the reset sequence next.
    /// Registers keep their values; the sequence lowers SP by 3 and sets I.
    pub fn reset(&mut self) {
        self.cycle = 0;
        self.sequence = Sequence::None;
        self.reset_pending = true;
        self.jammed = false;
        self.pending_nmi = false;
        self.pending_irq = false;
        self.nmi_detected = false;
    }

    /// True between instructions
    pub fn at_instruction_boundary(&self) -> bool {
        self.cycle == 0
    }

    /// Progress counter of the instruction in flight
    pub fn progress(&self) -> u8 {
        self.cycle
    }

    pub fn is_jammed(&self) -> bool {
        self.jammed
    }

    /// Address of the most recent bus cycle
    pub fn address_bus(&self) -> u16 {
        self.address_bus
    }

    /// Whether the most recent bus cycle was a write
    pub fn last_cycle_was_write(&self) -> bool {
        self.last_write
    }

    /// Record that a DMA halted the CPU on the cycle about to be (re)executed
    pub fn note_dma_halt(&mut self) {
        self.dma_cycle = Some(self.cycle);
    }

    /// Sample the interrupt lines at the start of a CPU cycle
    pub fn sample_lines(&mut self, lines: &BusLines) {
        let nmi = lines.nmi();
        self.nmi_edge = nmi && !self.nmi_line;
        if self.nmi_edge {
            self.nmi_detected = true;
        }
        self.nmi_line = nmi;
        self.irq_line = lines.irq();
    }

    /// Drop an NMI edge latched at the start of this cycle if the PPU withdrew it
    /// during the cycle (status read racing VBlank).
    pub fn settle_nmi_cancel(&mut self, lines: &mut BusLines) {
        if lines.take_nmi_cancel() && self.nmi_edge {
            self.nmi_edge = false;
            self.nmi_detected = false;
            self.pending_nmi = false;
        }
    }

    /// Execute one CPU cycle. Returns true when an instruction (or interrupt
    /// sequence) completed on this cycle.
    pub fn tick<B: CpuBus>(&mut self, bus: &mut B) -> bool {
        if self.jammed {
            self.read(bus, 0xFFFF);
            return false;
        }

        self.poll_nmi = self.nmi_detected;
        self.poll_irq = self.irq_line && self.p & FLAG_I == 0;

        let cycle = self.cycle;
        self.cycle += 1;
        if cycle == 0 {
            self.begin(bus);
            return false;
        }

        let done = self.execute(bus, cycle);
        if done {
            self.cycle = 0;
            let (nmi, irq) = match self.poll_mode {
                PollMode::Final => (self.poll_nmi, self.poll_irq),
                PollMode::Branch => (self.branch_poll_nmi, self.branch_poll_irq),
                PollMode::Skip => (false, false),
            };
            self.pending_nmi = nmi;
            self.pending_irq = irq;
        }
        done
    }

    fn read<B: CpuBus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        self.address_bus = addr;
        self.last_write = false;
        bus.read(addr)
    }

    fn write<B: CpuBus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        self.address_bus = addr;
        self.last_write = true;
        bus.write(addr, value);
    }

    /// Read the byte at PC and advance PC
    fn fetch<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn push<B: CpuBus>(&mut self, bus: &mut B, value: u8) {
        self.write(bus, STACK_PAGE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.read(bus, STACK_PAGE | self.sp as u16)
    }

    fn read_stack<B: CpuBus>(&mut self, bus: &mut B) {
        self.read(bus, STACK_PAGE | self.sp as u16);
    }

    /// Cycle 0: fetch an opcode, or substitute opcode 0 for a pending reset/interrupt
    fn begin<B: CpuBus>(&mut self, bus: &mut B) {
        self.poll_mode = PollMode::Final;
        self.dma_cycle = None;

        if self.reset_pending {
            self.reset_pending = false;
            self.sequence = Sequence::Reset;
            self.read(bus, self.pc);
            self.opcode = 0;
        } else if self.pending_nmi || self.pending_irq {
            self.pending_nmi = false;
            self.pending_irq = false;
            self.sequence = Sequence::Interrupt;
            self.read(bus, self.pc);
            self.opcode = 0;
        } else {
            self.opcode = self.fetch(bus);
            self.sequence = if self.opcode == 0x00 {
                Sequence::Break
            } else {
                Sequence::None
            };
        }
    }

    fn execute<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        if self.sequence != Sequence::None {
            return self.interrupt_sequence(bus, cycle);
        }

        let OpCode { mnemonic, mode } = OPCODES[self.opcode as usize];
        use Mnemonic::*;
        match mnemonic {
            JSR => self.jsr(bus, cycle),
            RTS => self.rts(bus, cycle),
            RTI => self.rti(bus, cycle),
            PHA | PHP => self.push_register(bus, cycle, mnemonic),
            PLA | PLP => self.pull_register(bus, cycle, mnemonic),
            JMP if mode == Mode::Indirect => self.jmp_indirect(bus, cycle),
            JMP => self.jmp_absolute(bus, cycle),
            KIL => {
                self.read(bus, self.pc);
                warn!(
                    opcode = self.opcode,
                    pc = self.pc.wrapping_sub(1),
                    "CPU jammed"
                );
                self.jammed = true;
                false
            }
            _ if mode == Mode::Relative => self.branch(bus, cycle, mnemonic),
            _ => self.addressed(bus, cycle, mnemonic, mode),
        }
    }

    /// Shared BRK / IRQ / NMI / RESET microcode (7 cycles)
    fn interrupt_sequence<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        match cycle {
            1 => {
                self.read(bus, self.pc);
                if self.sequence == Sequence::Break {
                    self.pc = self.pc.wrapping_add(1);
                }
                false
            }
            2 => {
                self.push_or_read_stack(bus, (self.pc >> 8) as u8);
                false
            }
            3 => {
                self.push_or_read_stack(bus, self.pc as u8);
                false
            }
            4 => {
                // The vector is chosen here: an NMI detected by now hijacks BRK/IRQ
                self.addr = if self.sequence == Sequence::Reset {
                    RESET_VECTOR
                } else if self.nmi_detected {
                    self.nmi_detected = false;
                    NMI_VECTOR
                } else {
                    IRQ_VECTOR
                };
                let break_flag = if self.sequence == Sequence::Break {
                    FLAG_B
                } else {
                    0
                };
                self.push_or_read_stack(bus, self.p | FLAG_U | break_flag);
                false
            }
            5 => {
                self.data = self.read(bus, self.addr);
                self.p |= FLAG_I;
                false
            }
            _ => {
                let hi = self.read(bus, self.addr.wrapping_add(1));
                self.pc = u16::from_le_bytes([self.data, hi]);
                self.sequence = Sequence::None;
                self.poll_mode = PollMode::Skip;
                true
            }
        }
    }

    /// Reset suppresses the stack writes but still walks SP down
    fn push_or_read_stack<B: CpuBus>(&mut self, bus: &mut B, value: u8) {
        if self.sequence == Sequence::Reset {
            self.read_stack(bus);
            self.sp = self.sp.wrapping_sub(1);
        } else {
            self.push(bus, value);
        }
    }

    fn jsr<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        match cycle {
            1 => {
                self.addr = self.fetch(bus) as u16;
                false
            }
            2 => {
                self.read_stack(bus);
                false
            }
            3 => {
                self.push(bus, (self.pc >> 8) as u8);
                false
            }
            4 => {
                self.push(bus, self.pc as u8);
                false
            }
            _ => {
                let hi = self.read(bus, self.pc);
                self.pc = (hi as u16) << 8 | self.addr;
                true
            }
        }
    }

    fn rts<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        match cycle {
            1 => {
                self.read(bus, self.pc);
                false
            }
            2 => {
                self.read_stack(bus);
                false
            }
            3 => {
                self.addr = self.pull(bus) as u16;
                false
            }
            4 => {
                let hi = self.pull(bus);
                self.pc = (hi as u16) << 8 | self.addr;
                false
            }
            _ => {
                self.read(bus, self.pc);
                self.pc = self.pc.wrapping_add(1);
                true
            }
        }
    }

    fn rti<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        match cycle {
            1 => {
                self.read(bus, self.pc);
                false
            }
            2 => {
                self.read_stack(bus);
                false
            }
            3 => {
                let status = self.pull(bus);
                self.p = (status & !FLAG_B) | FLAG_U;
                false
            }
            4 => {
                self.addr = self.pull(bus) as u16;
                false
            }
            _ => {
                let hi = self.pull(bus);
                self.pc = (hi as u16) << 8 | self.addr;
                true
            }
        }
    }

    fn push_register<B: CpuBus>(&mut self, bus: &mut B, cycle: u8, mnemonic: Mnemonic) -> bool {
        if cycle == 1 {
            self.read(bus, self.pc);
            return false;
        }
        let value = match mnemonic {
            Mnemonic::PHP => self.p | FLAG_B | FLAG_U,
            _ => self.a,
        };
        self.push(bus, value);
        true
    }

    fn pull_register<B: CpuBus>(&mut self, bus: &mut B, cycle: u8, mnemonic: Mnemonic) -> bool {
        match cycle {
            1 => {
                self.read(bus, self.pc);
                false
            }
            2 => {
                self.read_stack(bus);
                false
            }
            _ => {
                let value = self.pull(bus);
                match mnemonic {
                    Mnemonic::PLP => self.p = (value & !FLAG_B) | FLAG_U,
                    _ => self.read_operation(Mnemonic::LDA, value),
                }
                true
            }
        }
    }

    fn jmp_absolute<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        if cycle == 1 {
            self.addr = self.fetch(bus) as u16;
            return false;
        }
        let hi = self.read(bus, self.pc);
        self.pc = (hi as u16) << 8 | self.addr;
        true
    }

    fn jmp_indirect<B: CpuBus>(&mut self, bus: &mut B, cycle: u8) -> bool {
        match cycle {
            1 => {
                self.addr = self.fetch(bus) as u16;
                false
            }
            2 => {
                self.addr |= (self.fetch(bus) as u16) << 8;
                false
            }
            3 => {
                self.data = self.read(bus, self.addr);
                false
            }
            _ => {
                // The pointer high byte is fetched without carrying into the page
                let hi_addr = (self.addr & 0xFF00) | ((self.addr as u8).wrapping_add(1) as u16);
                let hi = self.read(bus, hi_addr);
                self.pc = u16::from_le_bytes([self.data, hi]);
                true
            }
        }
    }

    fn branch<B: CpuBus>(&mut self, bus: &mut B, cycle: u8, mnemonic: Mnemonic) -> bool {
        match cycle {
            1 => {
                self.data = self.fetch(bus);
                self.branch_poll_nmi = self.poll_nmi;
                self.branch_poll_irq = self.poll_irq;
                !self.branch_taken(mnemonic)
            }
            2 => {
                self.read(bus, self.pc);
                let target = self.pc.wrapping_add(self.data as i8 as u16);
                self.crossed = target & 0xFF00 != self.pc & 0xFF00;
                self.addr = target;
                self.pc = (self.pc & 0xFF00) | (target & 0x00FF);
                if self.crossed {
                    false
                } else {
                    self.poll_mode = PollMode::Branch;
                    true
                }
            }
            _ => {
                self.read(bus, self.pc);
                self.pc = self.addr;
                true
            }
        }
    }

    /// Instructions whose cycle sequence is fully determined by the addressing mode
    fn addressed<B: CpuBus>(
        &mut self,
        bus: &mut B,
        cycle: u8,
        mnemonic: Mnemonic,
        mode: Mode,
    ) -> bool {
        match mode {
            Mode::Implied | Mode::Accumulator => {
                self.read(bus, self.pc);
                self.implied_operation(mnemonic);
                true
            }
            Mode::Immediate => {
                let value = self.fetch(bus);
                self.read_operation(mnemonic, value);
                true
            }
            Mode::ZeroPage => match cycle {
                1 => {
                    self.addr = self.fetch(bus) as u16;
                    false
                }
                _ => self.access(bus, mnemonic, cycle - 2),
            },
            Mode::ZeroPageX | Mode::ZeroPageY => match cycle {
                1 => {
                    self.addr = self.fetch(bus) as u16;
                    false
                }
                2 => {
                    self.read(bus, self.addr);
                    let index = if mode == Mode::ZeroPageX { self.x } else { self.y };
                    self.addr = (self.addr as u8).wrapping_add(index) as u16;
                    false
                }
                _ => self.access(bus, mnemonic, cycle - 3),
            },
            Mode::Absolute => match cycle {
                1 => {
                    self.addr = self.fetch(bus) as u16;
                    false
                }
                2 => {
                    self.addr |= (self.fetch(bus) as u16) << 8;
                    false
                }
                _ => self.access(bus, mnemonic, cycle - 3),
            },
            Mode::AbsoluteX | Mode::AbsoluteY => match cycle {
                1 => {
                    self.addr = self.fetch(bus) as u16;
                    false
                }
                2 => {
                    let hi = self.fetch(bus);
                    let index = if mode == Mode::AbsoluteX { self.x } else { self.y };
                    self.index_address(hi, self.addr as u8, index);
                    false
                }
                3 => self.indexed_read(bus, mnemonic),
                _ => self.access(bus, mnemonic, cycle - 4),
            },
            Mode::IndexedIndirect => match cycle {
                1 => {
                    self.pointer = self.fetch(bus);
                    false
                }
                2 => {
                    self.read(bus, self.pointer as u16);
                    self.pointer = self.pointer.wrapping_add(self.x);
                    false
                }
                3 => {
                    self.addr = self.read(bus, self.pointer as u16) as u16;
                    false
                }
                4 => {
                    let hi = self.read(bus, self.pointer.wrapping_add(1) as u16);
                    self.addr |= (hi as u16) << 8;
                    false
                }
                _ => self.access(bus, mnemonic, cycle - 5),
            },
            Mode::IndirectIndexed => match cycle {
                1 => {
                    self.pointer = self.fetch(bus);
                    false
                }
                2 => {
                    self.addr = self.read(bus, self.pointer as u16) as u16;
                    false
                }
                3 => {
                    let hi = self.read(bus, self.pointer.wrapping_add(1) as u16);
                    self.index_address(hi, self.addr as u8, self.y);
                    false
                }
                4 => self.indexed_read(bus, mnemonic),
                _ => self.access(bus, mnemonic, cycle - 5),
            },
            // Handled by the mnemonic dispatch
            Mode::Indirect | Mode::Relative => true,
        }
    }

    /// Add an index to a base address without fixing the high byte yet
    fn index_address(&mut self, hi: u8, lo: u8, index: u8) {
        let sum = lo as u16 + index as u16;
        self.base_hi = hi;
        self.crossed = sum > 0xFF;
        self.addr = (hi as u16) << 8 | (sum & 0x00FF);
    }

    /// Read from the possibly-unfixed indexed address. Completes a read
    /// instruction when no page was crossed.
    fn indexed_read<B: CpuBus>(&mut self, bus: &mut B, mnemonic: Mnemonic) -> bool {
        let value = self.read(bus, self.addr);
        if self.crossed {
            self.addr = self.addr.wrapping_add(0x0100);
        } else if mnemonic.access() == Access::Read {
            self.read_operation(mnemonic, value);
            return true;
        }
        false
    }

    /// Effective-address access stage; `step` counts cycles since the address resolved
    fn access<B: CpuBus>(&mut self, bus: &mut B, mnemonic: Mnemonic, step: u8) -> bool {
        match mnemonic.access() {
            Access::Read => {
                let value = self.read(bus, self.addr);
                self.read_operation(mnemonic, value);
                true
            }
            Access::Write => {
                self.store(bus, mnemonic);
                true
            }
            Access::Modify => match step {
                0 => {
                    self.data = self.read(bus, self.addr);
                    false
                }
                1 => {
                    // Dummy write of the unmodified value
                    self.write(bus, self.addr, self.data);
                    self.data = self.modify_operation(mnemonic, self.data);
                    false
                }
                _ => {
                    self.write(bus, self.addr, self.data);
                    true
                }
            },
        }
    }

    fn store<B: CpuBus>(&mut self, bus: &mut B, mnemonic: Mnemonic) {
        use Mnemonic::*;
        let mut value = self.store_value(mnemonic);
        if matches!(mnemonic, SHA | SHX | SHY | TAS) {
            if mnemonic == TAS {
                self.sp = self.a & self.x;
            }
            // A DMA on the preceding cycle drops the "& (H+1)" term
            let write_cycle = self.cycle - 1;
            if self.dma_cycle != Some(write_cycle - 1) {
                value &= self.base_hi.wrapping_add(1);
            }
            if self.crossed {
                self.addr = (self.addr & 0x00FF) | (value as u16) << 8;
            }
        }
        self.write(bus, self.addr, value);
    }
}
