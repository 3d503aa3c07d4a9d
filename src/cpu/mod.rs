#[allow(clippy::module_inception)]
mod cpu;
mod opcode;
mod operations;

pub use cpu::{Cpu, CpuBus};
pub use opcode::{Access, Mnemonic, Mode, OPCODES, OpCode};
