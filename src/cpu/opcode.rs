//! Opcode table: each of the 256 opcodes decoded to a mnemonic and an addressing mode.
//!
//! The cycle-level behavior lives in `cpu.rs`; it is selected by the mode for
//! ordinary loads/stores/read-modify-writes and by the mnemonic for control flow.

/// CPU operation mnemonic (documented and undocumented)
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    // Load/Store
    LDA,
    LDX,
    LDY,
    STA,
    STX,
    STY,
    // Arithmetic / logical
    ADC,
    SBC,
    AND,
    ORA,
    EOR,
    BIT,
    CMP,
    CPX,
    CPY,
    // Shift/Rotate and increment
    ASL,
    LSR,
    ROL,
    ROR,
    INC,
    DEC,
    INX,
    INY,
    DEX,
    DEY,
    // Transfer
    TAX,
    TAY,
    TXA,
    TYA,
    TSX,
    TXS,
    // Flags
    CLC,
    SEC,
    CLI,
    SEI,
    CLV,
    CLD,
    SED,
    // Stack
    PHA,
    PHP,
    PLA,
    PLP,
    // Control flow
    JMP,
    JSR,
    RTS,
    RTI,
    BRK,
    BPL,
    BMI,
    BVC,
    BVS,
    BCC,
    BCS,
    BNE,
    BEQ,
    NOP,
    // Undocumented combined read-modify-write operations
    SLO,
    RLA,
    SRE,
    RRA,
    DCP,
    ISC,
    // Undocumented loads/stores
    LAX,
    SAX,
    LAS,
    // Undocumented immediate operations
    ANC,
    ALR,
    ARR,
    AXS,
    XAA,
    LXA,
    // Address-corrupting stores (value ANDed with high address byte + 1)
    SHA,
    SHX,
    SHY,
    TAS,
    /// Locks the CPU until reset
    KIL,
}

/// Addressing mode, which selects the bus cycle sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndexedIndirect,
    IndirectIndexed,
    Indirect,
    Relative,
}

/// How the instruction touches its effective address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Modify,
}

impl Mnemonic {
    pub fn access(self) -> Access {
        use Mnemonic::*;
        match self {
            STA | STX | STY | SAX | SHA | SHX | SHY | TAS => Access::Write,
            ASL | LSR | ROL | ROR | INC | DEC | SLO | RLA | SRE | RRA | DCP | ISC => {
                Access::Modify
            }
            _ => Access::Read,
        }
    }
}

/// OpCode definition combining mnemonic and addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
}

const fn op(mnemonic: Mnemonic, mode: Mode) -> OpCode {
    OpCode { mnemonic, mode }
}

use Mnemonic::*;
use Mode::{
    Absolute as ABS, AbsoluteX as ABX, AbsoluteY as ABY, Accumulator as ACC, Immediate as IMM,
    Implied as IMP, IndexedIndirect as IZX, Indirect as IND, IndirectIndexed as IZY,
    Relative as REL, ZeroPage as ZP0, ZeroPageX as ZPX, ZeroPageY as ZPY,
};

#[rustfmt::skip]
pub static OPCODES: [OpCode; 256] = [
    // 0x00
    op(BRK, IMP), op(ORA, IZX), op(KIL, IMP), op(SLO, IZX), op(NOP, ZP0), op(ORA, ZP0), op(ASL, ZP0), op(SLO, ZP0),
    op(PHP, IMP), op(ORA, IMM), op(ASL, ACC), op(ANC, IMM), op(NOP, ABS), op(ORA, ABS), op(ASL, ABS), op(SLO, ABS),
    // 0x10
    op(BPL, REL), op(ORA, IZY), op(KIL, IMP), op(SLO, IZY), op(NOP, ZPX), op(ORA, ZPX), op(ASL, ZPX), op(SLO, ZPX),
    op(CLC, IMP), op(ORA, ABY), op(NOP, IMP), op(SLO, ABY), op(NOP, ABX), op(ORA, ABX), op(ASL, ABX), op(SLO, ABX),
    // 0x20
    op(JSR, ABS), op(AND, IZX), op(KIL, IMP), op(RLA, IZX), op(BIT, ZP0), op(AND, ZP0), op(ROL, ZP0), op(RLA, ZP0),
    op(PLP, IMP), op(AND, IMM), op(ROL, ACC), op(ANC, IMM), op(BIT, ABS), op(AND, ABS), op(ROL, ABS), op(RLA, ABS),
    // 0x30
    op(BMI, REL), op(AND, IZY), op(KIL, IMP), op(RLA, IZY), op(NOP, ZPX), op(AND, ZPX), op(ROL, ZPX), op(RLA, ZPX),
    op(SEC, IMP), op(AND, ABY), op(NOP, IMP), op(RLA, ABY), op(NOP, ABX), op(AND, ABX), op(ROL, ABX), op(RLA, ABX),
    // 0x40
    op(RTI, IMP), op(EOR, IZX), op(KIL, IMP), op(SRE, IZX), op(NOP, ZP0), op(EOR, ZP0), op(LSR, ZP0), op(SRE, ZP0),
    op(PHA, IMP), op(EOR, IMM), op(LSR, ACC), op(ALR, IMM), op(JMP, ABS), op(EOR, ABS), op(LSR, ABS), op(SRE, ABS),
    // 0x50
    op(BVC, REL), op(EOR, IZY), op(KIL, IMP), op(SRE, IZY), op(NOP, ZPX), op(EOR, ZPX), op(LSR, ZPX), op(SRE, ZPX),
    op(CLI, IMP), op(EOR, ABY), op(NOP, IMP), op(SRE, ABY), op(NOP, ABX), op(EOR, ABX), op(LSR, ABX), op(SRE, ABX),
    // 0x60
    op(RTS, IMP), op(ADC, IZX), op(KIL, IMP), op(RRA, IZX), op(NOP, ZP0), op(ADC, ZP0), op(ROR, ZP0), op(RRA, ZP0),
    op(PLA, IMP), op(ADC, IMM), op(ROR, ACC), op(ARR, IMM), op(JMP, IND), op(ADC, ABS), op(ROR, ABS), op(RRA, ABS),
    // 0x70
    op(BVS, REL), op(ADC, IZY), op(KIL, IMP), op(RRA, IZY), op(NOP, ZPX), op(ADC, ZPX), op(ROR, ZPX), op(RRA, ZPX),
    op(SEI, IMP), op(ADC, ABY), op(NOP, IMP), op(RRA, ABY), op(NOP, ABX), op(ADC, ABX), op(ROR, ABX), op(RRA, ABX),
    // 0x80
    op(NOP, IMM), op(STA, IZX), op(NOP, IMM), op(SAX, IZX), op(STY, ZP0), op(STA, ZP0), op(STX, ZP0), op(SAX, ZP0),
    op(DEY, IMP), op(NOP, IMM), op(TXA, IMP), op(XAA, IMM), op(STY, ABS), op(STA, ABS), op(STX, ABS), op(SAX, ABS),
    // 0x90
    op(BCC, REL), op(STA, IZY), op(KIL, IMP), op(SHA, IZY), op(STY, ZPX), op(STA, ZPX), op(STX, ZPY), op(SAX, ZPY),
    op(TYA, IMP), op(STA, ABY), op(TXS, IMP), op(TAS, ABY), op(SHY, ABX), op(STA, ABX), op(SHX, ABY), op(SHA, ABY),
    // 0xA0
    op(LDY, IMM), op(LDA, IZX), op(LDX, IMM), op(LAX, IZX), op(LDY, ZP0), op(LDA, ZP0), op(LDX, ZP0), op(LAX, ZP0),
    op(TAY, IMP), op(LDA, IMM), op(TAX, IMP), op(LXA, IMM), op(LDY, ABS), op(LDA, ABS), op(LDX, ABS), op(LAX, ABS),
    // 0xB0
    op(BCS, REL), op(LDA, IZY), op(KIL, IMP), op(LAX, IZY), op(LDY, ZPX), op(LDA, ZPX), op(LDX, ZPY), op(LAX, ZPY),
    op(CLV, IMP), op(LDA, ABY), op(TSX, IMP), op(LAS, ABY), op(LDY, ABX), op(LDA, ABX), op(LDX, ABY), op(LAX, ABY),
    // 0xC0
    op(CPY, IMM), op(CMP, IZX), op(NOP, IMM), op(DCP, IZX), op(CPY, ZP0), op(CMP, ZP0), op(DEC, ZP0), op(DCP, ZP0),
    op(INY, IMP), op(CMP, IMM), op(DEX, IMP), op(AXS, IMM), op(CPY, ABS), op(CMP, ABS), op(DEC, ABS), op(DCP, ABS),
    // 0xD0
    op(BNE, REL), op(CMP, IZY), op(KIL, IMP), op(DCP, IZY), op(NOP, ZPX), op(CMP, ZPX), op(DEC, ZPX), op(DCP, ZPX),
    op(CLD, IMP), op(CMP, ABY), op(NOP, IMP), op(DCP, ABY), op(NOP, ABX), op(CMP, ABX), op(DEC, ABX), op(DCP, ABX),
    // 0xE0
    op(CPX, IMM), op(SBC, IZX), op(NOP, IMM), op(ISC, IZX), op(CPX, ZP0), op(SBC, ZP0), op(INC, ZP0), op(ISC, ZP0),
    op(INX, IMP), op(SBC, IMM), op(NOP, IMP), op(SBC, IMM), op(CPX, ABS), op(SBC, ABS), op(INC, ABS), op(ISC, ABS),
    // 0xF0
    op(BEQ, REL), op(SBC, IZY), op(KIL, IMP), op(ISC, IZY), op(NOP, ZPX), op(SBC, ZPX), op(INC, ZPX), op(ISC, ZPX),
    op(SED, IMP), op(SBC, ABY), op(NOP, IMP), op(ISC, ABY), op(NOP, ABX), op(SBC, ABX), op(INC, ABX), op(ISC, ABX),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kil_opcodes() {
        let kil: Vec<usize> = (0..256).filter(|&i| OPCODES[i].mnemonic == KIL).collect();
        assert_eq!(
            kil,
            vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]
        );
    }

    #[test]
    fn test_documented_samples() {
        assert_eq!(OPCODES[0xA9], op(LDA, IMM));
        assert_eq!(OPCODES[0x6C], op(JMP, IND));
        assert_eq!(OPCODES[0x96], op(STX, ZPY));
        assert_eq!(OPCODES[0xBE], op(LDX, ABY));
    }

    #[test]
    fn test_access_kinds() {
        assert_eq!(OPCODES[0x9D].mnemonic.access(), Access::Write);
        assert_eq!(OPCODES[0xFE].mnemonic.access(), Access::Modify);
        assert_eq!(OPCODES[0xB3].mnemonic.access(), Access::Read);
    }
}
