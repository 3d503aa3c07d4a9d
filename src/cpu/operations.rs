//! CPU operation implementations
//!
//! Operations are timing-independent: they apply the logical effect of an
//! instruction to the registers once the bus sequence has produced an operand.

use super::cpu::{Cpu, FLAG_C, FLAG_D, FLAG_I, FLAG_N, FLAG_V, FLAG_Z};
use super::opcode::Mnemonic;

// Unstable "magic" constants of the ANE/LXA opcodes, as measured on a front-loader
const XAA_MAGIC: u8 = 0xEE;
const LXA_MAGIC: u8 = 0xFF;

impl Cpu {
    fn set_flag(&mut self, flag: u8, condition: bool) {
        if condition {
            self.p |= flag;
        } else {
            self.p &= !flag;
        }
    }

    fn update_nz_flags(&mut self, value: u8) {
        self.set_flag(FLAG_N, value & 0x80 != 0);
        self.set_flag(FLAG_Z, value == 0);
    }

    fn carry(&self) -> u8 {
        self.p & FLAG_C
    }

    fn adc(&mut self, operand: u8) {
        let sum = self.a as u16 + operand as u16 + self.carry() as u16;
        // Overflow when both inputs share a sign the result does not
        let overflow = (self.a ^ sum as u8) & (operand ^ sum as u8) & 0x80 != 0;
        self.a = sum as u8;
        self.set_flag(FLAG_C, sum > 0xFF);
        self.set_flag(FLAG_V, overflow);
        self.update_nz_flags(self.a);
    }

    fn sbc(&mut self, operand: u8) {
        self.adc(!operand);
    }

    fn compare(&mut self, register: u8, operand: u8) {
        self.set_flag(FLAG_C, register >= operand);
        self.update_nz_flags(register.wrapping_sub(operand));
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x80 != 0);
        let result = value << 1;
        self.update_nz_flags(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x01 != 0);
        let result = value >> 1;
        self.update_nz_flags(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let result = (value << 1) | self.carry();
        self.set_flag(FLAG_C, value & 0x80 != 0);
        self.update_nz_flags(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let result = (value >> 1) | (self.carry() << 7);
        self.set_flag(FLAG_C, value & 0x01 != 0);
        self.update_nz_flags(result);
        result
    }

    /// Apply an operation that consumes a byte read from memory (or an immediate)
    pub(super) fn read_operation(&mut self, mnemonic: Mnemonic, operand: u8) {
        use Mnemonic::*;
        match mnemonic {
            LDA => {
                self.a = operand;
                self.update_nz_flags(self.a);
            }
            LDX => {
                self.x = operand;
                self.update_nz_flags(self.x);
            }
            LDY => {
                self.y = operand;
                self.update_nz_flags(self.y);
            }
            LAX => {
                self.a = operand;
                self.x = operand;
                self.update_nz_flags(operand);
            }
            ADC => self.adc(operand),
            SBC => self.sbc(operand),
            AND => {
                self.a &= operand;
                self.update_nz_flags(self.a);
            }
            ORA => {
                self.a |= operand;
                self.update_nz_flags(self.a);
            }
            EOR => {
                self.a ^= operand;
                self.update_nz_flags(self.a);
            }
            CMP => self.compare(self.a, operand),
            CPX => self.compare(self.x, operand),
            CPY => self.compare(self.y, operand),
            BIT => {
                self.set_flag(FLAG_Z, self.a & operand == 0);
                self.set_flag(FLAG_N, operand & 0x80 != 0);
                self.set_flag(FLAG_V, operand & 0x40 != 0);
            }
            ANC => {
                self.a &= operand;
                self.update_nz_flags(self.a);
                self.set_flag(FLAG_C, self.a & 0x80 != 0);
            }
            ALR => {
                let value = self.a & operand;
                self.a = self.lsr(value);
            }
            ARR => {
                let value = self.a & operand;
                self.a = (value >> 1) | (self.carry() << 7);
                self.update_nz_flags(self.a);
                self.set_flag(FLAG_C, self.a & 0x40 != 0);
                self.set_flag(FLAG_V, ((self.a >> 6) ^ (self.a >> 5)) & 0x01 != 0);
            }
            AXS => {
                let value = self.a & self.x;
                self.set_flag(FLAG_C, value >= operand);
                self.x = value.wrapping_sub(operand);
                self.update_nz_flags(self.x);
            }
            XAA => {
                self.a = (self.a | XAA_MAGIC) & self.x & operand;
                self.update_nz_flags(self.a);
            }
            LXA => {
                self.a = (self.a | LXA_MAGIC) & operand;
                self.x = self.a;
                self.update_nz_flags(self.a);
            }
            LAS => {
                let value = operand & self.sp;
                self.a = value;
                self.x = value;
                self.sp = value;
                self.update_nz_flags(value);
            }
            _ => {}
        }
    }

    /// Apply a read-modify-write operation; returns the byte to write back
    pub(super) fn modify_operation(&mut self, mnemonic: Mnemonic, value: u8) -> u8 {
        use Mnemonic::*;
        match mnemonic {
            ASL => self.asl(value),
            LSR => self.lsr(value),
            ROL => self.rol(value),
            ROR => self.ror(value),
            INC => {
                let result = value.wrapping_add(1);
                self.update_nz_flags(result);
                result
            }
            DEC => {
                let result = value.wrapping_sub(1);
                self.update_nz_flags(result);
                result
            }
            SLO => {
                let result = self.asl(value);
                self.read_operation(ORA, result);
                result
            }
            RLA => {
                let result = self.rol(value);
                self.read_operation(AND, result);
                result
            }
            SRE => {
                let result = self.lsr(value);
                self.read_operation(EOR, result);
                result
            }
            RRA => {
                let result = self.ror(value);
                self.adc(result);
                result
            }
            DCP => {
                let result = value.wrapping_sub(1);
                self.compare(self.a, result);
                result
            }
            ISC => {
                let result = value.wrapping_add(1);
                self.sbc(result);
                result
            }
            _ => value,
        }
    }

    /// Apply a single-byte instruction (implied or accumulator addressing)
    pub(super) fn implied_operation(&mut self, mnemonic: Mnemonic) {
        use Mnemonic::*;
        match mnemonic {
            CLC => self.p &= !FLAG_C,
            SEC => self.p |= FLAG_C,
            CLI => self.p &= !FLAG_I,
            SEI => self.p |= FLAG_I,
            CLV => self.p &= !FLAG_V,
            CLD => self.p &= !FLAG_D,
            SED => self.p |= FLAG_D,
            TAX => {
                self.x = self.a;
                self.update_nz_flags(self.x);
            }
            TAY => {
                self.y = self.a;
                self.update_nz_flags(self.y);
            }
            TXA => {
                self.a = self.x;
                self.update_nz_flags(self.a);
            }
            TYA => {
                self.a = self.y;
                self.update_nz_flags(self.a);
            }
            TSX => {
                self.x = self.sp;
                self.update_nz_flags(self.x);
            }
            TXS => self.sp = self.x,
            INX => {
                self.x = self.x.wrapping_add(1);
                self.update_nz_flags(self.x);
            }
            INY => {
                self.y = self.y.wrapping_add(1);
                self.update_nz_flags(self.y);
            }
            DEX => {
                self.x = self.x.wrapping_sub(1);
                self.update_nz_flags(self.x);
            }
            DEY => {
                self.y = self.y.wrapping_sub(1);
                self.update_nz_flags(self.y);
            }
            ASL | LSR | ROL | ROR => self.a = self.modify_operation(mnemonic, self.a),
            _ => {}
        }
    }

    /// Register value a store instruction puts on the bus
    pub(super) fn store_value(&self, mnemonic: Mnemonic) -> u8 {
        use Mnemonic::*;
        match mnemonic {
            STA => self.a,
            STX => self.x,
            STY => self.y,
            SAX | SHA | TAS => self.a & self.x,
            SHX => self.x,
            SHY => self.y,
            _ => 0,
        }
    }

    /// Condition tested by a branch mnemonic
    pub(super) fn branch_taken(&self, mnemonic: Mnemonic) -> bool {
        use Mnemonic::*;
        match mnemonic {
            BPL => self.p & FLAG_N == 0,
            BMI => self.p & FLAG_N != 0,
            BVC => self.p & FLAG_V == 0,
            BVS => self.p & FLAG_V != 0,
            BCC => self.p & FLAG_C == 0,
            BCS => self.p & FLAG_C != 0,
            BNE => self.p & FLAG_Z == 0,
            BEQ => self.p & FLAG_Z != 0,
            _ => false,
        }
    }
}
