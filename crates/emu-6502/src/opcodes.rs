//! Static decode table.
//!
//! Every opcode maps to an (operation, addressing mode, base cycles)
//! triple. `page_penalty` marks read operations that take one extra cycle
//! when indexed address resolution crosses a page. Opcodes with no entry
//! are undecodable and stop the CPU.

/// Instruction operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Brk,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jmp,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Nop,
    Ora,
    Pha,
    Php,
    Pla,
    Plp,
    Rol,
    Ror,
    Rti,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sta,
    Stx,
    Sty,
    Tax,
    Tay,
    Tsx,
    Txa,
    Txs,
    Tya,
    // Undocumented
    Dcp,
    Lax,
    Rla,
    Sax,
    Slo,
}

impl Mnemonic {
    /// Upper-case assembler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Mnemonic::Adc => "ADC",
            Mnemonic::And => "AND",
            Mnemonic::Asl => "ASL",
            Mnemonic::Bcc => "BCC",
            Mnemonic::Bcs => "BCS",
            Mnemonic::Beq => "BEQ",
            Mnemonic::Bit => "BIT",
            Mnemonic::Bmi => "BMI",
            Mnemonic::Bne => "BNE",
            Mnemonic::Bpl => "BPL",
            Mnemonic::Brk => "BRK",
            Mnemonic::Bvc => "BVC",
            Mnemonic::Bvs => "BVS",
            Mnemonic::Clc => "CLC",
            Mnemonic::Cld => "CLD",
            Mnemonic::Cli => "CLI",
            Mnemonic::Clv => "CLV",
            Mnemonic::Cmp => "CMP",
            Mnemonic::Cpx => "CPX",
            Mnemonic::Cpy => "CPY",
            Mnemonic::Dec => "DEC",
            Mnemonic::Dex => "DEX",
            Mnemonic::Dey => "DEY",
            Mnemonic::Eor => "EOR",
            Mnemonic::Inc => "INC",
            Mnemonic::Inx => "INX",
            Mnemonic::Iny => "INY",
            Mnemonic::Jmp => "JMP",
            Mnemonic::Jsr => "JSR",
            Mnemonic::Lda => "LDA",
            Mnemonic::Ldx => "LDX",
            Mnemonic::Ldy => "LDY",
            Mnemonic::Lsr => "LSR",
            Mnemonic::Nop => "NOP",
            Mnemonic::Ora => "ORA",
            Mnemonic::Pha => "PHA",
            Mnemonic::Php => "PHP",
            Mnemonic::Pla => "PLA",
            Mnemonic::Plp => "PLP",
            Mnemonic::Rol => "ROL",
            Mnemonic::Ror => "ROR",
            Mnemonic::Rti => "RTI",
            Mnemonic::Rts => "RTS",
            Mnemonic::Sbc => "SBC",
            Mnemonic::Sec => "SEC",
            Mnemonic::Sed => "SED",
            Mnemonic::Sei => "SEI",
            Mnemonic::Sta => "STA",
            Mnemonic::Stx => "STX",
            Mnemonic::Sty => "STY",
            Mnemonic::Tax => "TAX",
            Mnemonic::Tay => "TAY",
            Mnemonic::Tsx => "TSX",
            Mnemonic::Txa => "TXA",
            Mnemonic::Txs => "TXS",
            Mnemonic::Tya => "TYA",
            Mnemonic::Dcp => "DCP",
            Mnemonic::Lax => "LAX",
            Mnemonic::Rla => "RLA",
            Mnemonic::Sax => "SAX",
            Mnemonic::Slo => "SLO",
        }
    }

    /// True for opcodes outside the documented instruction set.
    #[must_use]
    pub const fn is_undocumented(self) -> bool {
        matches!(
            self,
            Mnemonic::Dcp | Mnemonic::Lax | Mnemonic::Rla | Mnemonic::Sax | Mnemonic::Slo
        )
    }
}

/// Addressing mode.
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
    Indirect,
    /// `(zp,X)`
    IndexedIndirect,
    /// `(zp),Y`
    IndirectIndexed,
    Relative,
}

impl Mode {
    /// Instruction length in bytes, opcode included.
    #[must_use]
    pub const fn len(self) -> u16 {
        match self {
            Mode::Implied | Mode::Accumulator => 1,
            Mode::Immediate
            | Mode::ZeroPage
            | Mode::ZeroPageX
            | Mode::ZeroPageY
            | Mode::IndexedIndirect
            | Mode::IndirectIndexed
            | Mode::Relative => 2,
            Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect => 3,
        }
    }
}

/// One decode-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    /// Base cycle cost, before page-cross and branch adjustments.
    pub cycles: u8,
    /// +1 cycle when indexed resolution crosses a page.
    pub page_penalty: bool,
}

const fn op(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Option<Opcode> {
    Some(Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: false,
    })
}

/// Read operation whose indexed forms pay for a page cross.
const fn rd(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Option<Opcode> {
    Some(Opcode {
        mnemonic,
        mode,
        cycles,
        page_penalty: true,
    })
}

/// Look up an opcode byte.
#[must_use]
pub const fn decode(opcode: u8) -> Option<Opcode> {
    OPCODES[opcode as usize]
}

/// The decode table, indexed by opcode byte.
pub static OPCODES: [Option<Opcode>; 256] = build();

#[allow(clippy::enum_glob_use)]
const fn build() -> [Option<Opcode>; 256] {
    use Mnemonic::*;
    use Mode::*;

    let mut t: [Option<Opcode>; 256] = [None; 256];

    // Loads
    t[0xA9] = op(Lda, Immediate, 2);
    t[0xA5] = op(Lda, ZeroPage, 3);
    t[0xB5] = op(Lda, ZeroPageX, 4);
    t[0xAD] = op(Lda, Absolute, 4);
    t[0xBD] = rd(Lda, AbsoluteX, 4);
    t[0xB9] = rd(Lda, AbsoluteY, 4);
    t[0xA1] = op(Lda, IndexedIndirect, 6);
    t[0xB1] = rd(Lda, IndirectIndexed, 5);

    t[0xA2] = op(Ldx, Immediate, 2);
    t[0xA6] = op(Ldx, ZeroPage, 3);
    t[0xB6] = op(Ldx, ZeroPageY, 4);
    t[0xAE] = op(Ldx, Absolute, 4);
    t[0xBE] = rd(Ldx, AbsoluteY, 4);

    t[0xA0] = op(Ldy, Immediate, 2);
    t[0xA4] = op(Ldy, ZeroPage, 3);
    t[0xB4] = op(Ldy, ZeroPageX, 4);
    t[0xAC] = op(Ldy, Absolute, 4);
    t[0xBC] = rd(Ldy, AbsoluteX, 4);

    // Stores
    t[0x85] = op(Sta, ZeroPage, 3);
    t[0x95] = op(Sta, ZeroPageX, 4);
    t[0x8D] = op(Sta, Absolute, 4);
    t[0x9D] = op(Sta, AbsoluteX, 5);
    t[0x99] = op(Sta, AbsoluteY, 5);
    t[0x81] = op(Sta, IndexedIndirect, 6);
    t[0x91] = op(Sta, IndirectIndexed, 6);

    t[0x86] = op(Stx, ZeroPage, 3);
    t[0x96] = op(Stx, ZeroPageY, 4);
    t[0x8E] = op(Stx, Absolute, 4);

    t[0x84] = op(Sty, ZeroPage, 3);
    t[0x94] = op(Sty, ZeroPageX, 4);
    t[0x8C] = op(Sty, Absolute, 4);

    // Register transfers
    t[0xAA] = op(Tax, Implied, 2);
    t[0xA8] = op(Tay, Implied, 2);
    t[0x8A] = op(Txa, Implied, 2);
    t[0x98] = op(Tya, Implied, 2);
    t[0xBA] = op(Tsx, Implied, 2);
    t[0x9A] = op(Txs, Implied, 2);

    // Stack
    t[0x48] = op(Pha, Implied, 3);
    t[0x08] = op(Php, Implied, 3);
    t[0x68] = op(Pla, Implied, 4);
    t[0x28] = op(Plp, Implied, 4);

    // Logical
    t[0x29] = op(And, Immediate, 2);
    t[0x25] = op(And, ZeroPage, 3);
    t[0x35] = op(And, ZeroPageX, 4);
    t[0x2D] = op(And, Absolute, 4);
    t[0x3D] = rd(And, AbsoluteX, 4);
    t[0x39] = rd(And, AbsoluteY, 4);
    t[0x21] = op(And, IndexedIndirect, 6);
    t[0x31] = rd(And, IndirectIndexed, 5);

    t[0x49] = op(Eor, Immediate, 2);
    t[0x45] = op(Eor, ZeroPage, 3);
    t[0x55] = op(Eor, ZeroPageX, 4);
    t[0x4D] = op(Eor, Absolute, 4);
    t[0x5D] = rd(Eor, AbsoluteX, 4);
    t[0x59] = rd(Eor, AbsoluteY, 4);
    t[0x41] = op(Eor, IndexedIndirect, 6);
    t[0x51] = rd(Eor, IndirectIndexed, 5);

    t[0x09] = op(Ora, Immediate, 2);
    t[0x05] = op(Ora, ZeroPage, 3);
    t[0x15] = op(Ora, ZeroPageX, 4);
    t[0x0D] = op(Ora, Absolute, 4);
    t[0x1D] = rd(Ora, AbsoluteX, 4);
    t[0x19] = rd(Ora, AbsoluteY, 4);
    t[0x01] = op(Ora, IndexedIndirect, 6);
    t[0x11] = rd(Ora, IndirectIndexed, 5);

    t[0x24] = op(Bit, ZeroPage, 3);
    t[0x2C] = op(Bit, Absolute, 4);

    // Arithmetic
    t[0x69] = op(Adc, Immediate, 2);
    t[0x65] = op(Adc, ZeroPage, 3);
    t[0x75] = op(Adc, ZeroPageX, 4);
    t[0x6D] = op(Adc, Absolute, 4);
    t[0x7D] = rd(Adc, AbsoluteX, 4);
    t[0x79] = rd(Adc, AbsoluteY, 4);
    t[0x61] = op(Adc, IndexedIndirect, 6);
    t[0x71] = rd(Adc, IndirectIndexed, 5);

    t[0xE9] = op(Sbc, Immediate, 2);
    t[0xE5] = op(Sbc, ZeroPage, 3);
    t[0xF5] = op(Sbc, ZeroPageX, 4);
    t[0xED] = op(Sbc, Absolute, 4);
    t[0xFD] = rd(Sbc, AbsoluteX, 4);
    t[0xF9] = rd(Sbc, AbsoluteY, 4);
    t[0xE1] = op(Sbc, IndexedIndirect, 6);
    t[0xF1] = rd(Sbc, IndirectIndexed, 5);

    t[0xC9] = op(Cmp, Immediate, 2);
    t[0xC5] = op(Cmp, ZeroPage, 3);
    t[0xD5] = op(Cmp, ZeroPageX, 4);
    t[0xCD] = op(Cmp, Absolute, 4);
    t[0xDD] = rd(Cmp, AbsoluteX, 4);
    t[0xD9] = rd(Cmp, AbsoluteY, 4);
    t[0xC1] = op(Cmp, IndexedIndirect, 6);
    t[0xD1] = rd(Cmp, IndirectIndexed, 5);

    t[0xE0] = op(Cpx, Immediate, 2);
    t[0xE4] = op(Cpx, ZeroPage, 3);
    t[0xEC] = op(Cpx, Absolute, 4);

    t[0xC0] = op(Cpy, Immediate, 2);
    t[0xC4] = op(Cpy, ZeroPage, 3);
    t[0xCC] = op(Cpy, Absolute, 4);

    // Increments and decrements
    t[0xE6] = op(Inc, ZeroPage, 5);
    t[0xF6] = op(Inc, ZeroPageX, 6);
    t[0xEE] = op(Inc, Absolute, 6);
    t[0xFE] = op(Inc, AbsoluteX, 7);
    t[0xE8] = op(Inx, Implied, 2);
    t[0xC8] = op(Iny, Implied, 2);

    t[0xC6] = op(Dec, ZeroPage, 5);
    t[0xD6] = op(Dec, ZeroPageX, 6);
    t[0xCE] = op(Dec, Absolute, 6);
    t[0xDE] = op(Dec, AbsoluteX, 7);
    t[0xCA] = op(Dex, Implied, 2);
    t[0x88] = op(Dey, Implied, 2);

    // Shifts
    t[0x0A] = op(Asl, Accumulator, 2);
    t[0x06] = op(Asl, ZeroPage, 5);
    t[0x16] = op(Asl, ZeroPageX, 6);
    t[0x0E] = op(Asl, Absolute, 6);
    t[0x1E] = op(Asl, AbsoluteX, 7);

    t[0x4A] = op(Lsr, Accumulator, 2);
    t[0x46] = op(Lsr, ZeroPage, 5);
    t[0x56] = op(Lsr, ZeroPageX, 6);
    t[0x4E] = op(Lsr, Absolute, 6);
    t[0x5E] = op(Lsr, AbsoluteX, 7);

    t[0x2A] = op(Rol, Accumulator, 2);
    t[0x26] = op(Rol, ZeroPage, 5);
    t[0x36] = op(Rol, ZeroPageX, 6);
    t[0x2E] = op(Rol, Absolute, 6);
    t[0x3E] = op(Rol, AbsoluteX, 7);

    t[0x6A] = op(Ror, Accumulator, 2);
    t[0x66] = op(Ror, ZeroPage, 5);
    t[0x76] = op(Ror, ZeroPageX, 6);
    t[0x6E] = op(Ror, Absolute, 6);
    t[0x7E] = op(Ror, AbsoluteX, 7);

    // Jumps and calls
    t[0x4C] = op(Jmp, Absolute, 3);
    t[0x6C] = op(Jmp, Indirect, 5);
    t[0x20] = op(Jsr, Absolute, 6);
    t[0x60] = op(Rts, Implied, 6);

    // Branches: base 2, adjusted when taken
    t[0x90] = op(Bcc, Relative, 2);
    t[0xB0] = op(Bcs, Relative, 2);
    t[0xF0] = op(Beq, Relative, 2);
    t[0x30] = op(Bmi, Relative, 2);
    t[0xD0] = op(Bne, Relative, 2);
    t[0x10] = op(Bpl, Relative, 2);
    t[0x50] = op(Bvc, Relative, 2);
    t[0x70] = op(Bvs, Relative, 2);

    // Status flags
    t[0x18] = op(Clc, Implied, 2);
    t[0xD8] = op(Cld, Implied, 2);
    t[0x58] = op(Cli, Implied, 2);
    t[0xB8] = op(Clv, Implied, 2);
    t[0x38] = op(Sec, Implied, 2);
    t[0xF8] = op(Sed, Implied, 2);
    t[0x78] = op(Sei, Implied, 2);

    // System
    t[0x00] = op(Brk, Implied, 7);
    t[0xEA] = op(Nop, Implied, 2);
    t[0x40] = op(Rti, Implied, 6);

    // Undocumented: SLO (ASL + ORA)
    t[0x07] = op(Slo, ZeroPage, 5);
    t[0x17] = op(Slo, ZeroPageX, 6);
    t[0x03] = op(Slo, IndexedIndirect, 8);
    t[0x13] = op(Slo, IndirectIndexed, 8);
    t[0x0F] = op(Slo, Absolute, 6);
    t[0x1F] = op(Slo, AbsoluteX, 7);
    t[0x1B] = op(Slo, AbsoluteY, 7);

    // Undocumented: RLA (ROL + AND)
    t[0x27] = op(Rla, ZeroPage, 5);
    t[0x37] = op(Rla, ZeroPageX, 6);
    t[0x23] = op(Rla, IndexedIndirect, 8);
    t[0x33] = op(Rla, IndirectIndexed, 8);
    t[0x2F] = op(Rla, Absolute, 6);
    t[0x3F] = op(Rla, AbsoluteX, 7);
    t[0x3B] = op(Rla, AbsoluteY, 7);

    // Undocumented: SAX (store A & X)
    t[0x87] = op(Sax, ZeroPage, 3);
    t[0x97] = op(Sax, ZeroPageY, 4);
    t[0x83] = op(Sax, IndexedIndirect, 6);
    t[0x8F] = op(Sax, Absolute, 4);

    // Undocumented: LAX (LDA + LDX)
    t[0xA7] = op(Lax, ZeroPage, 3);
    t[0xB7] = op(Lax, ZeroPageY, 4);
    t[0xA3] = op(Lax, IndexedIndirect, 6);
    t[0xB3] = rd(Lax, IndirectIndexed, 5);
    t[0xAF] = op(Lax, Absolute, 4);
    t[0xBF] = rd(Lax, AbsoluteY, 4);

    // Undocumented: DCP (DEC + CMP)
    t[0xC7] = op(Dcp, ZeroPage, 5);
    t[0xD7] = op(Dcp, ZeroPageX, 6);
    t[0xC3] = op(Dcp, IndexedIndirect, 8);
    t[0xD3] = op(Dcp, IndirectIndexed, 8);
    t[0xCF] = op(Dcp, Absolute, 6);
    t[0xDF] = op(Dcp, AbsoluteX, 7);
    t[0xDB] = op(Dcp, AbsoluteY, 7);

    // Undocumented NOPs
    t[0x1A] = op(Nop, Implied, 2);
    t[0x3A] = op(Nop, Implied, 2);
    t[0x5A] = op(Nop, Implied, 2);
    t[0x7A] = op(Nop, Implied, 2);
    t[0xDA] = op(Nop, Implied, 2);
    t[0xFA] = op(Nop, Implied, 2);

    t[0x80] = op(Nop, Immediate, 2);
    t[0x82] = op(Nop, Immediate, 2);
    t[0x89] = op(Nop, Immediate, 2);
    t[0xC2] = op(Nop, Immediate, 2);
    t[0xE2] = op(Nop, Immediate, 2);

    t[0x04] = op(Nop, ZeroPage, 3);
    t[0x44] = op(Nop, ZeroPage, 3);
    t[0x64] = op(Nop, ZeroPage, 3);

    t[0x14] = op(Nop, ZeroPageX, 4);
    t[0x34] = op(Nop, ZeroPageX, 4);
    t[0x54] = op(Nop, ZeroPageX, 4);
    t[0x74] = op(Nop, ZeroPageX, 4);
    t[0xD4] = op(Nop, ZeroPageX, 4);
    t[0xF4] = op(Nop, ZeroPageX, 4);

    t[0x0C] = op(Nop, Absolute, 4);

    t[0x1C] = rd(Nop, AbsoluteX, 4);
    t[0x3C] = rd(Nop, AbsoluteX, 4);
    t[0x5C] = rd(Nop, AbsoluteX, 4);
    t[0x7C] = rd(Nop, AbsoluteX, 4);
    t[0xDC] = rd(Nop, AbsoluteX, 4);
    t[0xFC] = rd(Nop, AbsoluteX, 4);

    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_opcode_count() {
        let documented = OPCODES
            .iter()
            .flatten()
            .filter(|op| !op.mnemonic.is_undocumented())
            .count();
        // 151 documented + 27 undocumented NOP encodings share the NOP mnemonic
        assert_eq!(documented, 151 + 27);
    }

    #[test]
    fn undocumented_composites_present() {
        let composites = OPCODES
            .iter()
            .flatten()
            .filter(|op| op.mnemonic.is_undocumented())
            .count();
        assert_eq!(composites, 7 + 7 + 4 + 6 + 7);
    }

    #[test]
    fn jam_opcodes_are_undecodable() {
        for opcode in [0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2] {
            assert!(decode(opcode).is_none(), "${opcode:02X} should not decode");
        }
    }

    #[test]
    fn stores_never_pay_page_penalty() {
        for entry in OPCODES.iter().flatten() {
            if matches!(
                entry.mnemonic,
                Mnemonic::Sta | Mnemonic::Stx | Mnemonic::Sty | Mnemonic::Sax
            ) {
                assert!(!entry.page_penalty, "{:?}", entry);
            }
        }
    }
}
