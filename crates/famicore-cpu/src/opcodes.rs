//! Opcode decode table for the 6502.
//!
//! All 256 opcode slots are populated: the 151 official instructions, the
//! stable unofficial instructions exercised by the usual compatibility test
//! ROMs (LAX, SAX, the RMW combos, the immediate-mode oddities, and the
//! unofficial NOP family), and the 12 JAM slots. JAM entries are decoded but
//! deliberately have no executable semantics; the interpreter reports them
//! as an unknown-opcode error.

use crate::addressing::AddrMode;

/// Instruction mnemonics, official and unofficial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)] // Names are the 6502 mnemonics themselves.
pub enum Op {
    // Official
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // Unofficial
    Alr, Anc, Ane, Arr, Dcp, Isc, Jam, Las, Lax, Rla, Rra, Sax, Sbx, Sha,
    Shx, Shy, Slo, Sre, Tas,
}

/// One decoded opcode slot.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// Mnemonic.
    pub op: Op,
    /// Addressing mode.
    pub mode: AddrMode,
    /// Base cycle count (before page-cross or branch penalties).
    pub cycles: u8,
    /// Whether an indexed read crossing a page adds one cycle.
    pub page_penalty: bool,
    /// True for unofficial opcodes.
    pub unofficial: bool,
}

const fn of(op: Op, mode: AddrMode, cycles: u8, page_penalty: bool) -> OpcodeInfo {
    OpcodeInfo {
        op,
        mode,
        cycles,
        page_penalty,
        unofficial: false,
    }
}

const fn un(op: Op, mode: AddrMode, cycles: u8, page_penalty: bool) -> OpcodeInfo {
    OpcodeInfo {
        op,
        mode,
        cycles,
        page_penalty,
        unofficial: true,
    }
}

/// 256-entry decode table indexed by opcode byte.
#[rustfmt::skip]
pub const OPCODE_TABLE: [OpcodeInfo; 256] = {
    use AddrMode::{Abs, Abx, Aby, Acc, Idx, Idy, Imm, Imp, Ind, Rel, Zp0, Zpx, Zpy};
    use Op::*;
    [
        // 0x00
        of(Brk, Imp, 7, false), of(Ora, Idx, 6, false), un(Jam, Imp, 0, false), un(Slo, Idx, 8, false),
        un(Nop, Zp0, 3, false), of(Ora, Zp0, 3, false), of(Asl, Zp0, 5, false), un(Slo, Zp0, 5, false),
        of(Php, Imp, 3, false), of(Ora, Imm, 2, false), of(Asl, Acc, 2, false), un(Anc, Imm, 2, false),
        un(Nop, Abs, 4, false), of(Ora, Abs, 4, false), of(Asl, Abs, 6, false), un(Slo, Abs, 6, false),
        // 0x10
        of(Bpl, Rel, 2, false), of(Ora, Idy, 5, true),  un(Jam, Imp, 0, false), un(Slo, Idy, 8, false),
        un(Nop, Zpx, 4, false), of(Ora, Zpx, 4, false), of(Asl, Zpx, 6, false), un(Slo, Zpx, 6, false),
        of(Clc, Imp, 2, false), of(Ora, Aby, 4, true),  un(Nop, Imp, 2, false), un(Slo, Aby, 7, false),
        un(Nop, Abx, 4, true),  of(Ora, Abx, 4, true),  of(Asl, Abx, 7, false), un(Slo, Abx, 7, false),
        // 0x20
        of(Jsr, Abs, 6, false), of(And, Idx, 6, false), un(Jam, Imp, 0, false), un(Rla, Idx, 8, false),
        of(Bit, Zp0, 3, false), of(And, Zp0, 3, false), of(Rol, Zp0, 5, false), un(Rla, Zp0, 5, false),
        of(Plp, Imp, 4, false), of(And, Imm, 2, false), of(Rol, Acc, 2, false), un(Anc, Imm, 2, false),
        of(Bit, Abs, 4, false), of(And, Abs, 4, false), of(Rol, Abs, 6, false), un(Rla, Abs, 6, false),
        // 0x30
        of(Bmi, Rel, 2, false), of(And, Idy, 5, true),  un(Jam, Imp, 0, false), un(Rla, Idy, 8, false),
        un(Nop, Zpx, 4, false), of(And, Zpx, 4, false), of(Rol, Zpx, 6, false), un(Rla, Zpx, 6, false),
        of(Sec, Imp, 2, false), of(And, Aby, 4, true),  un(Nop, Imp, 2, false), un(Rla, Aby, 7, false),
        un(Nop, Abx, 4, true),  of(And, Abx, 4, true),  of(Rol, Abx, 7, false), un(Rla, Abx, 7, false),
        // 0x40
        of(Rti, Imp, 6, false), of(Eor, Idx, 6, false), un(Jam, Imp, 0, false), un(Sre, Idx, 8, false),
        un(Nop, Zp0, 3, false), of(Eor, Zp0, 3, false), of(Lsr, Zp0, 5, false), un(Sre, Zp0, 5, false),
        of(Pha, Imp, 3, false), of(Eor, Imm, 2, false), of(Lsr, Acc, 2, false), un(Alr, Imm, 2, false),
        of(Jmp, Abs, 3, false), of(Eor, Abs, 4, false), of(Lsr, Abs, 6, false), un(Sre, Abs, 6, false),
        // 0x50
        of(Bvc, Rel, 2, false), of(Eor, Idy, 5, true),  un(Jam, Imp, 0, false), un(Sre, Idy, 8, false),
        un(Nop, Zpx, 4, false), of(Eor, Zpx, 4, false), of(Lsr, Zpx, 6, false), un(Sre, Zpx, 6, false),
        of(Cli, Imp, 2, false), of(Eor, Aby, 4, true),  un(Nop, Imp, 2, false), un(Sre, Aby, 7, false),
        un(Nop, Abx, 4, true),  of(Eor, Abx, 4, true),  of(Lsr, Abx, 7, false), un(Sre, Abx, 7, false),
        // 0x60
        of(Rts, Imp, 6, false), of(Adc, Idx, 6, false), un(Jam, Imp, 0, false), un(Rra, Idx, 8, false),
        un(Nop, Zp0, 3, false), of(Adc, Zp0, 3, false), of(Ror, Zp0, 5, false), un(Rra, Zp0, 5, false),
        of(Pla, Imp, 4, false), of(Adc, Imm, 2, false), of(Ror, Acc, 2, false), un(Arr, Imm, 2, false),
        of(Jmp, Ind, 5, false), of(Adc, Abs, 4, false), of(Ror, Abs, 6, false), un(Rra, Abs, 6, false),
        // 0x70
        of(Bvs, Rel, 2, false), of(Adc, Idy, 5, true),  un(Jam, Imp, 0, false), un(Rra, Idy, 8, false),
        un(Nop, Zpx, 4, false), of(Adc, Zpx, 4, false), of(Ror, Zpx, 6, false), un(Rra, Zpx, 6, false),
        of(Sei, Imp, 2, false), of(Adc, Aby, 4, true),  un(Nop, Imp, 2, false), un(Rra, Aby, 7, false),
        un(Nop, Abx, 4, true),  of(Adc, Abx, 4, true),  of(Ror, Abx, 7, false), un(Rra, Abx, 7, false),
        // 0x80
        un(Nop, Imm, 2, false), of(Sta, Idx, 6, false), un(Nop, Imm, 2, false), un(Sax, Idx, 6, false),
        of(Sty, Zp0, 3, false), of(Sta, Zp0, 3, false), of(Stx, Zp0, 3, false), un(Sax, Zp0, 3, false),
        of(Dey, Imp, 2, false), un(Nop, Imm, 2, false), of(Txa, Imp, 2, false), un(Ane, Imm, 2, false),
        of(Sty, Abs, 4, false), of(Sta, Abs, 4, false), of(Stx, Abs, 4, false), un(Sax, Abs, 4, false),
        // 0x90
        of(Bcc, Rel, 2, false), of(Sta, Idy, 6, false), un(Jam, Imp, 0, false), un(Sha, Idy, 6, false),
        of(Sty, Zpx, 4, false), of(Sta, Zpx, 4, false), of(Stx, Zpy, 4, false), un(Sax, Zpy, 4, false),
        of(Tya, Imp, 2, false), of(Sta, Aby, 5, false), of(Txs, Imp, 2, false), un(Tas, Aby, 5, false),
        un(Shy, Abx, 5, false), of(Sta, Abx, 5, false), un(Shx, Aby, 5, false), un(Sha, Aby, 5, false),
        // 0xA0
        of(Ldy, Imm, 2, false), of(Lda, Idx, 6, false), of(Ldx, Imm, 2, false), un(Lax, Idx, 6, false),
        of(Ldy, Zp0, 3, false), of(Lda, Zp0, 3, false), of(Ldx, Zp0, 3, false), un(Lax, Zp0, 3, false),
        of(Tay, Imp, 2, false), of(Lda, Imm, 2, false), of(Tax, Imp, 2, false), un(Lax, Imm, 2, false),
        of(Ldy, Abs, 4, false), of(Lda, Abs, 4, false), of(Ldx, Abs, 4, false), un(Lax, Abs, 4, false),
        // 0xB0
        of(Bcs, Rel, 2, false), of(Lda, Idy, 5, true),  un(Jam, Imp, 0, false), un(Lax, Idy, 5, true),
        of(Ldy, Zpx, 4, false), of(Lda, Zpx, 4, false), of(Ldx, Zpy, 4, false), un(Lax, Zpy, 4, false),
        of(Clv, Imp, 2, false), of(Lda, Aby, 4, true),  of(Tsx, Imp, 2, false), un(Las, Aby, 4, true),
        of(Ldy, Abx, 4, true),  of(Lda, Abx, 4, true),  of(Ldx, Aby, 4, true),  un(Lax, Aby, 4, true),
        // 0xC0
        of(Cpy, Imm, 2, false), of(Cmp, Idx, 6, false), un(Nop, Imm, 2, false), un(Dcp, Idx, 8, false),
        of(Cpy, Zp0, 3, false), of(Cmp, Zp0, 3, false), of(Dec, Zp0, 5, false), un(Dcp, Zp0, 5, false),
        of(Iny, Imp, 2, false), of(Cmp, Imm, 2, false), of(Dex, Imp, 2, false), un(Sbx, Imm, 2, false),
        of(Cpy, Abs, 4, false), of(Cmp, Abs, 4, false), of(Dec, Abs, 6, false), un(Dcp, Abs, 6, false),
        // 0xD0
        of(Bne, Rel, 2, false), of(Cmp, Idy, 5, true),  un(Jam, Imp, 0, false), un(Dcp, Idy, 8, false),
        un(Nop, Zpx, 4, false), of(Cmp, Zpx, 4, false), of(Dec, Zpx, 6, false), un(Dcp, Zpx, 6, false),
        of(Cld, Imp, 2, false), of(Cmp, Aby, 4, true),  un(Nop, Imp, 2, false), un(Dcp, Aby, 7, false),
        un(Nop, Abx, 4, true),  of(Cmp, Abx, 4, true),  of(Dec, Abx, 7, false), un(Dcp, Abx, 7, false),
        // 0xE0
        of(Cpx, Imm, 2, false), of(Sbc, Idx, 6, false), un(Nop, Imm, 2, false), un(Isc, Idx, 8, false),
        of(Cpx, Zp0, 3, false), of(Sbc, Zp0, 3, false), of(Inc, Zp0, 5, false), un(Isc, Zp0, 5, false),
        of(Inx, Imp, 2, false), of(Sbc, Imm, 2, false), of(Nop, Imp, 2, false), un(Sbc, Imm, 2, false),
        of(Cpx, Abs, 4, false), of(Sbc, Abs, 4, false), of(Inc, Abs, 6, false), un(Isc, Abs, 6, false),
        // 0xF0
        of(Beq, Rel, 2, false), of(Sbc, Idy, 5, true),  un(Jam, Imp, 0, false), un(Isc, Idy, 8, false),
        un(Nop, Zpx, 4, false), of(Sbc, Zpx, 4, false), of(Inc, Zpx, 6, false), un(Isc, Zpx, 6, false),
        of(Sed, Imp, 2, false), of(Sbc, Aby, 4, true),  un(Nop, Imp, 2, false), un(Isc, Aby, 7, false),
        un(Nop, Abx, 4, true),  of(Sbc, Abx, 4, true),  of(Inc, Abx, 7, false), un(Isc, Abx, 7, false),
    ]
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_common_opcodes() {
        assert_eq!(OPCODE_TABLE[0xA9].op, Op::Lda);
        assert_eq!(OPCODE_TABLE[0xA9].mode, AddrMode::Imm);
        assert_eq!(OPCODE_TABLE[0x4C].op, Op::Jmp);
        assert_eq!(OPCODE_TABLE[0x6C].mode, AddrMode::Ind);
        assert_eq!(OPCODE_TABLE[0x00].cycles, 7);
    }

    #[test]
    fn store_indexed_has_no_page_penalty() {
        // STA abs,X is always 5 cycles.
        let sta = OPCODE_TABLE[0x9D];
        assert_eq!(sta.op, Op::Sta);
        assert_eq!(sta.cycles, 5);
        assert!(!sta.page_penalty);
    }

    #[test]
    fn jam_slots_are_marked() {
        for opcode in [0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2] {
            assert_eq!(OPCODE_TABLE[opcode].op, Op::Jam, "opcode {opcode:#04x}");
        }
    }

    #[test]
    fn eb_is_unofficial_sbc() {
        let info = OPCODE_TABLE[0xEB];
        assert_eq!(info.op, Op::Sbc);
        assert!(info.unofficial);
    }
}
