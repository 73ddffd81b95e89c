// Copyright (c) 2017, 2018, 2023 Marek Benc <benc.marek.elektro98@proton.me>
//
// Permission to use, copy, modify, and distribute this software for any
// purpose with or without fee is hereby granted, provided that the above
// copyright notice and this permission notice appear in all copies.
//
// THE SOFTWARE IS PROVIDED "AS IS" AND THE AUTHOR DISCLAIMS ALL WARRANTIES
// WITH REGARD TO THIS SOFTWARE INCLUDING ALL IMPLIED WARRANTIES OF
// MERCHANTABILITY AND FITNESS. IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR
// ANY SPECIAL, DIRECT, INDIRECT, OR CONSEQUENTIAL DAMAGES OR ANY DAMAGES
// WHATSOEVER RESULTING FROM LOSS OF USE, DATA OR PROFITS, WHETHER IN AN
// ACTION OF CONTRACT, NEGLIGENCE OR OTHER TORTIOUS ACTION, ARISING OUT OF
// OR IN CONNECTION WITH THE USE OR PERFORMANCE OF THIS SOFTWARE.
//

// The table of every mnemonic and pseudo-op the assembler understands,
// and the operand classifier.  Each entry names the handler that builds
// the code for the mnemonic, up to two base opcode bytes the handler
// works from, and a few flags.

use lazy_static::lazy_static;

use std::collections::HashMap;

// Entry flags:
pub(crate) const OP_UNDOC: u32 = 1 << 0;   // needs -u
pub(crate) const OP_Z80:   u32 = 1 << 1;   // not available in 8080 mode
pub(crate) const OP_COND:  u32 = 1 << 2;   // interpreted in false conditional sections
pub(crate) const OP_MDEF:  u32 = 1 << 3;   // opens a macro definition
pub(crate) const OP_MEND:  u32 = 1 << 4;   // closes a macro definition
pub(crate) const OP_SET:   u32 = 1 << 5;   // the handler deals with the label itself

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Handler {
    // Machine instructions:
    OneByte,
    TwoByte,
    Im,
    PuPo,
    Ex,
    Rst,
    Ret,
    JpCall,
    Jr,
    Djnz,
    Ld,
    Add,
    SbAdc,
    DecInc,
    Alu,
    Out,
    In,
    CbGrp,

    // Pseudo operations:
    Org,
    Equ,
    Set,
    Db,
    Dw,
    Ds,
    End,
    Include,
    Title,
    Subttl,
    Page,
    Radix,
    Phase,
    Dephase,
    Aseg,
    Public,
    Extrn,

    // Conditional assembly:
    CondIf,
    CondElse,
    CondEndif,
    McondB,

    // The macro engine:
    MacroDef,
    Endm,
    Exitm,
    Local,
    Irp,
    Irpc,
    Rept,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct OpEntry {
    pub handler: Handler,
    pub b1:      u8,
    pub b2:      u8,
    pub flags:   u32,
}

const fn op(handler: Handler, b1: u8, b2: u8, flags: u32) -> OpEntry {
    OpEntry { handler: handler, b1: b1, b2: b2, flags: flags }
}

lazy_static! {
    static ref OPTAB: HashMap<&'static str, OpEntry> = {
        let mut table = HashMap::new();

        // Machine instructions, Zilog mnemonics:
        table.insert("ADC",     op(Handler::SbAdc,  0x88, 0x4A, 0));
        table.insert("ADD",     op(Handler::Add,    0x80, 0x09, 0));
        table.insert("AND",     op(Handler::Alu,    0xA0, 0xE6, 0));
        table.insert("BIT",     op(Handler::CbGrp,  0x40, 0x00, OP_Z80));
        table.insert("CALL",    op(Handler::JpCall, 0xCD, 0xC4, 0));
        table.insert("CCF",     op(Handler::OneByte, 0x3F, 0x00, 0));
        table.insert("CP",      op(Handler::Alu,    0xB8, 0xFE, 0));
        table.insert("CPD",     op(Handler::TwoByte, 0xED, 0xA9, OP_Z80));
        table.insert("CPDR",    op(Handler::TwoByte, 0xED, 0xB9, OP_Z80));
        table.insert("CPI",     op(Handler::TwoByte, 0xED, 0xA1, OP_Z80));
        table.insert("CPIR",    op(Handler::TwoByte, 0xED, 0xB1, OP_Z80));
        table.insert("CPL",     op(Handler::OneByte, 0x2F, 0x00, 0));
        table.insert("DAA",     op(Handler::OneByte, 0x27, 0x00, 0));
        table.insert("DEC",     op(Handler::DecInc, 0x05, 0x0B, 0));
        table.insert("DI",      op(Handler::OneByte, 0xF3, 0x00, 0));
        table.insert("DJNZ",    op(Handler::Djnz,   0x10, 0x00, OP_Z80));
        table.insert("EI",      op(Handler::OneByte, 0xFB, 0x00, 0));
        table.insert("EX",      op(Handler::Ex,     0x00, 0x00, 0));
        table.insert("EXX",     op(Handler::OneByte, 0xD9, 0x00, OP_Z80));
        table.insert("HALT",    op(Handler::OneByte, 0x76, 0x00, 0));
        table.insert("IM",      op(Handler::Im,     0xED, 0x46, OP_Z80));
        table.insert("IN",      op(Handler::In,     0x00, 0x00, 0));
        table.insert("INC",     op(Handler::DecInc, 0x04, 0x03, 0));
        table.insert("IND",     op(Handler::TwoByte, 0xED, 0xAA, OP_Z80));
        table.insert("INDR",    op(Handler::TwoByte, 0xED, 0xBA, OP_Z80));
        table.insert("INI",     op(Handler::TwoByte, 0xED, 0xA2, OP_Z80));
        table.insert("INIR",    op(Handler::TwoByte, 0xED, 0xB2, OP_Z80));
        table.insert("JP",      op(Handler::JpCall, 0xC3, 0xC2, 0));
        table.insert("JR",      op(Handler::Jr,     0x18, 0x20, OP_Z80));
        table.insert("LD",      op(Handler::Ld,     0x00, 0x00, 0));
        table.insert("LDD",     op(Handler::TwoByte, 0xED, 0xA8, OP_Z80));
        table.insert("LDDR",    op(Handler::TwoByte, 0xED, 0xB8, OP_Z80));
        table.insert("LDI",     op(Handler::TwoByte, 0xED, 0xA0, OP_Z80));
        table.insert("LDIR",    op(Handler::TwoByte, 0xED, 0xB0, OP_Z80));
        table.insert("NEG",     op(Handler::TwoByte, 0xED, 0x44, OP_Z80));
        table.insert("NOP",     op(Handler::OneByte, 0x00, 0x00, 0));
        table.insert("OR",      op(Handler::Alu,    0xB0, 0xF6, 0));
        table.insert("OTDR",    op(Handler::TwoByte, 0xED, 0xBB, OP_Z80));
        table.insert("OTIR",    op(Handler::TwoByte, 0xED, 0xB3, OP_Z80));
        table.insert("OUT",     op(Handler::Out,    0x00, 0x00, 0));
        table.insert("OUTD",    op(Handler::TwoByte, 0xED, 0xAB, OP_Z80));
        table.insert("OUTI",    op(Handler::TwoByte, 0xED, 0xA3, OP_Z80));
        table.insert("POP",     op(Handler::PuPo,   0xC1, 0x00, 0));
        table.insert("PUSH",    op(Handler::PuPo,   0xC5, 0x00, 0));
        table.insert("RES",     op(Handler::CbGrp,  0x80, 0x00, OP_Z80));
        table.insert("RET",     op(Handler::Ret,    0xC9, 0xC0, 0));
        table.insert("RETI",    op(Handler::TwoByte, 0xED, 0x4D, OP_Z80));
        table.insert("RETN",    op(Handler::TwoByte, 0xED, 0x45, OP_Z80));
        table.insert("RL",      op(Handler::CbGrp,  0x10, 0x00, OP_Z80));
        table.insert("RLA",     op(Handler::OneByte, 0x17, 0x00, 0));
        table.insert("RLC",     op(Handler::CbGrp,  0x00, 0x00, OP_Z80));
        table.insert("RLCA",    op(Handler::OneByte, 0x07, 0x00, 0));
        table.insert("RLD",     op(Handler::TwoByte, 0xED, 0x6F, OP_Z80));
        table.insert("RR",      op(Handler::CbGrp,  0x18, 0x00, OP_Z80));
        table.insert("RRA",     op(Handler::OneByte, 0x1F, 0x00, 0));
        table.insert("RRC",     op(Handler::CbGrp,  0x08, 0x00, OP_Z80));
        table.insert("RRCA",    op(Handler::OneByte, 0x0F, 0x00, 0));
        table.insert("RRD",     op(Handler::TwoByte, 0xED, 0x67, OP_Z80));
        table.insert("RST",     op(Handler::Rst,    0xC7, 0x00, 0));
        table.insert("SBC",     op(Handler::SbAdc,  0x98, 0x42, 0));
        table.insert("SCF",     op(Handler::OneByte, 0x37, 0x00, 0));
        table.insert("SET",     op(Handler::Set,    0xC0, 0x00, OP_SET));
        table.insert("SLA",     op(Handler::CbGrp,  0x20, 0x00, OP_Z80));
        table.insert("SLL",     op(Handler::CbGrp,  0x30, 0x00, OP_Z80 | OP_UNDOC));
        table.insert("SRA",     op(Handler::CbGrp,  0x28, 0x00, OP_Z80));
        table.insert("SRL",     op(Handler::CbGrp,  0x38, 0x00, OP_Z80));
        table.insert("SUB",     op(Handler::Alu,    0x90, 0xD6, 0));
        table.insert("XOR",     op(Handler::Alu,    0xA8, 0xEE, 0));

        // Pseudo operations:
        table.insert("ORG",     op(Handler::Org,    0, 0, 0));
        table.insert("EQU",     op(Handler::Equ,    0, 0, OP_SET));
        table.insert("DEFL",    op(Handler::Set,    0, 0, OP_SET));
        table.insert("DB",      op(Handler::Db,     0, 0, 0));
        table.insert("DEFB",    op(Handler::Db,     0, 0, 0));
        table.insert("DEFM",    op(Handler::Db,     0, 0, 0));
        table.insert("DW",      op(Handler::Dw,     0, 0, 0));
        table.insert("DEFW",    op(Handler::Dw,     0, 0, 0));
        table.insert("DS",      op(Handler::Ds,     0, 0, 0));
        table.insert("DEFS",    op(Handler::Ds,     0, 0, 0));
        table.insert("END",     op(Handler::End,    0, 0, 0));
        table.insert("INCLUDE", op(Handler::Include, 0, 0, 0));
        table.insert("TITLE",   op(Handler::Title,  0, 0, 0));
        table.insert("SUBTTL",  op(Handler::Subttl, 0, 0, 0));
        table.insert("PAGE",    op(Handler::Page,   0, 0, 0));
        table.insert("RADIX",   op(Handler::Radix,  0, 0, 0));
        table.insert(".PHASE",  op(Handler::Phase,  0, 0, 0));
        table.insert(".DEPHASE", op(Handler::Dephase, 0, 0, 0));
        table.insert("ASEG",    op(Handler::Aseg,   0, 0, 0));
        table.insert("PUBLIC",  op(Handler::Public, 0, 0, 0));
        table.insert("EXTRN",   op(Handler::Extrn,  0, 0, 0));

        // Conditional assembly:
        table.insert("IF",      op(Handler::CondIf, 1, 0, OP_COND));
        table.insert("IFE",     op(Handler::CondIf, 2, 0, OP_COND));
        table.insert("IFDEF",   op(Handler::CondIf, 3, 0, OP_COND));
        table.insert("IFNDEF",  op(Handler::CondIf, 4, 0, OP_COND));
        table.insert("IFB",     op(Handler::McondB, 1, 0, OP_COND));
        table.insert("IFNB",    op(Handler::McondB, 2, 0, OP_COND));
        table.insert("IFIDN",   op(Handler::McondB, 3, 0, OP_COND));
        table.insert("IFDIF",   op(Handler::McondB, 4, 0, OP_COND));
        table.insert("ELSE",    op(Handler::CondElse, 0, 0, OP_COND));
        table.insert("ENDIF",   op(Handler::CondEndif, 0, 0, OP_COND));

        // The macro engine:
        table.insert("MACRO",   op(Handler::MacroDef, 0, 0, OP_MDEF | OP_SET));
        table.insert("ENDM",    op(Handler::Endm,   0, 0, OP_MEND));
        table.insert("EXITM",   op(Handler::Exitm,  0, 0, 0));
        table.insert("LOCAL",   op(Handler::Local,  0, 0, 0));
        table.insert("IRP",     op(Handler::Irp,    0, 0, OP_MDEF));
        table.insert("IRPC",    op(Handler::Irpc,   0, 0, OP_MDEF));
        table.insert("REPT",    op(Handler::Rept,   0, 0, OP_MDEF));

        table
    };
}

pub(crate) fn lookup(mnemonic: &str) -> Option<OpEntry> {
    OPTAB.get(mnemonic).copied()
}

// The operand classes the code generators tell apart.  The register C
// doubles as the carry condition; the handlers that take a condition
// map it themselves.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum Reg {
    None,       // empty operand field
    NoReg,      // an expression, possibly a parenthesized memory operand
    A, B, C, D, E, H, L,
    F,          // only valid in the undocumented IN F,(C)
    I, R,
    IxH, IxL, IyH, IyL,
    BC, DE, HL, SP, AF, AFprime,
    IX, IY,
    IndBC,      // (BC)
    IndDE,      // (DE)
    IndHL,      // (HL)
    IndSP,      // (SP)
    IndC,       // (C)
    IndIX,      // (IX) or (IX+d)
    IndIY,      // (IY) or (IY+d)
    FlgNZ, FlgZ, FlgNC, FlgPO, FlgPE, FlgP, FlgM,
}

// Classify one operand.  Classification happens on an upper-cased copy
// with the blanks squeezed out; expressions are left to the evaluator.
pub(crate) fn get_reg(operand: &str) -> Reg {
    let squeezed: String = operand.chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    match squeezed.as_str() {
        ""      => { return Reg::None },
        "A"     => { return Reg::A },
        "B"     => { return Reg::B },
        "C"     => { return Reg::C },
        "D"     => { return Reg::D },
        "E"     => { return Reg::E },
        "H"     => { return Reg::H },
        "L"     => { return Reg::L },
        "F"     => { return Reg::F },
        "I"     => { return Reg::I },
        "R"     => { return Reg::R },
        "IXH"   => { return Reg::IxH },
        "IXL"   => { return Reg::IxL },
        "IYH"   => { return Reg::IyH },
        "IYL"   => { return Reg::IyL },
        "BC"    => { return Reg::BC },
        "DE"    => { return Reg::DE },
        "HL"    => { return Reg::HL },
        "SP"    => { return Reg::SP },
        "AF"    => { return Reg::AF },
        "AF'"   => { return Reg::AFprime },
        "IX"    => { return Reg::IX },
        "IY"    => { return Reg::IY },
        "(BC)"  => { return Reg::IndBC },
        "(DE)"  => { return Reg::IndDE },
        "(HL)"  => { return Reg::IndHL },
        "(SP)"  => { return Reg::IndSP },
        "(C)"   => { return Reg::IndC },
        "NZ"    => { return Reg::FlgNZ },
        "Z"     => { return Reg::FlgZ },
        "NC"    => { return Reg::FlgNC },
        "PO"    => { return Reg::FlgPO },
        "PE"    => { return Reg::FlgPE },
        "P"     => { return Reg::FlgP },
        "M"     => { return Reg::FlgM },
        _       => {},
    }

    if squeezed.ends_with(')') {
        if squeezed == "(IX)" || squeezed.starts_with("(IX+") || squeezed.starts_with("(IX-") {
            return Reg::IndIX;
        }
        if squeezed == "(IY)" || squeezed.starts_with("(IY+") || squeezed.starts_with("(IY-") {
            return Reg::IndIY;
        }
    }
    Reg::NoReg
}

// The 3-bit register field for the B,C,D,E,H,L,(HL),A encoding grid:
pub(crate) fn reg_bits(reg: Reg) -> Option<u8> {
    match reg {
        Reg::B     => { Some(0) },
        Reg::C     => { Some(1) },
        Reg::D     => { Some(2) },
        Reg::E     => { Some(3) },
        Reg::H     => { Some(4) },
        Reg::L     => { Some(5) },
        Reg::IndHL => { Some(6) },
        Reg::A     => { Some(7) },
        _          => { None },
    }
}

// The 3-bit condition field; the lone C names the carry condition here:
pub(crate) fn cond_bits(reg: Reg) -> Option<u8> {
    match reg {
        Reg::FlgNZ => { Some(0) },
        Reg::FlgZ  => { Some(1) },
        Reg::FlgNC => { Some(2) },
        Reg::C     => { Some(3) },
        Reg::FlgPO => { Some(4) },
        Reg::FlgPE => { Some(5) },
        Reg::FlgP  => { Some(6) },
        Reg::FlgM  => { Some(7) },
        _          => { None },
    }
}

// The 2-bit register-pair field (BC, DE, HL/index, SP):
pub(crate) fn pair_bits(reg: Reg) -> Option<u8> {
    match reg {
        Reg::BC => { Some(0) },
        Reg::DE => { Some(1) },
        Reg::HL | Reg::IX | Reg::IY => { Some(2) },
        Reg::SP => { Some(3) },
        _       => { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operands_classify_by_shape() {
        assert_eq!(get_reg(""), Reg::None);
        assert_eq!(get_reg("a"), Reg::A);
        assert_eq!(get_reg("( hl )"), Reg::IndHL);
        assert_eq!(get_reg("(ix+5)"), Reg::IndIX);
        assert_eq!(get_reg("(iy - 2)"), Reg::IndIY);
        assert_eq!(get_reg("(ix)"), Reg::IndIX);
        assert_eq!(get_reg("af'"), Reg::AFprime);
        assert_eq!(get_reg("0x1234"), Reg::NoReg);
        assert_eq!(get_reg("(1234)"), Reg::NoReg);
        assert_eq!(get_reg("label"), Reg::NoReg);
    }

    #[test]
    fn every_mnemonic_resolves() {
        for name in ["LD", "ADD", "DJNZ", "ORG", "IFDEF", "MACRO", "ENDM"] {
            assert!(lookup(name).is_some(), "{} missing from the table", name);
        }
        assert!(lookup("MOV").is_none(), "Intel mnemonics are not supported");
    }
}
