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

// Code generation for the real Z80/8080 instructions.  Every routine
// returns the number of object bytes the statement assembles to; the
// length must come out the same in both passes, so expressions are only
// evaluated (and range-checked) in pass 2, when all symbols are known.
//
// In 8080 mode the instruction set is restricted to the 8080 subset of
// the Zilog mnemonics; anything that would need a prefix byte or the
// Z80-only registers is rejected.

use crate::next_arg;
use crate::opcodes::{cond_bits, get_reg, pair_bits, reg_bits, Reg};
use crate::output::ErrCode;
use crate::Assembler;

impl Assembler {
    fn pass2(&self) -> bool {
        self.pass == 2
    }

    // Reject a Z80-only form in 8080 mode.  Returns true when rejected.
    fn not_8080(&mut self) -> bool {
        if self.cfg.i8080 {
            self.asmerr(ErrCode::Ni8080);
            true
        } else {
            false
        }
    }

    // Reject an undocumented operand form unless -u was given:
    fn not_undoc(&mut self) -> bool {
        if !self.cfg.undoc {
            self.asmerr(ErrCode::IllOpe);
            true
        } else {
            false
        }
    }

    // The expression inside a parenthesized memory operand like (1234):
    fn mem_expr(&mut self, arg: &str) -> u16 {
        let trimmed = arg.trim();
        if trimmed.len() < 2 || !trimmed.starts_with('(') || !trimmed.ends_with(')') {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        let inner = trimmed[1..trimmed.len() - 1].to_owned();
        self.eval(&inner)
    }

    // The displacement of an (IX+d) / (IY+d) operand; (IX) reads as a
    // zero displacement.
    fn idx_disp(&mut self, arg: &str) -> u8 {
        let trimmed = arg.trim();
        if trimmed.len() < 4 || !trimmed.starts_with('(') || !trimmed.ends_with(')') {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        let inner = trimmed[1..trimmed.len() - 1].trim().to_owned();

        // Skip the register name; what's left is a signed expression.
        let rest = inner[2..].trim().to_owned();
        if rest.is_empty() {
            return 0;
        }
        if !rest.starts_with('+') && !rest.starts_with('-') {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        let value = self.eval(&rest);
        self.chk_sbyte(value)
    }

    fn prefix_of(reg: Reg) -> u8 {
        match reg {
            Reg::IY | Reg::IndIY | Reg::IyH | Reg::IyL => { 0xFD },
            _                                          => { 0xDD },
        }
    }

    // A one-byte opcode without arguments:
    pub(crate) fn op_1b(&mut self, b1: u8) -> u16 {
        if self.pass2() {
            self.ops.push(b1);
        }
        1
    }

    // A two-byte opcode without arguments:
    pub(crate) fn op_2b(&mut self, b1: u8, b2: u8) -> u16 {
        if self.pass2() {
            self.ops.push(b1);
            self.ops.push(b2);
        }
        2
    }

    // IM 0, IM 1, IM 2:
    pub(crate) fn op_im(&mut self, b1: u8, b2: u8) -> u16 {
        if self.pass2() {
            let operand = self.operand.clone();
            let mode = self.eval(&operand);
            let second = match mode {
                0 => { b2 },
                1 => { b2 + 0x10 },
                2 => { b2 + 0x18 },
                _ => {
                    self.asmerr(ErrCode::ValOut);
                    b2
                },
            };
            self.ops.push(b1);
            self.ops.push(second);
        }
        2
    }

    // PUSH and POP:
    pub(crate) fn op_pupo(&mut self, base: u8) -> u16 {
        let operand = self.operand.clone();
        match get_reg(&operand) {
            Reg::BC => { self.op_1b(base) },
            Reg::DE => { self.op_1b(base + 0x10) },
            Reg::HL => { self.op_1b(base + 0x20) },
            Reg::AF => { self.op_1b(base + 0x30) },
            Reg::IX | Reg::IY => {
                if self.not_8080() {
                    return 0;
                }
                let prefix = Self::prefix_of(get_reg(&operand));
                self.op_2b(prefix, base + 0x20)
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // The EX family:
    pub(crate) fn op_ex(&mut self) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);
        let second = match rest {
            Some(text) => { text.trim().to_owned() },
            None => {
                self.asmerr(ErrCode::MisOpe);
                return 0;
            },
        };

        match (get_reg(first), get_reg(&second)) {
            (Reg::DE, Reg::HL) => { self.op_1b(0xEB) },
            (Reg::AF, Reg::AFprime) => {
                if self.not_8080() {
                    return 0;
                }
                self.op_1b(0x08)
            },
            (Reg::IndSP, Reg::HL) => { self.op_1b(0xE3) },
            (Reg::IndSP, Reg::IX) => {
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(0xDD, 0xE3)
            },
            (Reg::IndSP, Reg::IY) => {
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(0xFD, 0xE3)
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // RST p:
    pub(crate) fn op_rst(&mut self, base: u8) -> u16 {
        if self.pass2() {
            let operand = self.operand.clone();
            let value = self.eval(&operand);
            let mut vector = self.chk_byte(value);
            if (vector >> 3) > 7 || (vector & 7) != 0 {
                vector = 0;
                self.asmerr(ErrCode::ValOut);
            }
            self.ops.push(base + vector);
        }
        1
    }

    // RET and RET cc:
    pub(crate) fn op_ret(&mut self, base: u8, base_cc: u8) -> u16 {
        let operand = self.operand.clone();
        let reg = get_reg(&operand);

        if reg == Reg::None {
            return self.op_1b(base);
        }
        match cond_bits(reg) {
            Some(cc) => { self.op_1b(base_cc | (cc << 3)) },
            None => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // JP and CALL:
    pub(crate) fn op_jpcall(&mut self, base: u8, base_cc: u8) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);
        let freg = get_reg(first);

        if let Some(cc) = cond_bits(freg) {
            if let Some(addr_text) = rest {
                let addr_text = addr_text.trim().to_owned();
                if self.pass2() {
                    let addr = self.eval(&addr_text);
                    self.ops.push(base_cc | (cc << 3));
                    self.ops.push((addr & 0xFF) as u8);
                    self.ops.push((addr >> 8) as u8);
                }
                return 3;
            }
        }
        match freg {
            Reg::IndHL if base == 0xC3 && rest.is_none() => {
                self.op_1b(0xE9)
            },
            Reg::IndIX | Reg::IndIY if base == 0xC3 && rest.is_none() => {
                if self.not_8080() {
                    return 0;
                }
                // Only the plain (IX) form exists; a displacement would
                // need an add the hardware doesn't do.
                let squeezed: String =
                    first.chars().filter(|ch| !ch.is_whitespace()).collect();
                if squeezed.len() != 4 {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                self.op_2b(Self::prefix_of(freg), 0xE9)
            },
            Reg::NoReg if rest.is_none() => {
                if self.pass2() {
                    let addr = self.eval(first);
                    self.ops.push(base);
                    self.ops.push((addr & 0xFF) as u8);
                    self.ops.push((addr >> 8) as u8);
                }
                3
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // JR and JR cc:
    pub(crate) fn op_jr(&mut self, base: u8, base_cc: u8) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);
        let freg = get_reg(first);

        if let Some(cc) = cond_bits(freg) {
            if cc < 4 {
                if let Some(addr_text) = rest {
                    let addr_text = addr_text.trim().to_owned();
                    if self.pass2() {
                        let target = self.eval(&addr_text);
                        let disp = target.wrapping_sub(self.pc).wrapping_sub(2);
                        let disp = self.chk_sbyte(disp);
                        self.ops.push(base_cc | (cc << 3));
                        self.ops.push(disp);
                    }
                    return 2;
                }
                self.asmerr(ErrCode::MisOpe);
                return 0;
            }
        }
        match freg {
            Reg::NoReg if rest.is_none() => {
                if self.pass2() {
                    let target = self.eval(first);
                    let disp = target.wrapping_sub(self.pc).wrapping_sub(2);
                    let disp = self.chk_sbyte(disp);
                    self.ops.push(base);
                    self.ops.push(disp);
                }
                2
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // DJNZ n:
    pub(crate) fn op_djnz(&mut self, base: u8) -> u16 {
        if self.pass2() {
            let operand = self.operand.clone();
            let target = self.eval(&operand);
            let disp = target.wrapping_sub(self.pc).wrapping_sub(2);
            let disp = self.chk_sbyte(disp);
            self.ops.push(base);
            self.ops.push(disp);
        }
        2
    }

    // The shared tail of the 8-bit accumulator operations: ADD A,x and
    // friends all accept a register, an index half, an indexed memory
    // operand, (HL) or an immediate.
    fn alu_operand(&mut self, reg_base: u8, imm_base: u8, arg: &str) -> u16 {
        let reg = get_reg(arg);

        if let Some(bits) = reg_bits(reg) {
            return self.op_1b(reg_base | bits);
        }
        match reg {
            Reg::IxH | Reg::IxL | Reg::IyH | Reg::IyL => {
                if self.not_8080() || self.not_undoc() {
                    return 0;
                }
                let bits = match reg {
                    Reg::IxH | Reg::IyH => { 4 },
                    _                   => { 5 },
                };
                self.op_2b(Self::prefix_of(reg), reg_base | bits)
            },
            Reg::IndIX | Reg::IndIY => {
                if self.not_8080() {
                    return 0;
                }
                if self.pass2() {
                    let disp = self.idx_disp(arg);
                    self.ops.push(Self::prefix_of(reg));
                    self.ops.push(reg_base | 6);
                    self.ops.push(disp);
                }
                3
            },
            Reg::NoReg => {
                if self.pass2() {
                    let arg = arg.to_owned();
                    let value = self.eval(&arg);
                    let value = self.chk_byte(value);
                    self.ops.push(imm_base);
                    self.ops.push(value);
                }
                2
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // ADD: the accumulator forms plus the 16-bit ADD HL/IX/IY,rr:
    pub(crate) fn op_add(&mut self, base: u8, base16: u8) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);

        match get_reg(first) {
            Reg::A => {
                match rest {
                    Some(second) => {
                        let second = second.trim().to_owned();
                        self.alu_operand(base, base + 0x46, &second)
                    },
                    None => {
                        self.asmerr(ErrCode::MisOpe);
                        0
                    },
                }
            },
            Reg::HL => {
                let second = match rest {
                    Some(text) => { text.trim().to_owned() },
                    None => {
                        self.asmerr(ErrCode::MisOpe);
                        return 0;
                    },
                };
                match pair_bits(get_reg(&second)) {
                    Some(pair) if get_reg(&second) != Reg::IX
                               && get_reg(&second) != Reg::IY => {
                        self.op_1b(base16 + (pair << 4))
                    },
                    _ => {
                        self.asmerr(ErrCode::IllOpe);
                        0
                    },
                }
            },
            Reg::IX | Reg::IY => {
                if self.not_8080() {
                    return 0;
                }
                let dst = get_reg(first);
                let second = match rest {
                    Some(text) => { text.trim().to_owned() },
                    None => {
                        self.asmerr(ErrCode::MisOpe);
                        return 0;
                    },
                };
                let src = get_reg(&second);
                // The index register pairs with itself in the HL slot:
                let pair = match src {
                    Reg::BC => { 0 },
                    Reg::DE => { 1 },
                    Reg::SP => { 3 },
                    _ if src == dst => { 2 },
                    _ => {
                        self.asmerr(ErrCode::IllOpe);
                        return 0;
                    },
                };
                self.op_2b(Self::prefix_of(dst), base16 + (pair << 4))
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // ADC and SBC: the accumulator forms plus the ED-prefixed 16-bit
    // forms on HL:
    pub(crate) fn op_sbadc(&mut self, base: u8, base16: u8) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);

        match get_reg(first) {
            Reg::A => {
                match rest {
                    Some(second) => {
                        let second = second.trim().to_owned();
                        self.alu_operand(base, base + 0x46, &second)
                    },
                    None => {
                        self.asmerr(ErrCode::MisOpe);
                        0
                    },
                }
            },
            Reg::HL => {
                if self.not_8080() {
                    return 0;
                }
                let second = match rest {
                    Some(text) => { text.trim().to_owned() },
                    None => {
                        self.asmerr(ErrCode::MisOpe);
                        return 0;
                    },
                };
                let src = get_reg(&second);
                match pair_bits(src) {
                    Some(pair) if src != Reg::IX && src != Reg::IY => {
                        self.op_2b(0xED, base16 + (pair << 4))
                    },
                    _ => {
                        self.asmerr(ErrCode::IllOpe);
                        0
                    },
                }
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // SUB, AND, XOR, OR, CP.  The accumulator may be named explicitly
    // (`AND A,B') or left implicit (`AND B'):
    pub(crate) fn op_alu(&mut self, base: u8, imm: u8) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);

        if get_reg(first) == Reg::A {
            if let Some(second) = rest {
                let second = second.trim().to_owned();
                return self.alu_operand(base, imm, &second);
            }
        } else if rest.is_some() {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        self.alu_operand(base, imm, &operand)
    }

    // INC and DEC, 8-bit and 16-bit:
    pub(crate) fn op_decinc(&mut self, base: u8, base16: u8) -> u16 {
        let operand = self.operand.clone();
        let reg = get_reg(&operand);

        if let Some(bits) = reg_bits(reg) {
            return self.op_1b(base + (bits << 3));
        }
        match reg {
            Reg::IxH | Reg::IxL | Reg::IyH | Reg::IyL => {
                if self.not_8080() || self.not_undoc() {
                    return 0;
                }
                let bits = match reg {
                    Reg::IxH | Reg::IyH => { 4 },
                    _                   => { 5 },
                };
                self.op_2b(Self::prefix_of(reg), base + (bits << 3))
            },
            Reg::IndIX | Reg::IndIY => {
                if self.not_8080() {
                    return 0;
                }
                if self.pass2() {
                    let disp = self.idx_disp(&operand);
                    self.ops.push(Self::prefix_of(reg));
                    self.ops.push(base + (6 << 3));
                    self.ops.push(disp);
                }
                3
            },
            Reg::BC | Reg::DE | Reg::HL | Reg::SP => {
                let pair = pair_bits(reg).unwrap_or(0);
                self.op_1b(base16 + (pair << 4))
            },
            Reg::IX | Reg::IY => {
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(Self::prefix_of(reg), base16 + 0x20)
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // OUT (n),A, OUT (C),r and the undocumented OUT (C),0:
    pub(crate) fn op_out(&mut self) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);
        let second = match rest {
            Some(text) => { text.trim().to_owned() },
            None => {
                self.asmerr(ErrCode::MisOpe);
                return 0;
            },
        };

        match get_reg(first) {
            Reg::IndC => {
                if self.not_8080() {
                    return 0;
                }
                let src = get_reg(&second);
                if let Some(bits) = reg_bits(src) {
                    if src == Reg::IndHL {
                        self.asmerr(ErrCode::IllOpe);
                        return 0;
                    }
                    return self.op_2b(0xED, 0x41 | (bits << 3));
                }
                if src == Reg::NoReg {
                    // OUT (C),0 is the undocumented constant-zero form:
                    if self.not_undoc() {
                        return 0;
                    }
                    if self.pass2() {
                        let value = self.eval(&second);
                        if value != 0 {
                            self.asmerr(ErrCode::ValOut);
                        }
                    }
                    return self.op_2b(0xED, 0x71);
                }
                self.asmerr(ErrCode::IllOpe);
                0
            },
            Reg::NoReg if first.trim_start().starts_with('(') => {
                if get_reg(&second) != Reg::A {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                if self.pass2() {
                    let first = first.to_owned();
                    let port = self.mem_expr(&first);
                    let port = self.chk_byte(port);
                    self.ops.push(0xD3);
                    self.ops.push(port);
                }
                2
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // IN A,(n), IN r,(C) and the undocumented IN F,(C):
    pub(crate) fn op_in(&mut self) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);
        let second = match rest {
            Some(text) => { text.trim().to_owned() },
            None => {
                self.asmerr(ErrCode::MisOpe);
                return 0;
            },
        };
        let freg = get_reg(first);
        let sreg = get_reg(&second);

        if freg == Reg::A && sreg == Reg::NoReg && second.starts_with('(') {
            if self.pass2() {
                let port = self.mem_expr(&second);
                let port = self.chk_byte(port);
                self.ops.push(0xDB);
                self.ops.push(port);
            }
            return 2;
        }
        if sreg == Reg::IndC {
            if self.not_8080() {
                return 0;
            }
            if freg == Reg::F {
                if self.not_undoc() {
                    return 0;
                }
                return self.op_2b(0xED, 0x70);
            }
            if let Some(bits) = reg_bits(freg) {
                if freg != Reg::IndHL {
                    return self.op_2b(0xED, 0x40 | (bits << 3));
                }
            }
        }
        self.asmerr(ErrCode::IllOpe);
        0
    }

    // The CB-prefixed group: rotates and shifts (base < 0x40), and BIT,
    // RES, SET (base 0x40, 0x80, 0xC0) with a bit-number first operand.
    // The DD/FD CB forms take an optional extra register operand, the
    // undocumented store-to-register variant.
    pub(crate) fn op_cbgrp(&mut self, base: u8) -> u16 {
        let operand = self.operand.clone();

        let (bit, reg_text, alt_text) = if base >= 0x40 {
            let (first, rest) = next_arg(&operand);
            let rest = match rest {
                Some(text) => { text.to_owned() },
                None => {
                    self.asmerr(ErrCode::MisOpe);
                    return 0;
                },
            };
            let bit = if self.pass2() {
                let first = first.to_owned();
                let value = self.eval(&first);
                if value > 7 {
                    self.asmerr(ErrCode::ValOut);
                    0
                } else {
                    value as u8
                }
            } else {
                0
            };
            let (second, third) = next_arg(&rest);
            (bit, second.to_owned(), third.map(|text| text.trim().to_owned()))
        } else {
            let (first, rest) = next_arg(&operand);
            (0, first.to_owned(), rest.map(|text| text.trim().to_owned()))
        };

        let reg = get_reg(&reg_text);
        let selector = base | (bit << 3);

        if let Some(bits) = reg_bits(reg) {
            if alt_text.is_some() {
                self.asmerr(ErrCode::IllOpe);
                return 0;
            }
            return self.op_2b(0xCB, selector | bits);
        }
        match reg {
            Reg::IndIX | Reg::IndIY => {
                if self.not_8080() {
                    return 0;
                }
                // The optional extra register names the undocumented
                // store-to-register column:
                let column = match alt_text {
                    Some(alt) => {
                        if self.not_undoc() {
                            return 0;
                        }
                        let alt_reg = get_reg(&alt);
                        match reg_bits(alt_reg) {
                            Some(bits) if alt_reg != Reg::IndHL => { bits },
                            _ => {
                                self.asmerr(ErrCode::IllOpe);
                                return 0;
                            },
                        }
                    },
                    None => { 6 },
                };
                if self.pass2() {
                    let disp = self.idx_disp(&reg_text);
                    self.ops.push(Self::prefix_of(reg));
                    self.ops.push(0xCB);
                    self.ops.push(disp);
                    self.ops.push(selector | column);
                }
                4
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // LD in all of its shapes:
    pub(crate) fn op_ld(&mut self) -> u16 {
        let operand = self.operand.clone();
        let (first, rest) = next_arg(&operand);
        let second = match rest {
            Some(text) => { text.trim().to_owned() },
            None => {
                self.asmerr(ErrCode::MisOpe);
                return 0;
            },
        };
        let dst = get_reg(first);
        let src = get_reg(&second);

        match dst {
            Reg::A | Reg::B | Reg::C | Reg::D | Reg::E | Reg::H | Reg::L => {
                self.ld_reg(dst, src, &second)
            },
            Reg::IxH | Reg::IxL | Reg::IyH | Reg::IyL => {
                self.ld_index_half(dst, src, &second)
            },
            Reg::IndHL => {
                self.ld_ind_hl(src, &second)
            },
            Reg::IndBC | Reg::IndDE => {
                if src != Reg::A {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                self.op_1b(if dst == Reg::IndBC { 0x02 } else { 0x12 })
            },
            Reg::IndIX | Reg::IndIY => {
                self.ld_ind_index(dst, first, src, &second)
            },
            Reg::BC | Reg::DE | Reg::HL | Reg::SP | Reg::IX | Reg::IY => {
                self.ld_pair(dst, src, &second)
            },
            Reg::I => {
                if src != Reg::A {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(0xED, 0x47)
            },
            Reg::R => {
                if src != Reg::A {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(0xED, 0x4F)
            },
            Reg::NoReg if first.trim_start().starts_with('(') => {
                self.ld_ind_nn(first, src, &second)
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // LD r,x with an 8-bit register destination:
    fn ld_reg(&mut self, dst: Reg, src: Reg, src_text: &str) -> u16 {
        let dbits = reg_bits(dst).unwrap_or(7);

        if let Some(sbits) = reg_bits(src) {
            return self.op_1b(0x40 | (dbits << 3) | sbits);
        }
        match src {
            Reg::IndBC | Reg::IndDE if dst == Reg::A => {
                self.op_1b(if src == Reg::IndBC { 0x0A } else { 0x1A })
            },
            Reg::I | Reg::R if dst == Reg::A => {
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(0xED, if src == Reg::I { 0x57 } else { 0x5F })
            },
            Reg::IxH | Reg::IxL | Reg::IyH | Reg::IyL => {
                if self.not_8080() || self.not_undoc() {
                    return 0;
                }
                // H and L can't pair with an index half:
                if dst == Reg::H || dst == Reg::L {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                let sbits = match src {
                    Reg::IxH | Reg::IyH => { 4 },
                    _                   => { 5 },
                };
                self.op_2b(Self::prefix_of(src), 0x40 | (dbits << 3) | sbits)
            },
            Reg::IndIX | Reg::IndIY => {
                if self.not_8080() {
                    return 0;
                }
                if self.pass2() {
                    let disp = self.idx_disp(src_text);
                    self.ops.push(Self::prefix_of(src));
                    self.ops.push(0x46 | (dbits << 3));
                    self.ops.push(disp);
                }
                3
            },
            Reg::NoReg if src_text.trim_start().starts_with('(') => {
                if dst != Reg::A {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                if self.pass2() {
                    let src_text = src_text.to_owned();
                    let addr = self.mem_expr(&src_text);
                    self.ops.push(0x3A);
                    self.ops.push((addr & 0xFF) as u8);
                    self.ops.push((addr >> 8) as u8);
                }
                3
            },
            Reg::NoReg => {
                if self.pass2() {
                    let src_text = src_text.to_owned();
                    let value = self.eval(&src_text);
                    let value = self.chk_byte(value);
                    self.ops.push(0x06 | (dbits << 3));
                    self.ops.push(value);
                }
                2
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // LD IXH,x / LD IXL,x / LD IYH,x / LD IYL,x (all undocumented):
    fn ld_index_half(&mut self, dst: Reg, src: Reg, src_text: &str) -> u16 {
        if self.not_8080() || self.not_undoc() {
            return 0;
        }
        let prefix = Self::prefix_of(dst);
        let dbits = match dst {
            Reg::IxH | Reg::IyH => { 4 },
            _                   => { 5 },
        };

        match src {
            Reg::A | Reg::B | Reg::C | Reg::D | Reg::E => {
                let sbits = reg_bits(src).unwrap_or(7);
                self.op_2b(prefix, 0x40 | (dbits << 3) | sbits)
            },
            Reg::IxH | Reg::IxL | Reg::IyH | Reg::IyL => {
                if Self::prefix_of(src) != prefix {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                let sbits = match src {
                    Reg::IxH | Reg::IyH => { 4 },
                    _                   => { 5 },
                };
                self.op_2b(prefix, 0x40 | (dbits << 3) | sbits)
            },
            Reg::NoReg => {
                if self.pass2() {
                    let src_text = src_text.to_owned();
                    let value = self.eval(&src_text);
                    let value = self.chk_byte(value);
                    self.ops.push(prefix);
                    self.ops.push(0x06 | (dbits << 3));
                    self.ops.push(value);
                }
                3
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // LD (HL),x:
    fn ld_ind_hl(&mut self, src: Reg, src_text: &str) -> u16 {
        if let Some(sbits) = reg_bits(src) {
            if src == Reg::IndHL {
                self.asmerr(ErrCode::IllOpe);
                return 0;
            }
            return self.op_1b(0x70 | sbits);
        }
        match src {
            Reg::NoReg => {
                if self.pass2() {
                    let src_text = src_text.to_owned();
                    let value = self.eval(&src_text);
                    let value = self.chk_byte(value);
                    self.ops.push(0x36);
                    self.ops.push(value);
                }
                2
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // LD (IX+d),x / LD (IY+d),x:
    fn ld_ind_index(&mut self, dst: Reg, dst_text: &str, src: Reg, src_text: &str) -> u16 {
        if self.not_8080() {
            return 0;
        }
        let prefix = Self::prefix_of(dst);

        if let Some(sbits) = reg_bits(src) {
            if src == Reg::IndHL {
                self.asmerr(ErrCode::IllOpe);
                return 0;
            }
            if self.pass2() {
                let dst_text = dst_text.to_owned();
                let disp = self.idx_disp(&dst_text);
                self.ops.push(prefix);
                self.ops.push(0x70 | sbits);
                self.ops.push(disp);
            }
            return 3;
        }
        match src {
            Reg::NoReg => {
                if self.pass2() {
                    let dst_text = dst_text.to_owned();
                    let src_text = src_text.to_owned();
                    let disp = self.idx_disp(&dst_text);
                    let value = self.eval(&src_text);
                    let value = self.chk_byte(value);
                    self.ops.push(prefix);
                    self.ops.push(0x36);
                    self.ops.push(disp);
                    self.ops.push(value);
                }
                4
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }

    // LD (nn),x:
    fn ld_ind_nn(&mut self, dst_text: &str, src: Reg, _src_text: &str) -> u16 {
        let (opcodes, len): (&[u8], u16) = match src {
            Reg::A  => { (&[0x32], 3) },
            Reg::HL => { (&[0x22], 3) },
            Reg::BC => { (&[0xED, 0x43], 4) },
            Reg::DE => { (&[0xED, 0x53], 4) },
            Reg::SP => { (&[0xED, 0x73], 4) },
            Reg::IX => { (&[0xDD, 0x22], 4) },
            Reg::IY => { (&[0xFD, 0x22], 4) },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                return 0;
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                return 0;
            },
        };
        if len == 4 && self.not_8080() {
            return 0;
        }
        if self.pass2() {
            let dst_text = dst_text.to_owned();
            let addr = self.mem_expr(&dst_text);
            self.ops.extend_from_slice(opcodes);
            self.ops.push((addr & 0xFF) as u8);
            self.ops.push((addr >> 8) as u8);
        }
        len
    }

    // LD rr,x with a 16-bit destination:
    fn ld_pair(&mut self, dst: Reg, src: Reg, src_text: &str) -> u16 {
        let indexed = dst == Reg::IX || dst == Reg::IY;
        if indexed && self.not_8080() {
            return 0;
        }

        match src {
            Reg::HL | Reg::IX | Reg::IY if dst == Reg::SP => {
                if src == Reg::HL {
                    return self.op_1b(0xF9);
                }
                if self.not_8080() {
                    return 0;
                }
                self.op_2b(Self::prefix_of(src), 0xF9)
            },
            Reg::NoReg if src_text.trim_start().starts_with('(') => {
                let (opcodes, len): (&[u8], u16) = match dst {
                    Reg::HL => { (&[0x2A], 3) },
                    Reg::BC => { (&[0xED, 0x4B], 4) },
                    Reg::DE => { (&[0xED, 0x5B], 4) },
                    Reg::SP => { (&[0xED, 0x7B], 4) },
                    Reg::IX => { (&[0xDD, 0x2A], 4) },
                    _       => { (&[0xFD, 0x2A], 4) },
                };
                if len == 4 && !indexed && self.not_8080() {
                    return 0;
                }
                if self.pass2() {
                    let src_text = src_text.to_owned();
                    let addr = self.mem_expr(&src_text);
                    self.ops.extend_from_slice(opcodes);
                    self.ops.push((addr & 0xFF) as u8);
                    self.ops.push((addr >> 8) as u8);
                }
                len
            },
            Reg::NoReg => {
                if self.pass2() {
                    let src_text = src_text.to_owned();
                    let value = self.eval(&src_text);
                    if indexed {
                        self.ops.push(Self::prefix_of(dst));
                        self.ops.push(0x21);
                    } else {
                        let pair = pair_bits(dst).unwrap_or(0);
                        self.ops.push(0x01 | (pair << 4));
                    }
                    self.ops.push((value & 0xFF) as u8);
                    self.ops.push((value >> 8) as u8);
                }
                if indexed { 4 } else { 3 }
            },
            Reg::None => {
                self.asmerr(ErrCode::MisOpe);
                0
            },
            _ => {
                self.asmerr(ErrCode::IllOpe);
                0
            },
        }
    }
}
