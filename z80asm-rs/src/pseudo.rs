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

// The pseudo operations: location counter control, data definition,
// source structure, and conditional assembly.

use std::path;

use crate::output::ErrCode;
use crate::symtab::SymKind;
use crate::{next_arg, Assembler, Fatal, ListAddr, IFNEST, STRDEL, STRDEL2};

impl Assembler {
    // ORG nn:
    pub(crate) fn op_org(&mut self) -> u16 {
        let operand = self.operand.clone();
        let addr = self.eval(&operand);

        if self.phs_flag {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        self.pc = addr;
        self.rpc = addr;
        self.a_mode = ListAddr::Value(addr);
        0
    }

    // label EQU nn:
    pub(crate) fn op_equ(&mut self) -> u16 {
        self.define_value_symbol(SymKind::Equ)
    }

    // label SET nn (also spelled DEFL), or the Z80 bit instruction when
    // there is no label to assign to:
    pub(crate) fn op_set(&mut self) -> u16 {
        if self.label.is_empty() {
            if self.not_8080_set() {
                return 0;
            }
            return self.op_cbgrp(0xC0);
        }
        self.define_value_symbol(SymKind::Set)
    }

    fn not_8080_set(&mut self) -> bool {
        if self.cfg.i8080 {
            self.asmerr(ErrCode::Ni8080);
            true
        } else {
            false
        }
    }

    fn define_value_symbol(&mut self, kind: SymKind) -> u16 {
        if self.label.is_empty() {
            self.asmerr(ErrCode::MisOpe);
            return 0;
        }
        let operand = self.operand.clone();
        let value = self.eval(&operand);

        let name = self.label.trim_end_matches(':').to_owned();
        let public = self.label.ends_with("::");
        let pass = self.pass;

        match self.symtab.define(&name, value, kind, pass) {
            Ok(()) => {
                if public {
                    self.symtab.make_public(&name);
                }
            },
            Err(code) => {
                self.asmerr(code);
            },
        }
        self.a_mode = ListAddr::Value(value);
        0
    }

    // DEFB / DB / DEFM: bytes and strings, in any mixture:
    pub(crate) fn op_db(&mut self) -> u16 {
        let operand = self.operand.clone();
        let mut remaining: Option<&str> = Some(&operand);
        let mut len: u16 = 0;

        while let Some(text) = remaining {
            let (arg, rest) = next_arg(text);
            remaining = rest;

            if arg.is_empty() {
                continue;
            }
            match parse_string(arg) {
                Some(bytes) => {
                    len += bytes.len() as u16;
                    if self.pass == 2 {
                        self.ops.extend_from_slice(&bytes);
                    }
                },
                None => {
                    len += 1;
                    if self.pass == 2 {
                        let arg = arg.to_owned();
                        let value = self.eval(&arg);
                        let value = self.chk_byte(value);
                        self.ops.push(value);
                    }
                },
            }
        }
        len
    }

    // DEFW / DW: little-endian words:
    pub(crate) fn op_dw(&mut self) -> u16 {
        let operand = self.operand.clone();
        let mut remaining: Option<&str> = Some(&operand);
        let mut len: u16 = 0;

        while let Some(text) = remaining {
            let (arg, rest) = next_arg(text);
            remaining = rest;

            if arg.is_empty() {
                continue;
            }
            len += 2;
            if self.pass == 2 {
                let arg = arg.to_owned();
                let value = self.eval(&arg);
                self.ops.push((value & 0xFF) as u8);
                self.ops.push((value >> 8) as u8);
            }
        }
        len
    }

    // DEFS / DS: reserve space without emitting bytes.  The operand must
    // not be a forward reference, since pass 1 needs the size.
    pub(crate) fn op_ds(&mut self) -> u16 {
        let operand = self.operand.clone();
        let size = self.eval(&operand);

        self.a_mode = ListAddr::Value(self.pc);
        self.pc = self.pc.wrapping_add(size);
        self.rpc = self.rpc.wrapping_add(size);
        0
    }

    // END, with an optional entry-point expression:
    pub(crate) fn op_end(&mut self) -> u16 {
        let operand = self.operand.clone();
        if !operand.is_empty() {
            self.eval(&operand);
        }
        self.end_seen = true;
        0
    }

    // INCLUDE filename:
    pub(crate) fn op_include(&mut self) -> Result<(), Fatal> {
        let name = unquote(self.operand.trim()).to_owned();
        if name.is_empty() {
            self.asmerr(ErrCode::MisOpe);
            return Ok(());
        }

        let path = self.resolve_include(&name);
        self.process_file(&path)
    }

    fn resolve_include(&self, name: &str) -> path::PathBuf {
        let given = path::Path::new(name);
        if given.is_absolute() {
            return given.to_owned();
        }

        // Relative names are looked up next to the including file first,
        // then along the -I search path:
        let current_dir = path::Path::new(&self.srcfn).parent();
        if let Some(dir) = current_dir {
            let candidate = dir.join(given);
            if candidate.exists() {
                return candidate;
            }
        }
        for dir in &self.cfg.include_dirs {
            let candidate = dir.join(given);
            if candidate.exists() {
                return candidate;
            }
        }
        given.to_owned()
    }

    // TITLE 'text':
    pub(crate) fn op_title(&mut self) -> u16 {
        self.title = unquote(self.operand.trim()).to_owned();
        0
    }

    pub(crate) fn op_subttl(&mut self) -> u16 {
        self.subttl = unquote(self.operand.trim()).to_owned();
        0
    }

    // PAGE, or PAGE n to change the page length:
    pub(crate) fn op_page(&mut self) -> u16 {
        let operand = self.operand.clone();
        if operand.is_empty() {
            self.lst.request_page_break();
        } else {
            let length = self.eval(&operand);
            if length < 6 || length > 144 {
                self.asmerr(ErrCode::ValOut);
            } else {
                self.lst.set_page_length(length as usize);
            }
        }
        0
    }

    // RADIX n (2..16):
    pub(crate) fn op_radix(&mut self) -> u16 {
        let operand = self.operand.clone();
        let value = self.eval(&operand);

        if value < 2 || value > 16 {
            self.asmerr(ErrCode::ValOut);
        } else {
            self.radix = value as u32;
        }
        0
    }

    // .PHASE nn: code is located at rpc but assembled as if it ran at
    // the phased address.
    pub(crate) fn op_phase(&mut self) -> u16 {
        if self.phs_flag {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        let operand = self.operand.clone();
        let addr = self.eval(&operand);

        self.phs_flag = true;
        self.pc = addr;
        self.a_mode = ListAddr::Value(addr);
        0
    }

    pub(crate) fn op_dephase(&mut self) -> u16 {
        if !self.phs_flag {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        self.phs_flag = false;
        self.pc = self.rpc;
        self.a_mode = ListAddr::Value(self.pc);
        0
    }

    // ASEG: absolute code is all there is, so this is a no-op kept for
    // source compatibility.
    pub(crate) fn op_aseg(&mut self) -> u16 {
        0
    }

    // PUBLIC name[,name...]:
    pub(crate) fn op_public(&mut self) -> u16 {
        let operand = self.operand.clone();
        let mut remaining: Option<&str> = Some(&operand);

        while let Some(text) = remaining {
            let (arg, rest) = next_arg(text);
            remaining = rest;
            if arg.is_empty() {
                continue;
            }
            let name = self.sym_name(arg);
            if self.symtab.exists(&name) {
                self.symtab.make_public(&name);
            } else if self.pass == 2 {
                self.asmerr(ErrCode::UndSym);
            }
        }
        0
    }

    // EXTRN name[,name...]: accepted for source compatibility; the
    // symbols read as zero.
    pub(crate) fn op_extrn(&mut self) -> u16 {
        let operand = self.operand.clone();
        let mut remaining: Option<&str> = Some(&operand);

        while let Some(text) = remaining {
            let (arg, rest) = next_arg(text);
            remaining = rest;
            if arg.is_empty() {
                continue;
            }
            let name = self.sym_name(arg);
            if !self.symtab.exists(&name) {
                let pass = self.pass;
                self.symtab.define(&name, 0, SymKind::Extern, pass)
                    .unwrap_or(());
            }
        }
        0
    }

    // IF / IFE / IFDEF / IFNDEF:
    pub(crate) fn op_if(&mut self, kind: u8) -> u16 {
        if self.iflevel >= IFNEST {
            self.asmerr(ErrCode::IfNest);
            return 0;
        }
        self.condnest[self.iflevel] = self.gencode;
        self.iflevel += 1;

        if self.gencode < 0 {
            return 0;
        }

        let operand = self.operand.clone();
        let satisfied = match kind {
            1 => { self.eval(&operand) != 0 },
            2 => { self.eval(&operand) == 0 },
            3 => {
                let name = self.sym_name(operand.trim());
                self.symtab.exists(&name)
            },
            _ => {
                let name = self.sym_name(operand.trim());
                !self.symtab.exists(&name)
            },
        };
        self.gencode = if satisfied { self.pass } else { -self.pass };
        0
    }

    pub(crate) fn op_else(&mut self) -> u16 {
        if self.iflevel == 0 {
            self.asmerr(ErrCode::MisIff);
            return 0;
        }
        // Only flip when the enclosing level is emitting:
        if self.condnest[self.iflevel - 1] >= 0 {
            self.gencode = -self.gencode;
        }
        0
    }

    pub(crate) fn op_endif(&mut self) -> u16 {
        if self.iflevel == 0 {
            self.asmerr(ErrCode::MisIff);
            return 0;
        }
        self.iflevel -= 1;
        self.gencode = self.condnest[self.iflevel];
        0
    }
}

// Strip one level of string quotes, if present:
pub(crate) fn unquote(text: &str) -> &str {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() >= 2 {
        let first = chars[0];
        if (first == STRDEL || first == STRDEL2) && chars[chars.len() - 1] == first {
            return &text[1..text.len() - 1];
        }
    }
    text
}

// Try to read an argument as a string constant.  Returns None when the
// text is not a plain string (and should be treated as an expression).
// A doubled delimiter inside the string stands for the delimiter.
pub(crate) fn parse_string(arg: &str) -> Option<Vec<u8>> {
    let chars: Vec<char> = arg.trim().chars().collect();
    if chars.len() < 2 {
        return None;
    }
    let delim = chars[0];
    if delim != STRDEL && delim != STRDEL2 {
        return None;
    }

    let mut bytes = Vec::new();
    let mut pos = 1;
    loop {
        match chars.get(pos) {
            None => {
                // Unterminated; let the expression evaluator complain.
                return None;
            },
            Some(&ch) if ch == delim => {
                if chars.get(pos + 1) == Some(&delim) {
                    bytes.push(delim as u8);
                    pos += 2;
                } else {
                    pos += 1;
                    break;
                }
            },
            Some(&ch) => {
                bytes.push(ch as u8);
                pos += 1;
            },
        }
    }
    if pos != chars.len() {
        // Trailing text: this is an expression like 'A'+1.
        return None;
    }

    // A one- or two-character constant is a number, not a string, so
    // that DB 'X' and DW 'XY' behave as expressions; longer runs are
    // character data.  For DB the distinction doesn't change the bytes
    // of a single character, so treating even those here is fine.
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_parse_with_doubled_delimiters() {
        assert_eq!(parse_string("'ABC'"), Some(vec![0x41, 0x42, 0x43]));
        assert_eq!(parse_string("'it''s'"), Some(b"it's".to_vec()));
        assert_eq!(parse_string("\"hi\""), Some(vec![0x68, 0x69]));
        assert_eq!(parse_string("''"), Some(vec![]));
        assert_eq!(parse_string("'A'+1"), None);
        assert_eq!(parse_string("12"), None);
    }

    #[test]
    fn quotes_strip_from_titles() {
        assert_eq!(unquote("'My Title'"), "My Title");
        assert_eq!(unquote("plain"), "plain");
    }
}
