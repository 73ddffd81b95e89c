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

// A two-pass macro assembler for the Z80 and the Intel 8080, using the
// Zilog mnemonics.
//
// Pass 1 reads every source file, sizes each instruction and collects the
// symbols and macro bodies; pass 2 reads everything again, by then every
// expression must resolve, and the object code and the listing are
// produced.  All of the state for one assembly lives in the `Assembler'
// value, so several assemblies can run in one process.

use log::info;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path;
use std::rc::Rc;

mod expr;
mod instr;
mod macros;
mod opcodes;
mod output;
mod pseudo;
mod symtab;

pub use crate::output::ErrCode;
use crate::macros::{Expansion, MacDef};
use crate::opcodes::{Handler, OpEntry};
use crate::output::{Listing, ObjImage};
use crate::symtab::{SymKind, SymTab};

// Nesting bounds:
pub(crate) const MACNEST: usize = 16;   // macro expansion nesting
pub(crate) const IFNEST:  usize = 8;    // IF nesting

// Comment and string characters:
pub(crate) const COMMENT: char = ';';
pub(crate) const LINCOM:  char = '*';
pub(crate) const STRDEL:  char = '\'';
pub(crate) const STRDEL2: char = '"';

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ObjFormat {
    IntelHex,
    MotorolaSrec,
    Binary,
    Carray,
}

// Everything the command line can configure:
pub struct Config {
    pub list:          bool,                    // -l
    pub list_file:     Option<path::PathBuf>,   // -L
    pub obj_file:      Option<path::PathBuf>,   // -o
    pub obj_fmt:       ObjFormat,               // -f
    pub sym_dump:      bool,                    // -s
    pub upcase:        bool,                    // -U
    pub nofill:        bool,                    // -x
    pub undoc:         bool,                    // -u
    pub i8080:         bool,                    // -8
    pub nodate:        bool,                    // -T
    pub mac_list:      bool,                    // -m
    pub verbose:       bool,                    // -v
    pub defines:       Vec<(String, Option<String>)>,   // -D
    pub include_dirs:  Vec<path::PathBuf>,      // -I
    pub symlen:        usize,                   // -n
    pub hexlen:        usize,                   // -n as well
    pub carylen:       usize,                   // -n as well
    pub ppl:           usize,                   // listing page length
}

impl Default for Config {
    fn default() -> Config {
        Config {
            list:          false,
            list_file:     None,
            obj_file:      None,
            obj_fmt:       ObjFormat::IntelHex,
            sym_dump:      false,
            upcase:        false,
            nofill:        false,
            undoc:         false,
            i8080:         false,
            nodate:        false,
            mac_list:      false,
            verbose:       false,
            defines:       Vec::new(),
            include_dirs:  Vec::new(),
            symlen:        8,
            hexlen:        32,
            carylen:       12,
            ppl:           65,
        }
    }
}

// Unrecoverable conditions; these abort the assembly with exit code 2.
#[derive(Debug)]
pub enum Fatal {
    FileOpen(path::PathBuf, io::Error),
    FileWrite(path::PathBuf, io::Error),
    Internal(&'static str),
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Fatal::FileOpen(file, err) => {
                write!(f, "can't open file `{}': {}", file.display(), err)
            },
            Fatal::FileWrite(file, err) => {
                write!(f, "can't write file `{}': {}", file.display(), err)
            },
            Fatal::Internal(what) => {
                write!(f, "internal error: {}", what)
            },
        }
    }
}

impl std::error::Error for Fatal {}

// What the address column of the listing shows for the current line:
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) enum ListAddr {
    None,
    Value(u16),
}

pub struct Assembler {
    pub(crate) cfg:       Config,
    pub(crate) pass:      i32,
    pub(crate) radix:     u32,
    pub(crate) pc:        u16,     // logical program counter
    pub(crate) rpc:       u16,     // physical program counter
    pub(crate) phs_flag:  bool,    // inside a .PHASE block
    pub(crate) gencode:   i32,     // +pass: emitting, -pass: suppressed
    pub(crate) iflevel:   usize,
    pub(crate) condnest:  [i32; IFNEST],
    pub(crate) errors:    usize,
    pub(crate) errnum:    Option<ErrCode>,  // first diagnostic on this line

    pub(crate) symtab:    SymTab,

    // Macro engine state:
    pub(crate) mac_table:     HashMap<String, Rc<MacDef>>,
    pub(crate) mac_def:       Option<MacDef>,
    pub(crate) mac_def_nest:  usize,
    pub(crate) mac_expn:      Vec<Expansion>,
    pub(crate) mac_loc_cnt:   u32,

    // The pieces of the line being processed:
    pub(crate) label:    String,
    pub(crate) opcode:   String,
    pub(crate) operand:  String,
    pub(crate) ops:      Vec<u8>,
    pub(crate) a_mode:   ListAddr,

    pub(crate) srcfn:    String,
    pub(crate) c_line:   usize,
    pub(crate) end_seen: bool,

    pub(crate) title:    String,
    pub(crate) subttl:   String,

    pub(crate) lst:      Listing,
    pub(crate) obj:      ObjImage,
}

impl Assembler {
    pub fn new(cfg: Config) -> Assembler {
        let ppl = cfg.ppl;
        let symlen = cfg.symlen;

        Assembler {
            cfg:           cfg,
            pass:          0,
            radix:         10,
            pc:            0,
            rpc:           0,
            phs_flag:      false,
            gencode:       1,
            iflevel:       0,
            condnest:      [0; IFNEST],
            errors:        0,
            errnum:        None,

            symtab:        SymTab::new(symlen),

            mac_table:     HashMap::new(),
            mac_def:       None,
            mac_def_nest:  0,
            mac_expn:      Vec::new(),
            mac_loc_cnt:   0,

            label:         String::new(),
            opcode:        String::new(),
            operand:       String::new(),
            ops:           Vec::new(),
            a_mode:        ListAddr::None,

            srcfn:         String::new(),
            c_line:        0,
            end_seen:      false,

            title:         String::new(),
            subttl:        String::new(),

            lst:           Listing::new(ppl),
            obj:           ObjImage::new(),
        }
    }

    // Assemble the given source files.  Returns the number of recoverable
    // diagnostics; a fatal condition aborts with Err.
    pub fn assemble(&mut self, files: &[path::PathBuf]) -> Result<usize, Fatal> {
        for pass in 1..=2 {
            self.start_pass(pass);
            for file in files {
                if self.end_seen {
                    break;
                }
                self.process_file(file)?;
            }
            self.finish_pass();
        }

        if self.errors == 0 {
            self.write_object(files)?;
        }
        self.write_listing(files)?;

        if self.cfg.verbose {
            info!("{} error(s)", self.errors);
        }
        Ok(self.errors)
    }

    fn start_pass(&mut self, pass: i32) {
        self.pass      = pass;
        self.radix     = 10;
        self.pc        = 0;
        self.rpc       = 0;
        self.phs_flag  = false;
        self.gencode   = pass;
        self.iflevel   = 0;
        self.end_seen  = false;
        self.c_line    = 0;

        self.mac_table.clear();
        self.mac_def       = None;
        self.mac_def_nest  = 0;
        self.mac_expn.clear();
        self.mac_loc_cnt   = 0;

        // Command-line definitions behave like EQUs at the head of the
        // first source file:
        let defines = self.cfg.defines.clone();
        for (name, value) in defines {
            let value = match value {
                Some(text) => { self.eval(&text) },
                None       => { 1 },
            };
            self.symtab.define(&name, value, SymKind::Equ, pass)
                .unwrap_or(());
        }

        if self.cfg.verbose {
            info!("Pass {}", pass);
        }
    }

    fn finish_pass(&mut self) {
        if self.iflevel != 0 {
            self.asmerr(ErrCode::MisEif);
            self.iflevel = 0;
        }
    }

    // Read one source file and process it line by line, interleaving the
    // lines coming out of active macro expansions.
    fn process_file(&mut self, file: &path::Path) -> Result<(), Fatal> {
        let text = fs::read_to_string(file)
            .map_err(|err| Fatal::FileOpen(file.to_owned(), err))?;

        let saved_srcfn  = std::mem::replace(&mut self.srcfn,
                                             file.display().to_string());
        let saved_c_line = std::mem::replace(&mut self.c_line, 0);

        if self.cfg.verbose {
            info!("Assembling `{}'", self.srcfn);
        }

        for line in text.lines() {
            self.c_line += 1;
            self.process_line(line, false)?;

            // Drain any macro expansion the line has started.  A None
            // from mac_expand() means one frame ended; an enclosing
            // expansion may still have lines left.
            while !self.mac_expn.is_empty() && !self.end_seen {
                if let Some(expanded) = self.mac_expand() {
                    self.process_line(&expanded, true)?;
                }
            }
            if self.end_seen {
                break;
            }
        }

        self.srcfn  = saved_srcfn;
        self.c_line = saved_c_line;
        Ok(())
    }

    // Process a single line of source (or of macro expansion output).
    fn process_line(&mut self, line: &str, expanded: bool) -> Result<(), Fatal> {
        self.errnum  = None;
        self.a_mode  = ListAddr::None;
        self.ops.clear();

        // A line whose first column is `*' or `;' is a pure comment:
        let first = line.chars().next();
        if first == Some(LINCOM) || first == Some(COMMENT) {
            self.list_line(line, expanded);
            return Ok(());
        }

        self.split_line(line);

        // While a macro is being defined, lines are captured, not
        // executed; the matching ENDM ends the capture.
        if self.mac_def.is_some() {
            self.mac_capture_line(line);
            self.list_line(line, expanded);
            return Ok(());
        }

        if self.opcode.is_empty() {
            if !self.label.is_empty() && self.gencode > 0 {
                self.define_label();
                self.a_mode = ListAddr::Value(self.pc);
            }
            self.list_line(line, expanded);
            return Ok(());
        }

        let opcode = self.opcode.clone();
        let entry = opcodes::lookup(&opcode);

        // Suppressed conditional code: only the conditional pseudo-ops
        // are still interpreted, everything else is skipped.
        if self.gencode < 0 {
            let is_cond = match entry {
                Some(ref op) => { (op.flags & opcodes::OP_COND) != 0 },
                None         => { false },
            };
            if !is_cond {
                self.list_line(line, expanded);
                return Ok(());
            }
        }

        match entry {
            Some(op) => {
                if (op.flags & opcodes::OP_UNDOC) != 0 && !self.cfg.undoc {
                    self.asmerr(ErrCode::IllOpc);
                    self.list_line(line, expanded);
                    return Ok(());
                }
                if (op.flags & opcodes::OP_Z80) != 0 && self.cfg.i8080 {
                    self.asmerr(ErrCode::Ni8080);
                    self.list_line(line, expanded);
                    return Ok(());
                }
                if !self.label.is_empty() && (op.flags & opcodes::OP_SET) == 0
                    && self.gencode > 0 {
                    self.define_label();
                }

                // An INCLUDE splices a whole file in; list its own line
                // before the included ones appear.
                if op.handler == Handler::Include {
                    self.list_line(line, expanded);
                    self.dispatch(&op)?;
                    return Ok(());
                }
                let len = self.dispatch(&op)?;

                if self.gencode > 0 && len > 0 {
                    if self.a_mode == ListAddr::None {
                        self.a_mode = ListAddr::Value(self.rpc);
                    }
                    if self.pass == 2 {
                        while self.ops.len() < len as usize {
                            self.ops.push(0);
                        }
                        self.ops.truncate(len as usize);
                        let bytes: Vec<u8> = self.ops.clone();
                        self.obj.emit(self.rpc, &bytes);
                    }
                    self.pc  = self.pc.wrapping_add(len);
                    self.rpc = self.rpc.wrapping_add(len);
                }
            },
            None => {
                // Not a machine instruction or pseudo-op; it may be an
                // invocation of a user macro.
                if self.mac_lookup(&opcode) {
                    if !self.label.is_empty() && self.gencode > 0 {
                        self.define_label();
                    }
                    self.mac_call(&opcode);
                } else {
                    self.asmerr(ErrCode::IllOpc);
                }
            },
        }

        self.list_line(line, expanded);
        Ok(())
    }

    // Hand the line to the handler the opcode table names.  Returns the
    // number of object bytes the line stands for.
    fn dispatch(&mut self, op: &OpEntry) -> Result<u16, Fatal> {
        let len = match op.handler {
            Handler::OneByte  => self.op_1b(op.b1),
            Handler::TwoByte  => self.op_2b(op.b1, op.b2),
            Handler::Im       => self.op_im(op.b1, op.b2),
            Handler::PuPo     => self.op_pupo(op.b1),
            Handler::Ex       => self.op_ex(),
            Handler::Rst      => self.op_rst(op.b1),
            Handler::Ret      => self.op_ret(op.b1, op.b2),
            Handler::JpCall   => self.op_jpcall(op.b1, op.b2),
            Handler::Jr       => self.op_jr(op.b1, op.b2),
            Handler::Djnz     => self.op_djnz(op.b1),
            Handler::Ld       => self.op_ld(),
            Handler::Add      => self.op_add(op.b1, op.b2),
            Handler::SbAdc    => self.op_sbadc(op.b1, op.b2),
            Handler::DecInc   => self.op_decinc(op.b1, op.b2),
            Handler::Alu      => self.op_alu(op.b1, op.b2),
            Handler::Out      => self.op_out(),
            Handler::In       => self.op_in(),
            Handler::CbGrp    => self.op_cbgrp(op.b1),

            Handler::Org      => self.op_org(),
            Handler::Equ      => self.op_equ(),
            Handler::Set      => self.op_set(),
            Handler::Db       => self.op_db(),
            Handler::Dw       => self.op_dw(),
            Handler::Ds       => self.op_ds(),
            Handler::End      => self.op_end(),
            Handler::Include  => return self.op_include().map(|_| 0),
            Handler::Title    => self.op_title(),
            Handler::Subttl   => self.op_subttl(),
            Handler::Page     => self.op_page(),
            Handler::Radix    => self.op_radix(),
            Handler::Phase    => self.op_phase(),
            Handler::Dephase  => self.op_dephase(),
            Handler::Aseg     => self.op_aseg(),
            Handler::Public   => self.op_public(),
            Handler::Extrn    => self.op_extrn(),

            Handler::CondIf   => self.op_if(op.b1),
            Handler::CondElse => self.op_else(),
            Handler::CondEndif => self.op_endif(),
            Handler::McondB   => self.op_mcond(op.b1),

            Handler::MacroDef => self.op_macro(),
            Handler::Endm     => self.op_endm(),
            Handler::Exitm    => self.op_exitm(),
            Handler::Local    => self.op_local(),
            Handler::Irp      => self.op_irp(),
            Handler::Irpc     => self.op_irpc(),
            Handler::Rept     => self.op_rept(),
        };
        Ok(len)
    }

    // Symbol names keep their case unless -U was given:
    pub(crate) fn sym_name(&self, name: &str) -> String {
        if self.cfg.upcase {
            name.to_uppercase()
        } else {
            name.to_owned()
        }
    }

    // Define the line's label as a program-counter label:
    fn define_label(&mut self) {
        let name = self.label.trim_end_matches(':').to_owned();
        let public = self.label.ends_with("::");
        let value = self.pc;
        let pass = self.pass;

        match self.symtab.define(&name, value, SymKind::Label, pass) {
            Ok(()) => {
                if public {
                    self.symtab.make_public(&name);
                }
            },
            Err(code) => {
                self.asmerr(code);
            },
        }
    }

    // Break a source line into label, opcode and operand.  The comment is
    // stripped, except that `;' inside a string literal is data.
    pub(crate) fn split_line(&mut self, line: &str) {
        self.label.clear();
        self.opcode.clear();
        self.operand.clear();

        let stripped = strip_comment(line);
        let mut chars = stripped.chars().peekable();

        // A label starts in column one:
        if let Some(&first) = chars.peek() {
            if is_first_sym_char(first) {
                while let Some(&ch) = chars.peek() {
                    if is_sym_char(ch) {
                        self.label.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // The trailing colons are kept so define_label() can
                // see the `::' public marker:
                while chars.peek() == Some(&':') {
                    self.label.push(':');
                    chars.next();
                }
                if self.cfg.upcase {
                    self.label = self.label.to_uppercase();
                }
            }
        }

        // The opcode:
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() {
                chars.next();
            } else {
                break;
            }
        }
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            self.opcode.push(ch.to_ascii_uppercase());
            chars.next();
        }

        // The operand is the rest, trimmed:
        let rest: String = chars.collect();
        self.operand = rest.trim().to_owned();
    }
}

// Cut a trailing comment off a line, honoring string literals:
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut in_string: Option<char> = None;

    for (index, ch) in line.char_indices() {
        match in_string {
            Some(delim) => {
                if ch == delim {
                    in_string = None;
                }
            },
            None => {
                if ch == STRDEL || ch == STRDEL2 {
                    in_string = Some(ch);
                } else if ch == COMMENT {
                    return &line[..index];
                }
            },
        }
    }
    line
}

// Symbol syntax: a letter or one of `$._?@' starts a symbol, digits may
// follow.
pub(crate) fn is_first_sym_char(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '$' || ch == '.' || ch == '_' || ch == '?' || ch == '@'
}

pub(crate) fn is_sym_char(ch: char) -> bool {
    is_first_sym_char(ch) || ch.is_ascii_digit()
}

// Split off the next comma-separated argument, honoring strings and
// bracketed `<...>' groups.  Returns the argument and the rest.
pub(crate) fn next_arg(text: &str) -> (&str, Option<&str>) {
    let mut in_string: Option<char> = None;
    let mut brackets = 0;

    for (index, ch) in text.char_indices() {
        match in_string {
            Some(delim) => {
                if ch == delim {
                    in_string = None;
                }
            },
            None => {
                match ch {
                    STRDEL | STRDEL2 => { in_string = Some(ch) },
                    '<' => { brackets += 1 },
                    '>' => { brackets -= 1 },
                    ',' if brackets == 0 => {
                        return (text[..index].trim(), Some(&text[index + 1..]));
                    },
                    _ => {},
                }
            },
        }
    }
    (text.trim(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_stripped_outside_strings() {
        assert_eq!(strip_comment("ld a,1 ; load"), "ld a,1 ");
        assert_eq!(strip_comment("db 'a;b' ; tail"), "db 'a;b' ");
        assert_eq!(strip_comment("nothing here"), "nothing here");
    }

    #[test]
    fn lines_split_into_label_opcode_operand() {
        let mut asm = Assembler::new(Config::default());

        asm.split_line("start:  ld   a,0x10  ; boot");
        assert_eq!(asm.label, "start:");
        assert_eq!(asm.opcode, "LD");
        assert_eq!(asm.operand, "a,0x10");

        asm.split_line("        ret");
        assert_eq!(asm.label, "");
        assert_eq!(asm.opcode, "RET");
        assert_eq!(asm.operand, "");
    }

    #[test]
    fn arguments_split_on_top_level_commas_only() {
        assert_eq!(next_arg("1,2"), ("1", Some("2")));
        assert_eq!(next_arg("<a,b>,c"), ("<a,b>", Some("c")));
        assert_eq!(next_arg("'a,b',c"), ("'a,b'", Some("c")));
        assert_eq!(next_arg("lone"), ("lone", None));
    }
}
