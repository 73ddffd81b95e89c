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

// Diagnostics, the listing, and the object file writers: Intel HEX,
// Motorola S-records, flat binary, and a C array.

use chrono::Local;

use std::fmt::Write as _;
use std::fs;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path;

use crate::{Assembler, Fatal, ListAddr, ObjFormat};

const RELEASE: &str = "0.2.0";

// Bytes shown beside the source on one listing line; longer emissions
// get continuation lines.
const LIST_BYTES: usize = 4;

// Recoverable diagnostics.  The letter is what marks the affected line
// in the listing.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrCode {
    IllOpc,
    IllOpe,
    MisOpe,
    ValOut,
    MisDel,
    MisPar,
    MulSym,
    UndSym,
    MacNest,
    IfNest,
    MisIff,
    MisEif,
    NimExp,
    OutLcl,
    Ni8080,
}

impl ErrCode {
    pub fn letter(&self) -> char {
        match *self {
            ErrCode::IllOpc  => { 'O' },
            ErrCode::IllOpe  => { 'I' },
            ErrCode::MisOpe  => { 'M' },
            ErrCode::ValOut  => { 'V' },
            ErrCode::MisDel  => { 'D' },
            ErrCode::MisPar  => { 'P' },
            ErrCode::MulSym  => { 'S' },
            ErrCode::UndSym  => { 'U' },
            ErrCode::MacNest => { 'R' },
            ErrCode::IfNest  => { 'F' },
            ErrCode::MisIff  => { 'B' },
            ErrCode::MisEif  => { 'E' },
            ErrCode::NimExp  => { 'X' },
            ErrCode::OutLcl  => { 'L' },
            ErrCode::Ni8080  => { 'H' },
        }
    }

    pub fn message(&self) -> &'static str {
        match *self {
            ErrCode::IllOpc  => { "illegal opcode" },
            ErrCode::IllOpe  => { "illegal operand" },
            ErrCode::MisOpe  => { "missing operand" },
            ErrCode::ValOut  => { "value out of range" },
            ErrCode::MisDel  => { "missing string delimiter" },
            ErrCode::MisPar  => { "missing right parenthesis" },
            ErrCode::MulSym  => { "multiple defined symbol" },
            ErrCode::UndSym  => { "undefined symbol" },
            ErrCode::MacNest => { "macro expansion nested too deep" },
            ErrCode::IfNest  => { "IF nested too deep" },
            ErrCode::MisIff  => { "missing IF" },
            ErrCode::MisEif  => { "missing ENDIF" },
            ErrCode::NimExp  => { "not in macro expansion" },
            ErrCode::OutLcl  => { "out of local labels" },
            ErrCode::Ni8080  => { "not an 8080 instruction" },
        }
    }
}

// Listing state: the text is accumulated during pass 2 and written out
// at the end, with the symbol table appended.
pub(crate) struct Listing {
    pub text:        String,
    pub p_line:      usize,
    pub ppl:         usize,
    pub page:        usize,
    pub break_next:  bool,
}

impl Listing {
    pub fn new(ppl: usize) -> Listing {
        Listing {
            text:       String::new(),
            p_line:     0,
            ppl:        ppl,
            page:       0,
            break_next: false,
        }
    }

    pub fn set_page_length(&mut self, ppl: usize) {
        self.ppl = ppl;
    }

    pub fn request_page_break(&mut self) {
        self.break_next = true;
    }
}

// The object code of one assembly, as runs of contiguous bytes.  DEFS
// and ORG leave gaps between the runs.
pub(crate) struct ObjImage {
    pub chunks: Vec<(u16, Vec<u8>)>,
}

impl ObjImage {
    pub fn new() -> ObjImage {
        ObjImage { chunks: Vec::new() }
    }

    pub fn emit(&mut self, addr: u16, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(&mut (start, ref mut data)) = self.chunks.last_mut() {
            if (start as usize) + data.len() == addr as usize {
                data.extend_from_slice(bytes);
                return;
            }
        }
        self.chunks.push((addr, bytes.to_vec()));
    }

    fn sorted(&self) -> Vec<(u16, &[u8])> {
        let mut list: Vec<(u16, &[u8])> = self.chunks.iter()
            .map(|&(addr, ref data)| (addr, data.as_slice()))
            .collect();
        list.sort_by_key(|&(addr, _)| addr);
        list
    }
}

impl Assembler {
    // Report a diagnostic against the current line.  Everything happens
    // twice, once per pass, so only pass 2 counts and reports; the first
    // code on a line is what the listing shows.
    pub(crate) fn asmerr(&mut self, code: ErrCode) {
        if self.pass != 2 {
            return;
        }
        self.errors += 1;
        if self.errnum.is_none() {
            self.errnum = Some(code);
        }
        eprintln!("Error in file: {}, line {}: {}",
                  self.srcfn, self.c_line, code.message());
    }

    fn listing_enabled(&self) -> bool {
        self.cfg.list || self.cfg.list_file.is_some()
    }

    // Append the listing lines for the source line just processed:
    pub(crate) fn list_line(&mut self, source: &str, expanded: bool) {
        if self.pass != 2 || !self.listing_enabled() {
            return;
        }
        if expanded && !self.cfg.mac_list {
            return;
        }

        let err_ch = match self.errnum {
            Some(code) => { code.letter() },
            None       => { ' ' },
        };
        let addr = match self.a_mode {
            ListAddr::Value(value) => { Some(value) },
            ListAddr::None         => { None },
        };

        let bytes = self.ops.clone();
        let first_chunk: &[u8] = if bytes.len() > LIST_BYTES {
            &bytes[..LIST_BYTES]
        } else {
            &bytes
        };

        let header = format!("{}{:5}  {}  {}  {}",
                             err_ch, self.c_line,
                             format_addr(addr),
                             format_bytes(first_chunk),
                             source);
        self.put_lst_line(&header);

        // Continuation lines for emissions wider than the byte column:
        let mut offset = LIST_BYTES;
        while offset < bytes.len() {
            let end = (offset + LIST_BYTES).min(bytes.len());
            let addr = addr.map(|base| base.wrapping_add(offset as u16));
            let cont = format!("{:6}  {}  {}",
                               "",
                               format_addr(addr),
                               format_bytes(&bytes[offset..end]));
            self.put_lst_line(&cont);
            offset = end;
        }
    }

    fn put_lst_line(&mut self, line: &str) {
        if self.lst.p_line == 0 || self.lst.p_line >= self.lst.ppl
            || self.lst.break_next {
            self.lst_header();
        }
        self.lst.text.push_str(line.trim_end());
        self.lst.text.push('\n');
        self.lst.p_line += 1;
    }

    fn lst_header(&mut self) {
        self.lst.break_next = false;
        self.lst.page += 1;
        if self.lst.page > 1 {
            self.lst.text.push('\x0C');
        }

        let date = if self.cfg.nodate {
            String::new()
        } else {
            Local::now().format("%d-%b-%Y %H:%M").to_string()
        };
        let _ = writeln!(self.lst.text,
                         "Z80/8080-Macro-Assembler  Release {}\t{}\tPage {}",
                         RELEASE, date, self.lst.page);
        let _ = writeln!(self.lst.text, "Source file: {}", self.srcfn);
        let _ = writeln!(self.lst.text, "Title:       {}", self.title);
        if !self.subttl.is_empty() {
            let _ = writeln!(self.lst.text, "             {}", self.subttl);
            self.lst.p_line = 5;
        } else {
            self.lst.p_line = 4;
        }
        self.lst.text.push('\n');
    }

    // Write the listing file, with the symbol table and the value-sorted
    // cross-reference appended when -s was given.
    pub(crate) fn write_listing(&mut self, files: &[path::PathBuf]) -> Result<(), Fatal> {
        if !self.listing_enabled() {
            return Ok(());
        }
        let path = match self.cfg.list_file.clone() {
            Some(path) => { path },
            None => {
                let mut path = files.first().cloned().unwrap_or_default();
                path.set_extension("lis");
                path
            },
        };

        let mut text = std::mem::replace(&mut self.lst.text, String::new());

        if self.cfg.sym_dump && self.symtab.len() > 0 {
            let width = self.symtab.symmax().max(6);

            text.push_str("\nSymbol table:\n\n");
            let mut column = 0;
            for sym in self.symtab.sorted_by_name() {
                let marker = if sym.referenced { ' ' } else { '*' };
                let _ = write!(text, "{:width$} {:04X}{}   ",
                               sym.name, sym.val, marker, width = width);
                column += 1;
                if column == 4 {
                    text.push('\n');
                    column = 0;
                }
            }
            if column != 0 {
                text.push('\n');
            }

            text.push_str("\nSymbol table by value:\n\n");
            let mut column = 0;
            for sym in self.symtab.sorted_by_value() {
                let _ = write!(text, "{:04X} {:width$}   ",
                               sym.val, sym.name, width = width);
                column += 1;
                if column == 4 {
                    text.push('\n');
                    column = 0;
                }
            }
            if column != 0 {
                text.push('\n');
            }
        }

        fs::write(&path, text)
            .map_err(|err| Fatal::FileWrite(path.clone(), err))?;
        Ok(())
    }

    // Write the object file in the configured format:
    pub(crate) fn write_object(&mut self, files: &[path::PathBuf]) -> Result<(), Fatal> {
        let path = match self.cfg.obj_file.clone() {
            Some(path) => { path },
            None => {
                let mut path = files.first().cloned().unwrap_or_default();
                path.set_extension(match self.cfg.obj_fmt {
                    ObjFormat::IntelHex     => { "hex" },
                    ObjFormat::MotorolaSrec => { "s19" },
                    ObjFormat::Binary       => { "bin" },
                    ObjFormat::Carray       => { "c" },
                });
                path
            },
        };

        match self.cfg.obj_fmt {
            ObjFormat::IntelHex     => { self.write_hex(&path) },
            ObjFormat::MotorolaSrec => { self.write_srec(&path) },
            ObjFormat::Binary       => { self.write_binary(&path) },
            ObjFormat::Carray       => { self.write_carray(&path) },
        }
    }

    fn write_hex(&self, path: &path::Path) -> Result<(), Fatal> {
        let mut text = String::new();

        for (addr, data) in self.obj.sorted() {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + self.cfg.hexlen).min(data.len());
                let record = &data[offset..end];
                let rec_addr = addr.wrapping_add(offset as u16);

                let mut sum = record.len() as u8;
                sum = sum.wrapping_add((rec_addr >> 8) as u8);
                sum = sum.wrapping_add((rec_addr & 0xFF) as u8);

                let _ = write!(text, ":{:02X}{:04X}00", record.len(), rec_addr);
                for &byte in record {
                    let _ = write!(text, "{:02X}", byte);
                    sum = sum.wrapping_add(byte);
                }
                let _ = write!(text, "{:02X}\r\n", sum.wrapping_neg());

                offset = end;
            }
        }
        text.push_str(":00000001FF\r\n");

        fs::write(path, text)
            .map_err(|err| Fatal::FileWrite(path.to_owned(), err))
    }

    fn write_srec(&self, path: &path::Path) -> Result<(), Fatal> {
        let mut text = String::new();

        for (addr, data) in self.obj.sorted() {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + self.cfg.hexlen).min(data.len());
                let record = &data[offset..end];
                let rec_addr = addr.wrapping_add(offset as u16);
                let count = (record.len() + 3) as u8;

                let mut sum = count;
                sum = sum.wrapping_add((rec_addr >> 8) as u8);
                sum = sum.wrapping_add((rec_addr & 0xFF) as u8);

                let _ = write!(text, "S1{:02X}{:04X}", count, rec_addr);
                for &byte in record {
                    let _ = write!(text, "{:02X}", byte);
                    sum = sum.wrapping_add(byte);
                }
                let _ = write!(text, "{:02X}\n", 0xFFu8.wrapping_sub(sum));

                offset = end;
            }
        }
        text.push_str("S9030000FC\n");

        fs::write(path, text)
            .map_err(|err| Fatal::FileWrite(path.to_owned(), err))
    }

    // A flat binary.  Gaps between the runs are zero-filled, unless the
    // no-fill option asks for the file position to be advanced past them
    // instead (which leaves holes on filesystems that support them).
    fn write_binary(&self, path: &path::Path) -> Result<(), Fatal> {
        let mut file = fs::File::create(path)
            .map_err(|err| Fatal::FileWrite(path.to_owned(), err))?;

        let chunks = self.obj.sorted();
        let base = match chunks.first() {
            Some(&(addr, _)) => { addr },
            None             => { return Ok(()) },
        };

        if self.cfg.nofill {
            for (addr, data) in chunks {
                file.seek(SeekFrom::Start((addr - base) as u64))
                    .map_err(|err| Fatal::FileWrite(path.to_owned(), err))?;
                file.write_all(data)
                    .map_err(|err| Fatal::FileWrite(path.to_owned(), err))?;
            }
        } else {
            let mut position = base;
            for (addr, data) in chunks {
                if addr > position {
                    let fill = vec![0u8; (addr - position) as usize];
                    file.write_all(&fill)
                        .map_err(|err| Fatal::FileWrite(path.to_owned(), err))?;
                }
                file.write_all(data)
                    .map_err(|err| Fatal::FileWrite(path.to_owned(), err))?;
                position = addr.wrapping_add(data.len() as u16);
            }
        }
        Ok(())
    }

    fn write_carray(&self, path: &path::Path) -> Result<(), Fatal> {
        let name: String = path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "code".to_owned())
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();

        let mut image = Vec::new();
        let chunks = self.obj.sorted();
        if let Some(&(base, _)) = chunks.first() {
            for (addr, data) in &chunks {
                let offset = (addr - base) as usize;
                if image.len() < offset + data.len() {
                    image.resize(offset + data.len(), 0);
                }
                image[offset..offset + data.len()].copy_from_slice(data);
            }
        }

        let mut text = String::new();
        let _ = writeln!(text, "const unsigned char {}[] = {{", name);
        for row in image.chunks(self.cfg.carylen.max(1)) {
            text.push('\t');
            let mut first = true;
            for &byte in row {
                if !first {
                    text.push(',');
                }
                let _ = write!(text, "0x{:02x}", byte);
                first = false;
            }
            text.push_str(",\n");
        }
        let _ = writeln!(text, "}};");

        fs::write(path, text)
            .map_err(|err| Fatal::FileWrite(path.to_owned(), err))
    }
}

fn format_addr(addr: Option<u16>) -> String {
    match addr {
        Some(value) => { format!("{:04X}", value) },
        None        => { "    ".to_owned() },
    }
}

fn format_bytes(bytes: &[u8]) -> String {
    let mut field = String::new();
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            field.push(' ');
        }
        let _ = write!(field, "{:02X}", byte);
    }
    while field.len() < LIST_BYTES * 3 - 1 {
        field.push(' ');
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contiguous_emissions_merge_into_one_chunk() {
        let mut obj = ObjImage::new();
        obj.emit(0x0100, &[0x01, 0x02]);
        obj.emit(0x0102, &[0x03]);
        obj.emit(0x0200, &[0x04]);

        assert_eq!(obj.chunks.len(), 2);
        assert_eq!(obj.chunks[0], (0x0100, vec![0x01, 0x02, 0x03]));
        assert_eq!(obj.chunks[1], (0x0200, vec![0x04]));
    }

    #[test]
    fn error_letters_are_distinct() {
        let codes = [
            ErrCode::IllOpc, ErrCode::IllOpe, ErrCode::MisOpe, ErrCode::ValOut,
            ErrCode::MisDel, ErrCode::MisPar, ErrCode::MulSym, ErrCode::UndSym,
            ErrCode::MacNest, ErrCode::IfNest, ErrCode::MisIff, ErrCode::MisEif,
            ErrCode::NimExp, ErrCode::OutLcl, ErrCode::Ni8080,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a.letter(), b.letter());
            }
        }
    }
}
