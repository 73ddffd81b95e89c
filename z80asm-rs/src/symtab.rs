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

// The symbol table.  Symbol names are significant up to a configured
// number of characters; anything longer is silently truncated, but the
// longest name actually seen is remembered so that the listing columns
// can be sized.

use std::collections::HashMap;

use crate::output::ErrCode;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum SymKind {
    Label,
    Equ,
    Set,
    Extern,
}

#[derive(Clone, Debug)]
pub(crate) struct Symbol {
    pub name:       String,   // the truncated, stored name
    pub val:        u16,
    pub kind:       SymKind,
    pub referenced: bool,
    pub public:     bool,
    pub def_pass:   i32,
}

pub(crate) struct SymTab {
    symbols: HashMap<String, Symbol>,
    symlen:  usize,
    symmax:  usize,   // longest (truncated) name seen, for the listing
}

impl SymTab {
    pub fn new(symlen: usize) -> SymTab {
        SymTab {
            symbols: HashMap::new(),
            symlen:  symlen,
            symmax:  0,
        }
    }

    fn key_of(&self, name: &str) -> String {
        let mut key = name.to_owned();
        key.truncate(self.symlen);
        key
    }

    // Define or redefine a symbol.  A plain redefinition within one pass
    // is an error, except for SET symbols, which exist to be reassigned;
    // in the second pass every symbol gets defined again and the new
    // value simply replaces the one from pass 1.
    pub fn define(&mut self, name: &str, val: u16, kind: SymKind, pass: i32)
                  -> Result<(), ErrCode> {
        let key = self.key_of(name);
        if key.len() > self.symmax {
            self.symmax = key.len();
        }

        match self.symbols.get_mut(&key) {
            Some(sym) => {
                if sym.def_pass == pass && sym.kind != SymKind::Set {
                    return Err(ErrCode::MulSym);
                }
                if sym.kind != SymKind::Set && kind == SymKind::Set {
                    // A label can't be turned into a variable:
                    return Err(ErrCode::MulSym);
                }
                sym.val = val;
                sym.kind = kind;
                sym.def_pass = pass;
                Ok(())
            },
            None => {
                self.symbols.insert(key.clone(), Symbol {
                    name:       key,
                    val:        val,
                    kind:       kind,
                    referenced: false,
                    public:     false,
                    def_pass:   pass,
                });
                Ok(())
            },
        }
    }

    // Look a symbol up for an expression; marks it as referenced.
    pub fn reference(&mut self, name: &str) -> Option<u16> {
        let key = self.key_of(name);
        match self.symbols.get_mut(&key) {
            Some(sym) => {
                sym.referenced = true;
                Some(sym.val)
            },
            None => { None },
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.symbols.contains_key(&self.key_of(name))
    }

    pub fn make_public(&mut self, name: &str) {
        let key = self.key_of(name);
        if let Some(sym) = self.symbols.get_mut(&key) {
            sym.public = true;
        }
    }

    pub fn symmax(&self) -> usize {
        self.symmax
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    // The table sorted by name, for the symbol dump:
    pub fn sorted_by_name(&self) -> Vec<&Symbol> {
        let mut list: Vec<&Symbol> = self.symbols.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    // The table sorted by value, for the cross-reference:
    pub fn sorted_by_value(&self) -> Vec<&Symbol> {
        let mut list: Vec<&Symbol> = self.symbols.values().collect();
        list.sort_by(|a, b| a.val.cmp(&b.val).then(a.name.cmp(&b.name)));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_names_truncate_to_the_significant_length() {
        let mut tab = SymTab::new(8);

        tab.define("longname", 1, SymKind::Label, 1).unwrap();
        // One character longer, same first eight characters: the same
        // symbol, so redefining it is an error.
        let clash = tab.define("longnamex", 2, SymKind::Label, 1);
        assert_eq!(clash, Err(ErrCode::MulSym));

        assert_eq!(tab.reference("longname"), Some(1));
        assert_eq!(tab.reference("longnamex"), Some(1));
    }

    #[test]
    fn set_symbols_may_be_reassigned() {
        let mut tab = SymTab::new(8);

        tab.define("count", 1, SymKind::Set, 1).unwrap();
        tab.define("count", 2, SymKind::Set, 1).unwrap();
        assert_eq!(tab.reference("count"), Some(2));

        tab.define("fixed", 1, SymKind::Equ, 1).unwrap();
        assert_eq!(tab.define("fixed", 2, SymKind::Equ, 1), Err(ErrCode::MulSym));
    }

    #[test]
    fn pass_two_redefinition_is_not_an_error() {
        let mut tab = SymTab::new(8);

        tab.define("start", 0x100, SymKind::Label, 1).unwrap();
        tab.define("start", 0x100, SymKind::Label, 2).unwrap();
        assert_eq!(tab.reference("start"), Some(0x100));
    }
}
