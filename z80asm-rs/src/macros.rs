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

// The Intel-style macro engine: MACRO, IRP, IRPC and REPT, with LOCAL
// labels, bracketed and %-evaluated arguments, and the & concatenation
// sigil.
//
// A definition captures its body lines verbatim up to the matching ENDM,
// including the ENDM line itself; when the expansion later reaches that
// ENDM, the repeat logic decides whether to rewind for another iteration
// or to pop the expansion frame.  The four macro variants differ only in
// how an iteration binds the parameters, which is what the
// `MacroVariant' tag captures.

use std::rc::Rc;

use crate::opcodes;
use crate::output::ErrCode;
use crate::{is_first_sym_char, is_sym_char, next_arg, Assembler, ListAddr,
            COMMENT, IFNEST, LINCOM, MACNEST, STRDEL, STRDEL2};

#[derive(Clone, Debug)]
pub(crate) enum MacroVariant {
    Named,
    Irp { list: String },
    Irpc { chars: String },
    Rept { count: i32 },
}

#[derive(Debug)]
pub(crate) struct MacDef {
    pub name:    Option<String>,
    pub dummies: Vec<String>,
    pub lines:   Vec<String>,
    pub variant: MacroVariant,
}

// One entry of the expansion stack:
pub(crate) struct Expansion {
    pub mac:      Rc<MacDef>,
    pub parms:    Vec<(String, Option<String>)>,
    pub locs:     Vec<(String, String)>,
    pub line_idx: usize,
    pub iflevel:  usize,
    pub iter:     i32,
    pub irp_rest: String,
}

impl Assembler {
    // While a macro is being defined, every line is captured instead of
    // executed.  Nested definitions are tracked so that the body's own
    // ENDMs stay inside it; the outermost ENDM line is captured too,
    // because executing it at expansion time drives the iteration.
    pub(crate) fn mac_capture_line(&mut self, line: &str) {
        self.a_mode = ListAddr::None;

        if let Some(def) = self.mac_def.as_mut() {
            def.lines.push(line.to_owned());
        }

        if let Some(op) = opcodes::lookup(&self.opcode) {
            if (op.flags & opcodes::OP_MDEF) != 0 {
                self.mac_def_nest += 1;
            } else if (op.flags & opcodes::OP_MEND) != 0 {
                self.mac_def_nest -= 1;
                if self.mac_def_nest == 0 {
                    let def = match self.mac_def.take() {
                        Some(def) => { def },
                        None      => { return },
                    };
                    match def.name.clone() {
                        Some(name) => {
                            self.mac_table.insert(name, Rc::new(def));
                        },
                        None => {
                            // IRP, IRPC and REPT expand on the spot:
                            self.mac_start_expn(Rc::new(def));
                        },
                    }
                }
            }
        }
    }

    pub(crate) fn mac_lookup(&self, name: &str) -> bool {
        self.mac_table.contains_key(name)
    }

    pub(crate) fn mac_call(&mut self, name: &str) {
        match self.mac_table.get(name).cloned() {
            Some(mac) => {
                self.mac_start_expn(mac);
            },
            None => {
                self.asmerr(ErrCode::IllOpc);
            },
        }
    }

    // Open an expansion frame for a macro.  Hitting the nesting limit
    // abandons every active expansion and restores the IF nesting that
    // was in force before the outermost one started.
    pub(crate) fn mac_start_expn(&mut self, mac: Rc<MacDef>) {
        if self.mac_expn.len() == MACNEST {
            let outer_iflevel = self.mac_expn[0].iflevel;
            self.mac_expn.clear();
            self.iflevel = outer_iflevel;
            self.gencode = if outer_iflevel > 0 {
                self.condnest[outer_iflevel - 1]
            } else {
                self.pass
            };
            self.asmerr(ErrCode::MacNest);
            return;
        }
        if mac.lines.is_empty() {
            return;
        }

        let mut expn = Expansion {
            parms:    mac.dummies.iter().map(|name| (name.clone(), None)).collect(),
            locs:     Vec::new(),
            line_idx: 0,
            iflevel:  self.iflevel,
            iter:     0,
            irp_rest: String::new(),
            mac:      mac.clone(),
        };

        match mac.variant.clone() {
            MacroVariant::Named => {
                let operand = self.operand.clone();
                self.bind_call_parms(&mut expn, &operand);
            },
            MacroVariant::Irp { list } => {
                expn.irp_rest = list;
                if !expn.irp_rest.is_empty() {
                    if let Some((value, rest)) = self.mac_next_parm(&expn.irp_rest.clone()) {
                        expn.irp_rest = rest;
                        if let Some(parm) = expn.parms.first_mut() {
                            parm.1 = Some(value);
                        }
                    }
                }
            },
            MacroVariant::Irpc { chars } => {
                expn.irp_rest = chars;
                if !expn.irp_rest.is_empty() {
                    let first: String = expn.irp_rest.chars().take(1).collect();
                    expn.irp_rest = expn.irp_rest.chars().skip(1).collect();
                    if let Some(parm) = expn.parms.first_mut() {
                        parm.1 = Some(first);
                    }
                }
            },
            MacroVariant::Rept { count } => {
                if count <= 0 {
                    expn.line_idx = mac.lines.len();
                }
            },
        }
        self.mac_expn.push(expn);
    }

    // Assign the arguments of a macro call to the formal parameters, in
    // order:
    fn bind_call_parms(&mut self, expn: &mut Expansion, operand: &str) {
        let mut rest = operand.trim_start().to_owned();
        let mut index = 0;

        while index < expn.parms.len() && !rest.is_empty()
              && !rest.starts_with(COMMENT) {
            let (value, after) = match self.mac_next_parm(&rest) {
                Some(pair) => { pair },
                None       => { return },
            };
            expn.parms[index].1 = Some(value);
            index += 1;

            let after = after.trim_start().to_owned();
            if after.starts_with(',') {
                rest = after[1..].trim_start().to_owned();
            } else if !after.is_empty() && !after.starts_with(COMMENT) {
                self.asmerr(ErrCode::IllOpe);
                return;
            } else {
                break;
            }
        }
    }

    // Pop the innermost expansion frame and restore the conditional
    // nesting that was active when it started:
    pub(crate) fn mac_end_expn(&mut self) {
        if let Some(expn) = self.mac_expn.pop() {
            self.iflevel = expn.iflevel;
            self.gencode = if expn.iflevel > 0 {
                self.condnest[expn.iflevel - 1]
            } else {
                self.pass
            };
        }
    }

    // Called when an expansion reaches its ENDM: rebind the parameters
    // for the next iteration, or end the expansion.  Returns true when
    // another iteration runs.
    pub(crate) fn mac_rept_expn(&mut self) -> bool {
        let variant = match self.mac_expn.last() {
            Some(expn) => { expn.mac.variant.clone() },
            None       => { return false },
        };

        if let Some(expn) = self.mac_expn.last_mut() {
            expn.iter += 1;
        }

        let again = match variant {
            MacroVariant::Named => { false },
            MacroVariant::Rept { count } => {
                self.mac_expn.last().map(|e| e.iter < count).unwrap_or(false)
            },
            MacroVariant::Irp { .. } => { self.mac_rept_irp() },
            MacroVariant::Irpc { .. } => { self.mac_rept_irpc() },
        };

        if again {
            let saved_iflevel = self.mac_expn.last().map(|e| e.iflevel).unwrap_or(0);
            self.iflevel = saved_iflevel;
            self.gencode = if saved_iflevel > 0 {
                self.condnest[saved_iflevel - 1]
            } else {
                self.pass
            };
            if let Some(expn) = self.mac_expn.last_mut() {
                expn.locs.clear();
                expn.line_idx = 0;
            }
            true
        } else {
            self.mac_end_expn();
            false
        }
    }

    fn mac_rept_irp(&mut self) -> bool {
        let rest = match self.mac_expn.last() {
            Some(expn) => { expn.irp_rest.clone() },
            None       => { return false },
        };
        if rest.is_empty() {
            return false;
        }
        if !rest.starts_with(',') {
            self.asmerr(ErrCode::IllOpe);
            return false;
        }
        match self.mac_next_parm(rest[1..].trim_start()) {
            Some((value, after)) => {
                if let Some(expn) = self.mac_expn.last_mut() {
                    expn.irp_rest = after;
                    if let Some(parm) = expn.parms.first_mut() {
                        parm.1 = Some(value);
                    }
                }
                true
            },
            None => { false },
        }
    }

    fn mac_rept_irpc(&mut self) -> bool {
        if let Some(expn) = self.mac_expn.last_mut() {
            if !expn.irp_rest.is_empty() {
                let first: String = expn.irp_rest.chars().take(1).collect();
                expn.irp_rest = expn.irp_rest.chars().skip(1).collect();
                if let Some(parm) = expn.parms.first_mut() {
                    parm.1 = Some(first);
                }
                return true;
            }
        }
        false
    }

    // Produce the next line of the active expansion, with the dummies
    // and the local labels substituted.  Returns None when the innermost
    // frame has ended (an outer frame may still be active).
    pub(crate) fn mac_expand(&mut self) -> Option<String> {
        let needs_rewind = {
            let expn = self.mac_expn.last()?;
            expn.line_idx >= expn.mac.lines.len()
        };
        if needs_rewind && !self.mac_rept_expn() {
            return None;
        }
        let line = {
            let expn = self.mac_expn.last()?;
            expn.mac.lines[expn.line_idx].clone()
        };
        let substituted = self.mac_subst(&line);
        if let Some(expn) = self.mac_expn.last_mut() {
            expn.line_idx += 1;
        }
        Some(substituted)
    }

    // The value of a dummy or local in the innermost frame:
    fn dumloc_value(&self, name: &str) -> Option<String> {
        let expn = self.mac_expn.last()?;
        for (parm, value) in &expn.parms {
            if parm == name {
                return Some(value.clone().unwrap_or_default());
            }
        }
        for (loc, value) in &expn.locs {
            if loc == name {
                return Some(value.clone());
            }
        }
        None
    }

    // Substitute dummies and locals into one body line.  Everything
    // outside string literals is upper-cased; inside a string,
    // substitution happens only next to a `&'.  `^' passes the next
    // character through untouched, and `;;' comments vanish from the
    // expansion.
    fn mac_subst(&mut self, line: &str) -> String {
        if line.starts_with(LINCOM) {
            return line.to_owned();
        }

        let chars: Vec<char> = line.chars().collect();
        let mut out = String::new();
        let mut pos = 0;
        let mut brackets: i32 = 0;

        while pos < chars.len() {
            let ch = chars[pos];

            if is_first_sym_char(ch) {
                let mut ident = String::new();
                while pos < chars.len() && is_sym_char(chars[pos]) {
                    ident.push(chars[pos].to_ascii_uppercase());
                    pos += 1;
                }
                if out.ends_with('^') {
                    out.push_str(&ident);
                    continue;
                }
                match self.dumloc_value(&ident) {
                    Some(value) => {
                        if out.ends_with('&') {
                            out.pop();
                        }
                        out.push_str(&value);
                        if chars.get(pos) == Some(&'&') {
                            pos += 1;
                        }
                    },
                    None => {
                        out.push_str(&ident);
                    },
                }
            } else if ch == STRDEL || ch == STRDEL2 {
                out.push(ch);
                pos += 1;
                let delim = ch;
                let mut amp_flag = false;
                loop {
                    match chars.get(pos) {
                        None => {
                            self.asmerr(ErrCode::MisDel);
                            return out;
                        },
                        Some(&c) if c == delim => {
                            amp_flag = false;
                            out.push(c);
                            pos += 1;
                            if chars.get(pos) == Some(&delim) {
                                out.push(delim);
                                pos += 1;
                            } else {
                                break;
                            }
                        },
                        Some(&c) if is_first_sym_char(c) => {
                            let mut ident = String::new();
                            let ident_start = pos;
                            while pos < chars.len() && is_sym_char(chars[pos]) {
                                ident.push(chars[pos].to_ascii_uppercase());
                                pos += 1;
                            }
                            let before_amp = out.ends_with('&');
                            let after_amp = chars.get(pos) == Some(&'&');
                            if before_amp || after_amp || amp_flag {
                                amp_flag = false;
                                match self.dumloc_value(&ident) {
                                    Some(value) => {
                                        if before_amp {
                                            out.pop();
                                        }
                                        out.push_str(&value);
                                        if after_amp {
                                            amp_flag = true;
                                            pos += 1;
                                        }
                                    },
                                    None => {
                                        for &orig in &chars[ident_start..pos] {
                                            out.push(orig);
                                        }
                                    },
                                }
                            } else {
                                for &orig in &chars[ident_start..pos] {
                                    out.push(orig);
                                }
                            }
                        },
                        Some(&c) => {
                            amp_flag = false;
                            out.push(c);
                            pos += 1;
                        },
                    }
                }
            } else if ch == '^' {
                out.push(ch);
                pos += 1;
                match chars.get(pos) {
                    Some(&next) => {
                        out.push(next.to_ascii_uppercase());
                        pos += 1;
                    },
                    None => {
                        self.asmerr(ErrCode::IllOpe);
                        return out;
                    },
                }
            } else if ch == '<' {
                brackets += 1;
                out.push(ch);
                pos += 1;
            } else if ch == '>' {
                brackets -= 1;
                out.push(ch);
                pos += 1;
            } else if brackets == 0 && ch == COMMENT {
                if chars.get(pos + 1) != Some(&COMMENT) {
                    while pos < chars.len() {
                        out.push(chars[pos]);
                        pos += 1;
                    }
                }
                break;
            } else {
                out.push(ch.to_ascii_uppercase());
                pos += 1;
            }
        }

        if brackets > 0 {
            self.asmerr(ErrCode::MisDel);
        }
        out
    }

    // Read the next macro argument: a quoted string (delimiters kept), a
    // `<...>' group (brackets dropped, `^' honored), a `%expr' (replaced
    // by its decimal value), or a plain blank/comma-delimited word.
    // Returns the argument and the remaining text.
    pub(crate) fn mac_next_parm(&mut self, text: &str) -> Option<(String, String)> {
        let chars: Vec<char> = text.chars().collect();
        let mut pos = 0;
        let mut value = String::new();

        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }

        match chars.get(pos) {
            Some(&delim) if delim == STRDEL || delim == STRDEL2 => {
                value.push(delim);
                pos += 1;
                loop {
                    match chars.get(pos) {
                        None => {
                            self.asmerr(ErrCode::MisDel);
                            return None;
                        },
                        Some(&c) if c == delim => {
                            if chars.get(pos + 1) == Some(&delim) {
                                value.push(delim);
                                value.push(delim);
                                pos += 2;
                            } else {
                                value.push(delim);
                                pos += 1;
                                break;
                            }
                        },
                        Some(&c) => {
                            value.push(c);
                            pos += 1;
                        },
                    }
                }
            },
            Some('<') => {
                pos += 1;
                let mut depth = 0;
                loop {
                    match chars.get(pos) {
                        None => {
                            self.asmerr(ErrCode::MisDel);
                            return None;
                        },
                        Some(&COMMENT) => {
                            self.asmerr(ErrCode::MisDel);
                            return None;
                        },
                        Some('<') => {
                            depth += 1;
                            value.push('<');
                            pos += 1;
                        },
                        Some('>') => {
                            if depth == 0 {
                                pos += 1;
                                break;
                            }
                            depth -= 1;
                            value.push('>');
                            pos += 1;
                        },
                        Some('^') => {
                            pos += 1;
                            match chars.get(pos) {
                                Some(&c) => {
                                    value.push(c.to_ascii_uppercase());
                                    pos += 1;
                                },
                                None => {
                                    self.asmerr(ErrCode::IllOpe);
                                    return None;
                                },
                            }
                        },
                        Some(&delim) if delim == STRDEL || delim == STRDEL2 => {
                            value.push(delim);
                            pos += 1;
                            loop {
                                match chars.get(pos) {
                                    None => {
                                        self.asmerr(ErrCode::MisDel);
                                        return None;
                                    },
                                    Some(&c) if c == delim => {
                                        if chars.get(pos + 1) == Some(&delim) {
                                            value.push(delim);
                                            value.push(delim);
                                            pos += 2;
                                        } else {
                                            value.push(delim);
                                            pos += 1;
                                            break;
                                        }
                                    },
                                    Some(&c) => {
                                        value.push(c);
                                        pos += 1;
                                    },
                                }
                            }
                        },
                        Some(&c) => {
                            value.push(c.to_ascii_uppercase());
                            pos += 1;
                        },
                    }
                }
            },
            Some('%') => {
                pos += 1;
                let mut expr_text = String::new();
                while let Some(&c) = chars.get(pos) {
                    if c == ',' || c == COMMENT {
                        break;
                    }
                    expr_text.push(c);
                    pos += 1;
                }
                let result = self.eval(expr_text.trim());
                value = format!("{}", result);
            },
            _ => {
                while let Some(&c) = chars.get(pos) {
                    if c.is_whitespace() || c == ',' || c == COMMENT {
                        break;
                    }
                    value.push(c.to_ascii_uppercase());
                    pos += 1;
                }
            },
        }

        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        let rest: String = chars[pos..].iter().collect();
        Some((value, rest))
    }

    // name MACRO dummy[,dummy...]:
    pub(crate) fn op_macro(&mut self) -> u16 {
        self.a_mode = ListAddr::None;

        if self.label.is_empty() {
            self.asmerr(ErrCode::MisOpe);
            return 0;
        }
        let name = self.label.trim_end_matches(':').to_uppercase();

        let mut def = MacDef {
            name:    Some(name),
            dummies: Vec::new(),
            lines:   Vec::new(),
            variant: MacroVariant::Named,
        };

        let operand = self.operand.clone();
        let mut remaining: Option<&str> = if operand.is_empty() {
            None
        } else {
            Some(&operand)
        };
        while let Some(text) = remaining {
            let (arg, rest) = next_arg(text);
            remaining = rest;
            if arg.is_empty() {
                continue;
            }
            if !is_symbol(arg) {
                self.asmerr(ErrCode::IllOpe);
                continue;
            }
            let dummy = arg.to_uppercase();
            if def.dummies.contains(&dummy) {
                self.asmerr(ErrCode::MulSym);
                continue;
            }
            def.dummies.push(dummy);
        }

        self.mac_def = Some(def);
        self.mac_def_nest = 1;
        0
    }

    // IRP dummy,<item[,item...]>:
    pub(crate) fn op_irp(&mut self) -> u16 {
        self.a_mode = ListAddr::None;
        let operand = self.operand.clone();

        let (dummy, rest) = match self.irp_dummy(&operand) {
            Some(pair) => { pair },
            None       => { return 0 },
        };
        let rest = rest.trim_start();
        if !rest.starts_with('<') {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        let list = match self.bracketed_list(&rest[1..]) {
            Some(list) => { list },
            None       => { return 0 },
        };

        self.mac_def = Some(MacDef {
            name:    None,
            dummies: vec![dummy],
            lines:   Vec::new(),
            variant: MacroVariant::Irp { list: list },
        });
        self.mac_def_nest = 1;
        0
    }

    // IRPC dummy,string:
    pub(crate) fn op_irpc(&mut self) -> u16 {
        self.a_mode = ListAddr::None;
        let operand = self.operand.clone();

        let (dummy, rest) = match self.irp_dummy(&operand) {
            Some(pair) => { pair },
            None       => { return 0 },
        };
        let rest = rest.trim_start();

        let mut chars_out = String::new();
        let chars: Vec<char> = rest.chars().collect();
        let mut pos = 0;
        let mut bracketed = false;
        if chars.get(pos) == Some(&'<') {
            bracketed = true;
            pos += 1;
        }
        while let Some(&c) = chars.get(pos) {
            if c.is_whitespace() || c == COMMENT {
                break;
            }
            if c == '>' && bracketed {
                pos += 1;
                break;
            }
            if c == '^' {
                pos += 1;
                match chars.get(pos) {
                    Some(&escaped) => {
                        chars_out.push(escaped.to_ascii_uppercase());
                        pos += 1;
                    },
                    None => {
                        self.asmerr(ErrCode::IllOpe);
                        return 0;
                    },
                }
                continue;
            }
            chars_out.push(c.to_ascii_uppercase());
            pos += 1;
        }

        self.mac_def = Some(MacDef {
            name:    None,
            dummies: vec![dummy],
            lines:   Vec::new(),
            variant: MacroVariant::Irpc { chars: chars_out },
        });
        self.mac_def_nest = 1;
        0
    }

    // REPT count:
    pub(crate) fn op_rept(&mut self) -> u16 {
        self.a_mode = ListAddr::None;
        let operand = self.operand.clone();
        let count = self.eval(&operand) as i32;

        self.mac_def = Some(MacDef {
            name:    None,
            dummies: Vec::new(),
            lines:   Vec::new(),
            variant: MacroVariant::Rept { count: count },
        });
        self.mac_def_nest = 1;
        0
    }

    // The leading `dummy,' of IRP and IRPC:
    fn irp_dummy<'a>(&mut self, operand: &'a str) -> Option<(String, &'a str)> {
        let mut chars = operand.char_indices().peekable();
        let mut dummy = String::new();

        match chars.peek() {
            Some(&(_, ch)) if is_first_sym_char(ch) => {},
            _ => {
                self.asmerr(ErrCode::IllOpe);
                return None;
            },
        }
        let mut end = operand.len();
        while let Some(&(index, ch)) = chars.peek() {
            if is_sym_char(ch) {
                dummy.push(ch.to_ascii_uppercase());
                chars.next();
            } else {
                end = index;
                break;
            }
        }
        let rest = operand[end..].trim_start();
        if !rest.starts_with(',') {
            self.asmerr(ErrCode::IllOpe);
            return None;
        }
        Some((dummy, &rest[1..]))
    }

    // The `<...>' item list of IRP, with nesting and escapes preserved:
    fn bracketed_list(&mut self, text: &str) -> Option<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut list = String::new();
        let mut pos = 0;
        let mut depth = 0;

        loop {
            match chars.get(pos) {
                None => {
                    self.asmerr(ErrCode::MisDel);
                    return None;
                },
                Some(&COMMENT) => {
                    self.asmerr(ErrCode::MisDel);
                    return None;
                },
                Some(&delim) if delim == STRDEL || delim == STRDEL2 => {
                    list.push(delim);
                    pos += 1;
                    loop {
                        match chars.get(pos) {
                            None => {
                                self.asmerr(ErrCode::MisDel);
                                return None;
                            },
                            Some(&c) if c == delim => {
                                list.push(c);
                                pos += 1;
                                if chars.get(pos) == Some(&delim) {
                                    list.push(delim);
                                    pos += 1;
                                } else {
                                    break;
                                }
                            },
                            Some(&c) => {
                                list.push(c);
                                pos += 1;
                            },
                        }
                    }
                },
                Some('^') => {
                    list.push('^');
                    pos += 1;
                    match chars.get(pos) {
                        Some(&c) => {
                            list.push(c.to_ascii_uppercase());
                            pos += 1;
                        },
                        None => {
                            self.asmerr(ErrCode::IllOpe);
                            return None;
                        },
                    }
                },
                Some('<') => {
                    depth += 1;
                    list.push('<');
                    pos += 1;
                },
                Some('>') => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    list.push('>');
                    pos += 1;
                },
                Some(&c) => {
                    list.push(c.to_ascii_uppercase());
                    pos += 1;
                },
            }
        }
        Some(list)
    }

    // ENDM at expansion time: rewind for the next iteration or pop the
    // frame.  (At capture time ENDM never reaches here.)
    pub(crate) fn op_endm(&mut self) -> u16 {
        self.a_mode = ListAddr::None;
        if self.mac_expn.is_empty() {
            self.asmerr(ErrCode::NimExp);
        } else {
            self.mac_rept_expn();
        }
        0
    }

    // EXITM: abandon the innermost expansion:
    pub(crate) fn op_exitm(&mut self) -> u16 {
        self.a_mode = ListAddr::None;
        if self.mac_expn.is_empty() {
            self.asmerr(ErrCode::NimExp);
        } else {
            self.mac_end_expn();
        }
        0
    }

    // LOCAL name[,name...]: bind each name to a fresh ??nnnn label.
    pub(crate) fn op_local(&mut self) -> u16 {
        self.a_mode = ListAddr::None;
        if self.mac_expn.is_empty() {
            self.asmerr(ErrCode::NimExp);
            return 0;
        }

        let operand = self.operand.clone();
        let mut remaining: Option<&str> = Some(&operand);

        while let Some(text) = remaining {
            let (arg, rest) = next_arg(text);
            remaining = rest;
            if arg.is_empty() {
                continue;
            }
            if !is_symbol(arg) {
                self.asmerr(ErrCode::IllOpe);
                continue;
            }
            let name = arg.to_uppercase();

            let duplicate = {
                let expn = self.mac_expn.last().unwrap();
                expn.locs.iter().any(|(loc, _)| *loc == name)
                    || expn.parms.iter().any(|(parm, _)| *parm == name)
            };
            if duplicate {
                self.asmerr(ErrCode::MulSym);
                continue;
            }

            if self.mac_loc_cnt == 10000 {
                self.asmerr(ErrCode::OutLcl);
            } else {
                self.mac_loc_cnt += 1;
            }
            let value = format!("??{:04}", self.mac_loc_cnt);
            if let Some(expn) = self.mac_expn.last_mut() {
                expn.locs.push((name, value));
            }
        }
        0
    }

    // IFB, IFNB, IFIDN, IFDIF:
    pub(crate) fn op_mcond(&mut self, kind: u8) -> u16 {
        self.a_mode = ListAddr::None;
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
        let trimmed = operand.trim();
        if trimmed.is_empty() {
            self.asmerr(ErrCode::MisOpe);
            return 0;
        }
        if !trimmed.starts_with('<') {
            self.asmerr(ErrCode::IllOpe);
            return 0;
        }
        let close = match trimmed.find('>') {
            Some(index) => { index },
            None => {
                self.asmerr(ErrCode::MisPar);
                return 0;
            },
        };
        let first = &trimmed[1..close];
        let after = trimmed[close + 1..].trim_start();

        let mut satisfied = match kind {
            1 | 2 => {
                if !after.is_empty() && !after.starts_with(COMMENT) {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                first.is_empty()
            },
            _ => {
                if !after.starts_with(',') {
                    self.asmerr(ErrCode::MisOpe);
                    return 0;
                }
                let second_text = after[1..].trim_start();
                if !second_text.starts_with('<') {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                let second_close = match second_text.find('>') {
                    Some(index) => { index },
                    None => {
                        self.asmerr(ErrCode::MisPar);
                        return 0;
                    },
                };
                let second = &second_text[1..second_close];
                let tail = second_text[second_close + 1..].trim_start();
                if !tail.is_empty() && !tail.starts_with(COMMENT) {
                    self.asmerr(ErrCode::IllOpe);
                    return 0;
                }
                first == second
            },
        };

        // The even-numbered kinds are the negated forms:
        if (kind & 1) == 0 {
            satisfied = !satisfied;
        }
        self.gencode = if satisfied { self.pass } else { -self.pass };
        0
    }
}

// A legal symbol: a symbol-start character followed by symbol
// characters, nothing else.
pub(crate) fn is_symbol(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if is_first_sym_char(first) && !first.is_ascii_digit() => {},
        _ => { return false },
    }
    chars.all(is_sym_char)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Assembler, Config};

    fn asm_with_frame(parms: Vec<(&str, &str)>) -> Assembler {
        let mut asm = Assembler::new(Config::default());
        asm.pass = 1;
        let def = Rc::new(MacDef {
            name:    Some("T".to_owned()),
            dummies: parms.iter().map(|(name, _)| name.to_string()).collect(),
            lines:   vec!["ENDM".to_owned()],
            variant: MacroVariant::Named,
        });
        asm.mac_expn.push(Expansion {
            parms: parms.iter()
                .map(|(name, value)| (name.to_string(), Some(value.to_string())))
                .collect(),
            locs:     Vec::new(),
            line_idx: 0,
            iflevel:  0,
            iter:     0,
            irp_rest: String::new(),
            mac:      def,
        });
        asm
    }

    #[test]
    fn dummies_substitute_outside_strings() {
        let mut asm = asm_with_frame(vec![("X", "42")]);
        assert_eq!(asm.mac_subst(" db x"), " DB 42");
        assert_eq!(asm.mac_subst(" db xy"), " DB XY");
    }

    #[test]
    fn ampersand_concatenates() {
        let mut asm = asm_with_frame(vec![("X", "AB")]);
        assert_eq!(asm.mac_subst("lab&x: nop"), "LABAB: NOP");
        assert_eq!(asm.mac_subst("x&tail"), "ABTAIL");
    }

    #[test]
    fn strings_substitute_only_next_to_ampersand() {
        let mut asm = asm_with_frame(vec![("X", "42")]);
        assert_eq!(asm.mac_subst(" db 'x'"), " DB 'x'");
        assert_eq!(asm.mac_subst(" db '&x'"), " DB '42'");
    }

    #[test]
    fn caret_escapes_a_substitution() {
        let mut asm = asm_with_frame(vec![("X", "42")]);
        assert_eq!(asm.mac_subst(" db ^x"), " DB ^X");
    }

    #[test]
    fn double_semicolon_comments_vanish() {
        let mut asm = asm_with_frame(vec![]);
        assert_eq!(asm.mac_subst(" nop ;; scratch"), " NOP ");
        assert_eq!(asm.mac_subst(" nop ; kept"), " NOP ; kept");
    }

    #[test]
    fn percent_arguments_evaluate() {
        let mut asm = asm_with_frame(vec![]);
        let (value, rest) = asm.mac_next_parm("%2+3,next").unwrap();
        assert_eq!(value, "5");
        assert_eq!(rest, ",next");
    }

    #[test]
    fn bracketed_arguments_keep_commas() {
        let mut asm = asm_with_frame(vec![]);
        let (value, rest) = asm.mac_next_parm("<a,b>,c").unwrap();
        assert_eq!(value, "A,B");
        assert_eq!(rest, ",c");
    }
}
