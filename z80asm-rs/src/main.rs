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

// The assembler's command line.  Exit code 0 means a clean assembly,
// 1 means diagnostics were reported, 2 means the assembly could not be
// carried out at all.

use std::env;
use std::path;
use std::process;

use z80asm_rs::{Assembler, Config, ObjFormat};

mod util;

fn print_usage(progname: &str, opts: getopts::Options) {
    let brief = format!("Usage: {} [options] file ...", progname);
    print!("{}", opts.usage(&brief));
}

// Figure out the name of the executable:
fn get_progname(arg0: &path::Path) -> String {
    match arg0.file_name() {
        Some(name_osstr) => {
            name_osstr.to_string_lossy().into_owned()
        },

        // If we can't figure it out, just guess.
        None => {
            "z80asm-rs".to_owned()
        },
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let progname = get_progname(args[0].as_ref());

    let mut options = getopts::Options::new();
    options.optflag("l", "", "Generate a listing file.");
    options.optflag("s", "", "Add the symbol table and cross-reference to the listing.");
    options.optflag("U", "", "Fold all symbols to upper case.");
    options.optflag("x", "", "Don't fill gaps in binary output.");
    options.optflag("u", "", "Accept the undocumented instructions.");
    options.optflag("8", "", "Restrict the instruction set to the Intel 8080.");
    options.optflag("T", "", "Omit the date from the listing.");
    options.optflag("m", "", "List macro expansions.");
    options.optflag("v", "", "Verbose operation.");
    options.optopt("o", "", "Object file name.", "FILE");
    options.optopt("L", "", "Listing file name (implies -l).", "FILE");
    options.optopt("f", "", "Object format: h (Intel HEX), m (Motorola S-records), b (binary), c (C array).", "FMT");
    options.optmulti("D", "", "Define a symbol, with an optional value.", "SYM[=VAL]");
    options.optmulti("I", "", "Add a directory to the include search path.", "DIR");
    options.optopt("n", "", "Significant symbol length, also the HEX and C array record size.", "NNNN");
    options.optflag("h", "help", "Show this help listing.");

    let matches = match options.parse(&args[1..]) {
        Ok(matches) => { matches },
        Err(error) => {
            println!("{}: Argument parsing error: {}", progname, error);
            process::exit(2);
        },
    };
    if matches.opt_present("h") {
        print_usage(&progname, options);
        return;
    }
    if matches.free.is_empty() {
        println!("{}: No source files given.", progname);
        print_usage(&progname, options);
        process::exit(2);
    }

    if let Err(error) = util::StderrLogger::install(matches.opt_present("v")) {
        println!("{}: Failed to install the logger: {}", progname, error);
    }

    let mut cfg = Config::default();
    cfg.list     = matches.opt_present("l");
    cfg.sym_dump = matches.opt_present("s");
    cfg.upcase   = matches.opt_present("U");
    cfg.nofill   = matches.opt_present("x");
    cfg.undoc    = matches.opt_present("u");
    cfg.i8080    = matches.opt_present("8");
    cfg.nodate   = matches.opt_present("T");
    cfg.mac_list = matches.opt_present("m");
    cfg.verbose  = matches.opt_present("v");

    cfg.obj_file  = matches.opt_str("o").map(path::PathBuf::from);
    cfg.list_file = matches.opt_str("L").map(path::PathBuf::from);

    if let Some(format) = matches.opt_str("f") {
        cfg.obj_fmt = match format.as_str() {
            "h" => { ObjFormat::IntelHex },
            "m" => { ObjFormat::MotorolaSrec },
            "b" => { ObjFormat::Binary },
            "c" => { ObjFormat::Carray },
            other => {
                println!("{}: Unknown object format `{}'.", progname, other);
                process::exit(2);
            },
        };
    }

    for define in matches.opt_strs("D") {
        let parsed = match define.split_once('=') {
            Some((name, value)) => { (name.to_owned(), Some(value.to_owned())) },
            None                => { (define.clone(), None) },
        };
        cfg.defines.push(parsed);
    }
    for dir in matches.opt_strs("I") {
        cfg.include_dirs.push(path::PathBuf::from(dir));
    }

    if let Some(text) = matches.opt_str("n") {
        match text.parse::<usize>() {
            Ok(length) if length >= 1 => {
                cfg.symlen  = length;
                cfg.hexlen  = length.min(32);
                cfg.carylen = length;
            },
            _ => {
                println!("{}: Invalid length `{}'.", progname, text);
                process::exit(2);
            },
        }
    }

    let files: Vec<path::PathBuf> =
        matches.free.iter().map(path::PathBuf::from).collect();

    let mut asm = Assembler::new(cfg);
    match asm.assemble(&files) {
        Ok(0) => {
            process::exit(0);
        },
        Ok(errors) => {
            eprintln!("{}: {} error(s)", progname, errors);
            process::exit(1);
        },
        Err(fatal) => {
            eprintln!("{}: Fatal error: {}", progname, fatal);
            process::exit(2);
        },
    }
}
