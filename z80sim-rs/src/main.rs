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

// A small headless front end for the CPU cores: load an Intel HEX or raw
// binary image into the 64K memory, run until the program stops, report
// what stopped it and how many clock cycles it took.

use std::env;
use std::fs;
use std::path;
use std::process;

use log::error;

use z80sim_rs_core::{Cpu, CpuError, CpuType, SystemBus};

mod util;

fn print_usage(progname: &str, opts: getopts::Options) {
    let brief = format!("Usage: {} [options]", progname);
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
            "z80sim-rs".to_owned()
        },
    }
}

fn dump_registers(cpu: &Cpu) {
    println!();
    println!("PC   A  F    B  C  D  E  H  L  SP");
    println!("{:04X} {:02X} {:02X}   {:02X} {:02X} {:02X} {:02X} {:02X} {:02X} {:04X}",
             cpu.regs.pc, cpu.regs.a, cpu.regs.f,
             cpu.regs.b, cpu.regs.c, cpu.regs.d, cpu.regs.e,
             cpu.regs.h, cpu.regs.l, cpu.regs.sp);
    if cpu.cpu_type() == CpuType::Z80 {
        println!("IX   IY   I  R    IFF1 IFF2 IM");
        println!("{:04X} {:04X} {:02X} {:02X}   {}    {}    {}",
                 cpu.regs.ix, cpu.regs.iy, cpu.regs.i, cpu.regs.r_composed(),
                 cpu.iff1 as u8, cpu.iff2 as u8, cpu.im);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let progname = get_progname(args[0].as_ref());

    let mut options = getopts::Options::new();
    options.optopt("x", "", "Load an Intel HEX image.", "FILE");
    options.optopt("b", "", "Load a raw binary image.", "FILE");
    options.optopt("a", "", "Load and start address for raw binaries (default 0).", "ADDR");
    options.optflag("8", "", "Emulate an Intel 8080 instead of a Z80.");
    options.optflag("u", "", "Enable the undocumented instructions.");
    options.optflag("v", "", "Verbose operation.");
    options.optflag("h", "help", "Show this help listing.");

    let matches = match options.parse(&args[1..]) {
        Ok(matches) => { matches },
        Err(error) => {
            println!("{}: Argument parsing error: {}", progname, error);
            process::exit(1);
        },
    };
    if matches.opt_present("h") {
        print_usage(&progname, options);
        return;
    }

    if let Err(error) = util::StderrLogger::install(matches.opt_present("v")) {
        println!("{}: Failed to install the logger: {}", progname, error);
    }

    let load_addr = match matches.opt_str("a") {
        Some(text) => {
            match util::parse_u16_from_str(&text) {
                Some(addr) => { addr },
                None => {
                    error!("Invalid load address `{}'.", text);
                    process::exit(1);
                },
            }
        },
        None => { 0x0000 },
    };

    let mut bus = SystemBus::new();
    let start_addr;

    if let Some(hex_path) = matches.opt_str("x") {
        start_addr = match bus.load_hex_file(&hex_path) {
            Some(addr) => { addr },
            None => { process::exit(1) },
        };
    } else if let Some(bin_path) = matches.opt_str("b") {
        let image = match fs::read(&bin_path) {
            Ok(image) => { image },
            Err(err) => {
                error!("Failed to read `{}': {}.", bin_path, err);
                process::exit(1);
            },
        };
        bus.load_image(&image, load_addr);
        start_addr = load_addr;
    } else {
        println!("{}: No program specified, nothing to do.", progname);
        print_usage(&progname, options);
        process::exit(1);
    }

    let cpu_type = if matches.opt_present("8") { CpuType::I8080 } else { CpuType::Z80 };
    let mut cpu = Cpu::new(cpu_type);
    cpu.set_undocumented(matches.opt_present("u"));
    cpu.init();
    cpu.regs.pc = start_addr;

    let error = cpu.run(&mut bus);

    match error {
        CpuError::None | CpuError::OpHalt => {},
        other => {
            println!("{}", other.describe());
        },
    }
    dump_registers(&cpu);
    println!();
    println!("{} T-states executed", cpu.t);

    if error == CpuError::None || error == CpuError::OpHalt {
        process::exit(0);
    }
    process::exit(1);
}
