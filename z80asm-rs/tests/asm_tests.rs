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

// End-to-end tests for the assembler: each test writes a small source
// file, assembles it, and inspects the object file (or the listing, or
// the error count).

use std::env;
use std::fs;
use std::path;
use std::process;

use z80asm_rs::{Assembler, Config, ObjFormat};

fn test_dir(test: &str) -> path::PathBuf {
    let dir = env::temp_dir()
        .join(format!("z80asm-rs-tests-{}", process::id()))
        .join(test);
    fs::create_dir_all(&dir).unwrap();
    dir
}

// Assemble `source' and return (error count, object file bytes):
fn assemble(test: &str, source: &str, configure: impl FnOnce(&mut Config))
            -> (usize, Vec<u8>) {
    let dir = test_dir(test);
    let src_path = dir.join("input.asm");
    let obj_path = dir.join("output.obj");
    fs::write(&src_path, source).unwrap();

    let mut cfg = Config::default();
    cfg.obj_file = Some(obj_path.clone());
    configure(&mut cfg);

    let mut asm = Assembler::new(cfg);
    let errors = asm.assemble(&[src_path]).unwrap();

    let object = fs::read(&obj_path).unwrap_or_default();
    (errors, object)
}

fn assemble_binary(test: &str, source: &str) -> (usize, Vec<u8>) {
    assemble(test, source, |cfg| {
        cfg.obj_fmt = ObjFormat::Binary;
    })
}

#[test]
fn a_simple_program_assembles_to_intel_hex() {
    let (errors, object) = assemble("simple-hex",
        "        ORG     0100H\n\
         \x20       LD      A,0AAH\n\
         \x20       HALT\n\
         \x20       END\n",
        |_| {});

    assert_eq!(errors, 0);
    let text = String::from_utf8(object).unwrap();
    assert_eq!(text, ":030100003EAA769E\r\n:00000001FF\r\n");
}

#[test]
fn hex_records_carry_the_documented_checksum() {
    let (errors, object) = assemble("hex-checksum",
        "        ORG     0100H\n\
         \x20       DB      0AAH,0BBH\n\
         \x20       END\n",
        |_| {});

    assert_eq!(errors, 0);
    let text = String::from_utf8(object).unwrap();
    assert_eq!(text, ":02010000AABB98\r\n:00000001FF\r\n");
}

#[test]
fn hex_output_reloads_to_the_same_image() {
    let source =
        "        ORG     0100H\n\
         \x20       LD      HL,1234H\n\
         \x20       LD      (8000H),HL\n\
         \x20       DB      1,2,3,4,5\n\
         \x20       HALT\n\
         \x20       END\n";

    let (errors, hex) = assemble("roundtrip-hex", source, |_| {});
    assert_eq!(errors, 0);
    let (errors, binary) = assemble_binary("roundtrip-bin", source);
    assert_eq!(errors, 0);

    let mut bus = z80sim_rs_core::SystemBus::new();
    let start = bus.load_hex(std::str::from_utf8(&hex).unwrap()).unwrap();
    assert_eq!(start, 0x0100);
    for (offset, &byte) in binary.iter().enumerate() {
        assert_eq!(bus.getmem(0x0100 + offset as u16), byte,
                   "mismatch at offset {}", offset);
    }
}

#[test]
fn motorola_records_end_with_s9() {
    let (errors, object) = assemble("srec",
        "        ORG     0\n\
         \x20       DB      1,2\n\
         \x20       END\n",
        |cfg| { cfg.obj_fmt = ObjFormat::MotorolaSrec; });

    assert_eq!(errors, 0);
    let text = String::from_utf8(object).unwrap();
    // count 05 = two data bytes + address + checksum:
    assert_eq!(text, "S10500000102F7\nS9030000FC\n");
}

#[test]
fn c_arrays_use_the_output_name() {
    let (errors, object) = assemble("carray",
        "        ORG     0\n\
         \x20       DB      1,2,3\n\
         \x20       END\n",
        |cfg| { cfg.obj_fmt = ObjFormat::Carray; });

    assert_eq!(errors, 0);
    let text = String::from_utf8(object).unwrap();
    assert!(text.starts_with("const unsigned char output[] = {"));
    assert!(text.contains("0x01,0x02,0x03,"));
}

#[test]
fn gaps_produce_separate_hex_records() {
    let (errors, object) = assemble("hex-gap",
        "        ORG     0\n\
         \x20       DB      1\n\
         \x20       DS      3\n\
         \x20       DB      2\n\
         \x20       END\n",
        |_| {});

    assert_eq!(errors, 0);
    let text = String::from_utf8(object).unwrap();
    assert_eq!(text, ":0100000001FE\r\n:0104000002F9\r\n:00000001FF\r\n");
}

#[test]
fn irp_iterates_over_the_item_list() {
    let (errors, object) = assemble_binary("irp",
        "        ORG     0\n\
         \x20       IRP     X,<A,B,C>\n\
         \x20       DB      '&X'\n\
         \x20       ENDM\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![0x41, 0x42, 0x43]);
}

#[test]
fn string_dummies_substitute_only_next_to_an_ampersand() {
    let (errors, object) = assemble_binary("irp-string",
        "        ORG     0\n\
         \x20       IRP     X,<A,B>\n\
         \x20       DB      'X'\n\
         \x20       ENDM\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    // Without the &, the X inside the string is character data:
    assert_eq!(object, vec![0x58, 0x58]);
}

#[test]
fn irpc_iterates_over_characters() {
    let (errors, object) = assemble_binary("irpc",
        "        ORG     0\n\
         \x20       IRPC    C,AB\n\
         \x20       DB      '&C'\n\
         \x20       ENDM\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![0x41, 0x42]);
}

#[test]
fn rept_repeats_the_body() {
    let (errors, object) = assemble_binary("rept",
        "        ORG     0\n\
         \x20       REPT    3\n\
         \x20       INC     A\n\
         \x20       ENDM\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![0x3C, 0x3C, 0x3C]);
}

#[test]
fn macros_bind_parameters_in_order() {
    let (errors, object) = assemble_binary("macro-parms",
        "STORE   MACRO   VAL,ADDR\n\
         \x20       LD      A,VAL\n\
         \x20       LD      (ADDR),A\n\
         \x20       ENDM\n\
         \x20       ORG     0\n\
         \x20       STORE   12H,1000H\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![0x3E, 0x12, 0x32, 0x00, 0x10]);
}

#[test]
fn local_labels_stay_distinct_across_expansions() {
    let dir = test_dir("locals");
    let src_path = dir.join("input.asm");
    let lst_path = dir.join("output.lis");
    fs::write(&src_path,
        "WAIT    MACRO\n\
         \x20       LOCAL   L1\n\
         L1:     DJNZ    L1\n\
         \x20       ENDM\n\
         \x20       ORG     0\n\
         \x20       WAIT\n\
         \x20       WAIT\n\
         \x20       WAIT\n\
         \x20       END\n").unwrap();

    let mut cfg = Config::default();
    cfg.obj_file = Some(dir.join("output.hex"));
    cfg.list_file = Some(lst_path.clone());
    cfg.sym_dump = true;
    cfg.nodate = true;

    let mut asm = Assembler::new(cfg);
    let errors = asm.assemble(&[src_path]).unwrap();
    assert_eq!(errors, 0);

    let listing = fs::read_to_string(&lst_path).unwrap();
    assert!(listing.contains("??0001"));
    assert!(listing.contains("??0002"));
    assert!(listing.contains("??0003"));
    assert!(!listing.contains("??0004"));
}

#[test]
fn runaway_macro_recursion_is_contained() {
    let (errors, _) = assemble_binary("macnest",
        "R       MACRO\n\
         \x20       R\n\
         \x20       ENDM\n\
         \x20       ORG     0\n\
         \x20       R\n\
         \x20       END\n");

    assert_eq!(errors, 1);
}

#[test]
fn conditionals_select_the_active_branch() {
    let (errors, object) = assemble_binary("conds",
        "        ORG     0\n\
         \x20       IF      1\n\
         \x20       DB      1\n\
         \x20       ELSE\n\
         \x20       DB      2\n\
         \x20       ENDIF\n\
         \x20       IFE     1\n\
         \x20       DB      3\n\
         \x20       ELSE\n\
         \x20       DB      4\n\
         \x20       ENDIF\n\
         \x20       IFDEF   NOSUCH\n\
         \x20       DB      5\n\
         \x20       ENDIF\n\
         \x20       IFB     <>\n\
         \x20       DB      6\n\
         \x20       ENDIF\n\
         \x20       IFIDN   <AB>,<AB>\n\
         \x20       DB      7\n\
         \x20       ENDIF\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![1, 4, 6, 7]);
}

#[test]
fn forward_references_resolve_in_pass_two() {
    let (errors, object) = assemble_binary("forward",
        "        ORG     0\n\
         \x20       JP      DONE\n\
         \x20       NOP\n\
         DONE:   HALT\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![0xC3, 0x04, 0x00, 0x00, 0x76]);
}

#[test]
fn symbols_truncate_at_the_significant_length() {
    let (errors, _) = assemble_binary("symlen",
        "longname  EQU 1\n\
         longnamex EQU 2\n\
         \x20       ORG 0\n\
         \x20       DB  longname\n\
         \x20       END\n");

    // The ninth character is not significant, so the second EQU is a
    // redefinition:
    assert_eq!(errors, 1);
}

#[test]
fn i8080_mode_rejects_z80_only_instructions() {
    let (errors, object) = assemble("i8080",
        "        ORG     0\n\
         \x20       LD      A,5\n\
         \x20       EXX\n\
         \x20       END\n",
        |cfg| {
            cfg.obj_fmt = ObjFormat::Binary;
            cfg.i8080 = true;
        });

    assert_eq!(errors, 1);
    // No object is written when diagnostics were reported:
    assert!(object.is_empty());
}

#[test]
fn undocumented_mnemonics_need_the_flag() {
    let source =
        "        ORG     0\n\
         \x20       SLL     B\n\
         \x20       END\n";

    let (errors, _) = assemble_binary("sll-rejected", source);
    assert_eq!(errors, 1);

    let (errors, object) = assemble("sll-accepted", source, |cfg| {
        cfg.obj_fmt = ObjFormat::Binary;
        cfg.undoc = true;
    });
    assert_eq!(errors, 0);
    assert_eq!(object, vec![0xCB, 0x30]);
}

#[test]
fn phase_blocks_diverge_the_logical_counter() {
    let (errors, object) = assemble_binary("phase",
        "        ORG     100H\n\
         \x20       .PHASE  200H\n\
         RUN:    NOP\n\
         \x20       JP      RUN\n\
         \x20       .DEPHASE\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    // Placed at 0100H, but assembled to run at 0200H:
    assert_eq!(object, vec![0x00, 0xC3, 0x00, 0x02]);
}

#[test]
fn index_register_operands_assemble() {
    let (errors, object) = assemble_binary("indexed",
        "        ORG     0\n\
         \x20       LD      IX,2000H\n\
         \x20       LD      (IX+5),42H\n\
         \x20       LD      A,(IX-1)\n\
         \x20       BIT     3,(IX+2)\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![
        0xDD, 0x21, 0x00, 0x20,
        0xDD, 0x36, 0x05, 0x42,
        0xDD, 0x7E, 0xFF,
        0xDD, 0xCB, 0x02, 0x5E,
    ]);
}

#[test]
fn relative_jumps_measure_from_the_next_instruction() {
    let (errors, object) = assemble_binary("relative",
        "        ORG     0\n\
         BACK:   NOP\n\
         \x20       JR      BACK\n\
         \x20       JR      Z,BACK\n\
         \x20       DJNZ    BACK\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![
        0x00,
        0x18, 0xFD,
        0x28, 0xFB,
        0x10, 0xF9,
    ]);
}

#[test]
fn set_symbols_reassign_but_labels_do_not() {
    let (errors, object) = assemble_binary("set-defl",
        "COUNT   SET     1\n\
         COUNT   SET     COUNT+1\n\
         \x20       ORG     0\n\
         \x20       DB      COUNT\n\
         \x20       SET     3,A\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    // COUNT ends up 2, and the unlabeled SET is the bit instruction:
    assert_eq!(object, vec![0x02, 0xCB, 0xDF]);
}

#[test]
fn include_files_splice_into_the_stream() {
    let dir = test_dir("include");
    let inc_path = dir.join("defs.inc");
    let src_path = dir.join("input.asm");
    let obj_path = dir.join("output.bin");
    fs::write(&inc_path, "VALUE   EQU     77H\n").unwrap();
    fs::write(&src_path,
        "        INCLUDE defs.inc\n\
         \x20       ORG     0\n\
         \x20       DB      VALUE\n\
         \x20       END\n").unwrap();

    let mut cfg = Config::default();
    cfg.obj_fmt = ObjFormat::Binary;
    cfg.obj_file = Some(obj_path.clone());

    let mut asm = Assembler::new(cfg);
    let errors = asm.assemble(&[src_path]).unwrap();

    assert_eq!(errors, 0);
    assert_eq!(fs::read(&obj_path).unwrap(), vec![0x77]);
}

#[test]
fn the_current_radix_controls_bare_numbers() {
    let (errors, object) = assemble_binary("radix",
        "        ORG     0\n\
         \x20       RADIX   16\n\
         \x20       DB      0FF\n\
         \x20       RADIX   2\n\
         \x20       DB      101\n\
         \x20       END\n");

    assert_eq!(errors, 0);
    assert_eq!(object, vec![0xFF, 0x05]);
}
