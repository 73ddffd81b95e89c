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

// Behavioral tests for the Z80 and 8080 cores: each test loads a short
// program, steps or runs the CPU, and checks the architectural state.

use z80sim_rs_core::{Bus, Cpu, CpuError, CpuState, CpuType, PortDevice, SystemBus};

const S_FLAG: u8 = 0b1000_0000;
const Z_FLAG: u8 = 0b0100_0000;
const H_FLAG: u8 = 0b0001_0000;
const P_FLAG: u8 = 0b0000_0100;
const N_FLAG: u8 = 0b0000_0010;
const C_FLAG: u8 = 0b0000_0001;

fn make_cpu(program: &[u8]) -> (Cpu, SystemBus) {
    let mut bus = SystemBus::new();
    bus.load_image(program, 0x0000);

    let mut cpu = Cpu::new(CpuType::Z80);
    cpu.init();
    (cpu, bus)
}

fn make_8080(program: &[u8]) -> (Cpu, SystemBus) {
    let mut bus = SystemBus::new();
    bus.load_image(program, 0x0000);

    let mut cpu = Cpu::new(CpuType::I8080);
    cpu.init();
    (cpu, bus)
}

#[test]
fn add_a_b_overflow_sets_the_expected_flags() {
    // LD A,0x7F; LD B,0x01; ADD A,B
    let (mut cpu, mut bus) = make_cpu(&[0x3E, 0x7F, 0x06, 0x01, 0x80]);

    cpu.step(&mut bus);
    cpu.step(&mut bus);
    let t_before = cpu.t;
    let cycles = cpu.step(&mut bus);

    assert_eq!(cpu.regs.a, 0x80);
    assert_ne!(cpu.regs.f & S_FLAG, 0);
    assert_eq!(cpu.regs.f & Z_FLAG, 0);
    assert_ne!(cpu.regs.f & H_FLAG, 0);
    assert_ne!(cpu.regs.f & P_FLAG, 0, "overflow must be flagged");
    assert_eq!(cpu.regs.f & N_FLAG, 0);
    assert_eq!(cpu.regs.f & C_FLAG, 0);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.t - t_before, 4);
}

#[test]
fn daa_corrects_bcd_addition() {
    // LD A,0x19; LD B,0x28; ADD A,B; DAA
    let (mut cpu, mut bus) = make_cpu(&[0x3E, 0x19, 0x06, 0x28, 0x80, 0x27]);

    cpu.step(&mut bus);
    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x41);
    assert_ne!(cpu.regs.f & H_FLAG, 0);

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.a, 0x47, "BCD 19 + 28 must read 47");
    assert_eq!(cpu.regs.f & H_FLAG, 0);
    assert_eq!(cpu.regs.f & C_FLAG, 0);
}

#[test]
fn daa_leaves_a_valid_bcd_sum_alone() {
    // LD A,0x21; LD B,0x12; ADD A,B; DAA
    let (mut cpu, mut bus) = make_cpu(&[0x3E, 0x21, 0x06, 0x12, 0x80, 0x27]);

    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.a, 0x33);
    assert_eq!(cpu.regs.f & (H_FLAG | C_FLAG), 0);
}

#[test]
fn mode2_interrupt_vectors_through_the_table() {
    // EI; NOP; then loop
    let (mut cpu, mut bus) = make_cpu(&[0xFB, 0x00, 0x00, 0x00]);
    cpu.regs.i = 0x30;
    bus.putmem(0x3040, 0x00);
    bus.putmem(0x3041, 0x20);
    cpu.regs.sp = 0x8000;

    cpu.step(&mut bus);                 // EI
    cpu.step(&mut bus);                 // NOP, protection expires after this
    assert_eq!(cpu.im, 0);

    // Switch to mode 2 by executing ED 5E out of a scratch area:
    bus.putmem(0x0100, 0xED);
    bus.putmem(0x0101, 0x5E);
    cpu.regs.pc = 0x0100;
    cpu.step(&mut bus);
    assert_eq!(cpu.im, 2);

    cpu.request_interrupt(0x40);
    let return_addr = cpu.regs.pc;
    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 19);
    assert_eq!(cpu.regs.pc, 0x2000);
    assert!(!cpu.iff1);
    assert_eq!(bus.getmem(0x7FFE), (return_addr & 0xFF) as u8);
    assert_eq!(bus.getmem(0x7FFF), (return_addr >> 8) as u8);
}

#[test]
fn mode1_interrupt_jumps_to_0x38() {
    let (mut cpu, mut bus) = make_cpu(&[0xFB, 0x00, 0x00, 0x00]);
    cpu.regs.sp = 0x8000;

    bus.putmem(0x0100, 0xED);
    bus.putmem(0x0101, 0x56);           // IM 1
    cpu.regs.pc = 0x0100;
    cpu.step(&mut bus);

    cpu.regs.pc = 0x0000;
    cpu.step(&mut bus);                 // EI
    cpu.step(&mut bus);                 // NOP
    cpu.request_interrupt(0xFF);
    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 13);
    assert_eq!(cpu.regs.pc, 0x0038);
}

#[test]
fn interrupts_wait_for_the_instruction_after_ei() {
    // EI; RET with an interrupt already pending: the RET must run before
    // the interrupt is accepted.
    let (mut cpu, mut bus) = make_cpu(&[0xFB, 0xC9]);
    cpu.regs.sp = 0x8000;
    bus.putmem(0x8000, 0x34);           // return address 0x1234
    bus.putmem(0x8001, 0x12);

    bus.putmem(0x0100, 0xED);
    bus.putmem(0x0101, 0x56);           // IM 1
    cpu.regs.pc = 0x0100;
    cpu.step(&mut bus);
    cpu.regs.pc = 0x0000;

    cpu.request_interrupt(0xFF);
    cpu.step(&mut bus);                 // EI, interrupt pending but deferred
    assert_eq!(cpu.regs.pc, 0x0001);

    cpu.step(&mut bus);                 // RET, still deferred
    assert_eq!(cpu.regs.pc, 0x1234);

    cpu.step(&mut bus);                 // now the interrupt is taken
    assert_eq!(cpu.regs.pc, 0x0038);
}

#[test]
fn nmi_preserves_iff2_and_vectors_to_0x66() {
    let (mut cpu, mut bus) = make_cpu(&[0xFB, 0x00, 0x00]);
    cpu.regs.sp = 0x8000;

    cpu.step(&mut bus);                 // EI
    cpu.step(&mut bus);                 // NOP
    assert!(cpu.iff1 && cpu.iff2);

    cpu.request_nmi();
    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 11);
    assert_eq!(cpu.regs.pc, 0x0066);
    assert!(!cpu.iff1);
    assert!(cpu.iff2, "IFF2 must keep the pre-NMI interrupt state");
}

#[test]
fn halt_with_interrupts_disabled_stops_the_cpu() {
    // DI; HALT
    let (mut cpu, mut bus) = make_cpu(&[0xF3, 0x76]);

    let error = cpu.run(&mut bus);

    assert_eq!(error, CpuError::OpHalt);
    assert_eq!(cpu.state, CpuState::Stopped);
}

#[test]
fn halt_with_interrupts_enabled_idles_until_an_interrupt() {
    let (mut cpu, mut bus) = make_cpu(&[0xFB, 0x76, 0x00]);
    cpu.regs.sp = 0x8000;

    bus.putmem(0x0100, 0xED);
    bus.putmem(0x0101, 0x56);           // IM 1
    cpu.regs.pc = 0x0100;
    cpu.step(&mut bus);
    cpu.regs.pc = 0x0000;

    cpu.step(&mut bus);                 // EI
    cpu.step(&mut bus);                 // HALT
    assert_eq!(cpu.state, CpuState::Halted);

    cpu.step(&mut bus);                 // idle cycle
    assert_eq!(cpu.state, CpuState::Halted);

    cpu.request_interrupt(0xFF);
    cpu.step(&mut bus);
    assert_eq!(cpu.state, CpuState::Running);
    assert_eq!(cpu.regs.pc, 0x0038);
}

#[test]
fn a_tight_jump_loop_modifies_no_memory() {
    // JR $
    let (mut cpu, mut bus) = make_cpu(&[0x18, 0xFE]);
    let before: Vec<u8> = (0..0x100u16).map(|addr| bus.getmem(addr)).collect();

    for _ in 0..1000 {
        cpu.step(&mut bus);
        assert_eq!(cpu.regs.pc, 0x0000);
    }
    let after: Vec<u8> = (0..0x100u16).map(|addr| bus.getmem(addr)).collect();
    assert_eq!(before, after);
}

#[test]
fn ld_a_i_and_ld_a_r_copy_iff2_into_parity() {
    let (mut cpu, mut bus) = make_cpu(&[0xED, 0x57, 0xED, 0x5F]);
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.regs.i = 0x00;

    cpu.step(&mut bus);                 // LD A,I
    assert_ne!(cpu.regs.f & P_FLAG, 0);
    assert_ne!(cpu.regs.f & Z_FLAG, 0);

    cpu.iff2 = false;
    cpu.step(&mut bus);                 // LD A,R
    assert_eq!(cpu.regs.f & P_FLAG, 0);
}

#[test]
fn the_refresh_counter_ticks_once_per_opcode_byte() {
    // NOP; ED 57 (LD A,I)
    let (mut cpu, mut bus) = make_cpu(&[0x00, 0xED, 0x57]);
    cpu.regs.r = 0;

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.r, 1);

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.r, 3, "a prefixed opcode is two M1 fetches");
}

#[test]
fn ld_a_r_reads_the_loaded_bit7() {
    // LD A,0x80; LD R,A; LD A,R
    let (mut cpu, mut bus) = make_cpu(&[0x3E, 0x80, 0xED, 0x4F, 0xED, 0x5F]);

    cpu.step(&mut bus);
    cpu.step(&mut bus);
    cpu.step(&mut bus);

    // Two M1 fetches happened since LD R,A zeroed the counter:
    assert_eq!(cpu.regs.a, 0x82);
}

#[test]
fn sixteen_bit_arithmetic_and_exchanges() {
    // LD HL,0x1234; LD DE,0x1111; ADD HL,DE; EX DE,HL
    let (mut cpu, mut bus) = make_cpu(&[
        0x21, 0x34, 0x12,
        0x11, 0x11, 0x11,
        0x19,
        0xEB,
    ]);

    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.de(), 0x2345);
    assert_eq!(cpu.regs.hl(), 0x1111);
}

#[test]
fn indexed_loads_use_the_displacement() {
    // LD IX,0x2000; LD (IX+5),0x77; LD A,(IX+5)
    let (mut cpu, mut bus) = make_cpu(&[
        0xDD, 0x21, 0x00, 0x20,
        0xDD, 0x36, 0x05, 0x77,
        0xDD, 0x7E, 0x05,
    ]);

    cpu.step(&mut bus);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 19);
    assert_eq!(bus.getmem(0x2005), 0x77);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 19);
    assert_eq!(cpu.regs.a, 0x77);
}

#[test]
fn ddcb_bit_operations_reach_memory() {
    // LD IX,0x2000; SET 3,(IX+2); BIT 3,(IX+2)
    let (mut cpu, mut bus) = make_cpu(&[
        0xDD, 0x21, 0x00, 0x20,
        0xDD, 0xCB, 0x02, 0xDE,
        0xDD, 0xCB, 0x02, 0x5E,
    ]);
    bus.putmem(0x2002, 0x00);

    cpu.step(&mut bus);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 23);
    assert_eq!(bus.getmem(0x2002), 0x08);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.regs.f & Z_FLAG, 0);
}

#[test]
fn ddcb_undocumented_form_stores_to_the_register_too() {
    // LD IX,0x2000; RLC (IX+0),B
    let (mut cpu, mut bus) = make_cpu(&[
        0xDD, 0x21, 0x00, 0x20,
        0xDD, 0xCB, 0x00, 0x00,
    ]);
    cpu.set_undocumented(true);
    bus.putmem(0x2000, 0x81);

    cpu.step(&mut bus);
    cpu.step(&mut bus);

    assert_eq!(bus.getmem(0x2000), 0x03);
    assert_eq!(cpu.regs.b, 0x03);
    assert_ne!(cpu.regs.f & C_FLAG, 0);
}

#[test]
fn undocumented_opcodes_trap_when_disabled() {
    // SLL B without the undocumented set enabled:
    let (mut cpu, mut bus) = make_cpu(&[0xCB, 0x30]);

    cpu.step(&mut bus);
    assert_eq!(cpu.state, CpuState::Stopped);
    assert_eq!(cpu.error, CpuError::OpTrap2);
}

#[test]
fn sll_shifts_in_a_one_when_enabled() {
    let (mut cpu, mut bus) = make_cpu(&[0xCB, 0x30]);
    cpu.set_undocumented(true);
    cpu.regs.b = 0x40;

    cpu.step(&mut bus);
    assert_eq!(cpu.regs.b, 0x81);
    assert_eq!(cpu.state, CpuState::Running);
}

#[test]
fn ixh_arithmetic_when_enabled() {
    // LD IX,0x1234; ADD A,IXH
    let (mut cpu, mut bus) = make_cpu(&[0xDD, 0x21, 0x34, 0x12, 0xDD, 0x84]);
    cpu.set_undocumented(true);
    cpu.regs.a = 0x01;

    cpu.step(&mut bus);
    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 8);
    assert_eq!(cpu.regs.a, 0x13);
}

#[test]
fn unlisted_ed_slots_trap() {
    let (mut cpu, mut bus) = make_cpu(&[0xED, 0x00]);

    cpu.step(&mut bus);
    assert_eq!(cpu.state, CpuState::Stopped);
    assert_eq!(cpu.error, CpuError::OpTrap2);
}

#[test]
fn block_transfer_moves_and_counts() {
    // LD HL,0x1000; LD DE,0x2000; LD BC,3; LDIR
    let (mut cpu, mut bus) = make_cpu(&[
        0x21, 0x00, 0x10,
        0x11, 0x00, 0x20,
        0x01, 0x03, 0x00,
        0xED, 0xB0,
    ]);
    bus.putmem(0x1000, 0xAA);
    bus.putmem(0x1001, 0xBB);
    bus.putmem(0x1002, 0xCC);

    cpu.step(&mut bus);
    cpu.step(&mut bus);
    cpu.step(&mut bus);

    let mut cycles = 0;
    while cpu.regs.bc() != 0 {
        cycles += cpu.step(&mut bus);
    }

    assert_eq!(cycles, 21 + 21 + 16);
    assert_eq!(bus.getmem(0x2000), 0xAA);
    assert_eq!(bus.getmem(0x2001), 0xBB);
    assert_eq!(bus.getmem(0x2002), 0xCC);
    assert_eq!(cpu.regs.hl(), 0x1003);
    assert_eq!(cpu.regs.de(), 0x2003);
    assert_eq!(cpu.regs.f & P_FLAG, 0, "BC reached zero");
}

#[test]
fn cpir_stops_on_a_match() {
    // LD HL,0x1000; LD BC,0x10; LD A,0xBB; CPIR
    let (mut cpu, mut bus) = make_cpu(&[
        0x21, 0x00, 0x10,
        0x01, 0x10, 0x00,
        0x3E, 0xBB,
        0xED, 0xB1,
    ]);
    bus.putmem(0x1000, 0xAA);
    bus.putmem(0x1001, 0xBB);

    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    loop {
        cpu.step(&mut bus);
        if (cpu.regs.f & Z_FLAG) != 0 || cpu.regs.bc() == 0 {
            break;
        }
    }

    assert_ne!(cpu.regs.f & Z_FLAG, 0);
    assert_eq!(cpu.regs.hl(), 0x1002);
    assert_eq!(cpu.regs.bc(), 0x000E);
}

struct EchoPort {
    last_out: u8,
}

impl PortDevice for EchoPort {
    fn port_in(&mut self, _port_lo: u8, _port_hi: u8) -> u8 {
        self.last_out
    }
    fn port_out(&mut self, _port_lo: u8, _port_hi: u8, val: u8) {
        self.last_out = val;
    }
}

#[test]
fn io_instructions_reach_the_attached_device() {
    // LD A,0x5A; OUT (0x10),A; LD A,0; IN A,(0x10)
    let (mut cpu, mut bus) = make_cpu(&[
        0x3E, 0x5A,
        0xD3, 0x10,
        0x3E, 0x00,
        0xDB, 0x10,
    ]);
    bus.attach_device(0x10, Box::new(EchoPort { last_out: 0 }));

    for _ in 0..4 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.a, 0x5A);
}

#[test]
fn in_r_c_sets_the_flags() {
    // LD B,0x00; LD C,0x10; IN D,(C)
    let (mut cpu, mut bus) = make_cpu(&[0x06, 0x00, 0x0E, 0x10, 0xED, 0x50]);
    bus.attach_device(0x10, Box::new(EchoPort { last_out: 0x80 }));

    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.d, 0x80);
    assert_ne!(cpu.regs.f & S_FLAG, 0);
    assert_eq!(cpu.regs.f & (Z_FLAG | N_FLAG), 0);
}

#[test]
fn stop_request_exits_the_run_loop() {
    // JR $
    let (mut cpu, mut bus) = make_cpu(&[0x18, 0xFE]);
    let signals = cpu.signals();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        signals.request_stop();
    });
    let error = cpu.run(&mut bus);
    handle.join().unwrap();

    assert_eq!(error, CpuError::UserInt);
    assert_eq!(cpu.state, CpuState::Stopped);
}

#[test]
fn dma_handler_runs_between_instructions() {
    let (mut cpu, mut bus) = make_cpu(&[0x00, 0x00]);

    cpu.request_dma(Box::new(|bus: &mut dyn Bus| {
        bus.mem_write(0x4000, 0x42);
        7
    }));
    let cycles = cpu.step(&mut bus);

    assert_eq!(bus.getmem(0x4000), 0x42);
    assert_eq!(cycles, 7 + 4, "DMA cycles are added to the instruction's");
}

// 8080 mode:

#[test]
fn i8080_add_clears_where_z80_would_set_n() {
    // MVI A,0x7F; MVI B,0x01; ADD B
    let (mut cpu, mut bus) = make_8080(&[0x3E, 0x7F, 0x06, 0x01, 0x80]);

    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.a, 0x80);
    assert_ne!(cpu.regs.f & S_FLAG, 0);
    assert_ne!(cpu.regs.f & H_FLAG, 0);
    // The parity of 0x80 is odd, and the 8080 has no overflow flag:
    assert_eq!(cpu.regs.f & P_FLAG, 0);
}

#[test]
fn i8080_subtraction_uses_the_no_borrow_convention() {
    // MVI A,0x10; SUI 0x01
    let (mut cpu, mut bus) = make_8080(&[0x3E, 0x10, 0xD6, 0x01]);

    cpu.step(&mut bus);
    cpu.step(&mut bus);

    assert_eq!(cpu.regs.a, 0x0F);
    // The low nibble borrowed, so the 8080 auxiliary carry reads zero:
    assert_eq!(cpu.regs.f & H_FLAG, 0);
    assert_eq!(cpu.regs.f & C_FLAG, 0);
}

#[test]
fn i8080_alias_opcodes_decode_as_their_documented_twins() {
    // 0xCB nn nn decodes as JMP:
    let (mut cpu, mut bus) = make_8080(&[0xCB, 0x00, 0x20]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x2000);
    assert_eq!(cpu.state, CpuState::Running);

    // 0xD9 decodes as RET:
    let (mut cpu, mut bus) = make_8080(&[0xD9]);
    cpu.regs.sp = 0x8000;
    bus.putmem(0x8000, 0x34);
    bus.putmem(0x8001, 0x12);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x1234);

    // 0xED nn nn decodes as CALL:
    let (mut cpu, mut bus) = make_8080(&[0xED, 0x00, 0x30]);
    cpu.regs.sp = 0x8000;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.pc, 0x3000);

    // 0x08 decodes as NOP:
    let (mut cpu, mut bus) = make_8080(&[0x08]);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.regs.pc, 0x0001);
}

#[test]
fn i8080_push_psw_masks_the_unused_bits() {
    // Set every flag via arithmetic, then PUSH PSW:
    // MVI A,0x00; SUI 0x01  (sets S, C, clears Z) ; PUSH PSW
    let (mut cpu, mut bus) = make_8080(&[0x3E, 0x00, 0xD6, 0x01, 0xF5]);
    cpu.regs.sp = 0x8000;

    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    let pushed_flags = bus.getmem(0x7FFE);
    assert_eq!(pushed_flags & 0b0010_1000, 0, "bits 5 and 3 always read 0");
    assert_ne!(pushed_flags & 0b0000_0010, 0, "bit 1 always reads 1");
}

#[test]
fn i8080_ana_honors_the_amd_variant() {
    // MVI A,0x0F; MVI B,0x08; ANA B
    let program = [0x3E, 0x0F, 0x06, 0x08, 0xA0];

    let (mut cpu, mut bus) = make_8080(&program);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.a, 0x08);
    assert_ne!(cpu.regs.f & H_FLAG, 0, "Intel parts OR bit 3 of the operands");

    let (mut cpu, mut bus) = make_8080(&program);
    cpu.set_amd_flags(true);
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.a, 0x08);
    assert_eq!(cpu.regs.f & H_FLAG, 0, "AMD parts clear the auxiliary carry");
}

#[test]
fn i8080_never_touches_the_z80_only_registers() {
    let (mut cpu, mut bus) = make_8080(&[
        0x3E, 0x55,             // MVI A,0x55
        0x21, 0x00, 0x10,       // LXI H
        0x29,                   // DAD H
        0xEB,                   // XCHG
        0x07,                   // RLC
    ]);
    cpu.regs.ix = 0xBEEF;
    cpu.regs.iy = 0xCAFE;
    let r_before = cpu.regs.r;

    for _ in 0..5 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs.ix, 0xBEEF);
    assert_eq!(cpu.regs.iy, 0xCAFE);
    assert_eq!(cpu.regs.r, r_before);
    assert_eq!(cpu.regs.a_prime, 0x00);
}

#[test]
fn i8080_rotates_touch_only_the_carry() {
    // MVI A,0x81; RLC
    let (mut cpu, mut bus) = make_8080(&[0x3E, 0x81, 0x07]);
    let flags_before = cpu.regs.f & !C_FLAG;

    cpu.step(&mut bus);
    cpu.step(&mut bus);

    assert_eq!(cpu.regs.a, 0x03);
    assert_ne!(cpu.regs.f & C_FLAG, 0);
    assert_eq!(cpu.regs.f & !C_FLAG, flags_before,
               "only the carry may change on an 8080 rotate");
}
