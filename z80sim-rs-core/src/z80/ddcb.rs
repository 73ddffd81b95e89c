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

// The four-byte DD CB / FD CB instructions: rotates, shifts and bit
// operations on an (IX+d) or (IY+d) operand.  The encoding is unusual in
// that the displacement byte comes before the final opcode byte.
//
// Only the memory-operand column of each row is documented.  The other
// columns are undocumented: the rotated (or reset, or set) value is
// written both to memory and to the register the column names.  BIT
// behaves as a plain bit test in every column, with the undocumented
// flags taken from the high byte of the effective address.

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuError};

use crate::z80::instructions::{self, IndexReg};

pub(super) fn execute<B: Bus>(cpu: &mut Cpu, bus: &mut B, which: IndexReg,
                              displacement: u8, opcode: u8, m1_addr: u16) -> u32 {
    let undoc = cpu.undocumented();
    let column = opcode & 0x07;

    if column != 6 && !undoc {
        cpu.trap(CpuError::OpTrap4, m1_addr);
        return 0;
    }

    let base = match which {
        IndexReg::Ix => cpu.regs.ix,
        IndexReg::Iy => cpu.regs.iy,
    };
    let addr = base.wrapping_add((displacement as i8) as u16);
    let value = bus.mem_read(addr);

    match opcode >> 6 {
        0 => {
            let operation = (opcode >> 3) & 0x07;
            if operation == 6 && !undoc {
                // The SLL row is undocumented even in its memory column.
                cpu.trap(CpuError::OpTrap4, m1_addr);
                return 0;
            }
            let res = match operation {
                0 => instructions::rlc_val(cpu, value),
                1 => instructions::rrc_val(cpu, value),
                2 => instructions::rl_val(cpu, value),
                3 => instructions::rr_val(cpu, value),
                4 => instructions::sla_val(cpu, value),
                5 => instructions::sra_val(cpu, value),
                6 => instructions::sll_val(cpu, value),
                _ => instructions::srl_val(cpu, value),
            };
            store(cpu, bus, addr, column, res);
            23
        },
        1 => {                                              // BIT b,(xy+d)
            let bit = (opcode >> 3) & 0x07;
            instructions::bit_val(cpu, bit, value, (addr >> 8) as u8);
            20
        },
        2 => {                                              // RES b,(xy+d)
            let bit = (opcode >> 3) & 0x07;
            let res = value & !(1 << bit);
            store(cpu, bus, addr, column, res);
            23
        },
        _ => {                                              // SET b,(xy+d)
            let bit = (opcode >> 3) & 0x07;
            let res = value | (1 << bit);
            store(cpu, bus, addr, column, res);
            23
        },
    }
}

// Write the result back to memory, and in the undocumented columns also
// to the named register:
fn store<B: Bus>(cpu: &mut Cpu, bus: &mut B, addr: u16, column: u8, value: u8) {
    bus.mem_write(addr, value);
    match column {
        0 => cpu.regs.b = value,
        1 => cpu.regs.c = value,
        2 => cpu.regs.d = value,
        3 => cpu.regs.e = value,
        4 => cpu.regs.h = value,
        5 => cpu.regs.l = value,
        6 => {},
        _ => cpu.regs.a = value,
    }
}
