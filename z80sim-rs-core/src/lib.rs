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

// This crate is a software implementation of the Zilog Z80 and Intel 8080
// microprocessors: registers, flags, the complete instruction sets with
// T-state accounting, the interrupt machinery, and a bus abstraction that
// the host system implements to provide memory and I/O.

pub mod bus;
pub mod cpu;
pub mod i8080;
pub mod z80;

pub use crate::bus::{Bus, MemoryDevice, PortDevice, SystemBus};
pub use crate::cpu::{Cpu, CpuError, CpuSignals, CpuState, CpuType, Regs};
