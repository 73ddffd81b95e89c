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

use log::{info, warn, error};

use std::fs;
use std::io::prelude::*;
use std::path;

// The bus is the capability through which the CPU cores reach the outside
// world.  A host system implements the four required operations; the hooks
// have empty default implementations.
//
// Z80 I/O instructions place a full 16-bit address on the bus: `IN A,(n)'
// puts n on the low half and A on the high half, `IN r,(C)' puts C on the
// low half and B on the high half.  Both halves are passed through so that
// peripherals which decode the high byte can do so.
pub trait Bus {
    fn mem_read(&mut self, addr: u16) -> u8;
    fn mem_write(&mut self, addr: u16, val: u8);
    fn io_in(&mut self, port_lo: u8, port_hi: u8) -> u8;
    fn io_out(&mut self, port_lo: u8, port_hi: u8, val: u8);

    fn mem_read_word(&mut self, addr: u16) -> u16 {
        let lsb = self.mem_read(addr);
        let msb = self.mem_read(addr.wrapping_add(1));

        ((msb as u16) << 8) | (lsb as u16)
    }

    fn mem_write_word(&mut self, addr: u16, val: u16) {
        self.mem_write(addr, (val & 0xff) as u8);
        self.mem_write(addr.wrapping_add(1), ((val >> 8) & 0xff) as u8);
    }

    // Invoked at the start of every M1 (opcode fetch) cycle:
    fn on_m1(&mut self, _pc: u16) {}

    // Invoked when the CPU enters the halt state:
    fn on_halt(&mut self) {}

    // Invoked when the CPU grants the bus to a DMA master:
    fn on_dma_ack(&mut self) {}

    // External peripherals may detect reti instructions and use them to
    // implement daisy-chaining.  This hook gets called when the CPU
    // executes a reti instruction.
    fn on_reti(&mut self) {}

    // Polled by the CPU at instruction boundaries; returning true stops
    // the CPU with a memory error.  The flag is expected to clear once it
    // has been reported.
    fn mem_error(&mut self) -> bool {
        false
    }
}

// An I/O peripheral attached to a port of the system bus.
pub trait PortDevice {
    fn port_in(&mut self, port_lo: u8, port_hi: u8) -> u8;
    fn port_out(&mut self, port_lo: u8, port_hi: u8, val: u8);
}

// A device overlaid onto a range of the memory map, a video memory for
// instance.  Addresses are relative to the start of the range.
pub trait MemoryDevice {
    fn read_byte(&mut self, addr: u16) -> u8;
    fn write_byte(&mut self, addr: u16, val: u8);
}

// The default bus implementation: a flat 64K byte array with optional
// write-protected ranges, write watchpoints, memory-mapped device
// overlays, and I/O peripherals attached to individual ports.
pub struct SystemBus {
    memory:       Box<[u8]>,
    rom_ranges:   Vec<(u16, u16)>,
    watchpoints:  Vec<u16>,
    overlays:     Vec<(u16, u16, Box<dyn MemoryDevice>)>,
    devices:      Vec<(u8, Box<dyn PortDevice>)>,
    mem_error:    bool,
}

pub const MEM_SIZE: usize = 0x1_0000;

impl SystemBus {
    pub fn new() -> SystemBus {
        let bus = SystemBus {
            memory:       vec![0xFF; MEM_SIZE].into_boxed_slice(),
            rom_ranges:   Vec::new(),
            watchpoints:  Vec::new(),
            overlays:     Vec::new(),
            devices:      Vec::new(),
            mem_error:    false,
        };

        info!("Created a system bus with 64K of memory.");
        bus
    }

    // Mark an inclusive address range as read-only.  Writes into the range
    // are refused and logged, the way a ROM chip would ignore them.
    pub fn add_rom_range(&mut self, start: u16, end: u16) {
        info!("Marked 0x{:04X}..0x{:04X} as read-only.", start, end);
        self.rom_ranges.push((start, end));
    }

    pub fn add_watchpoint(&mut self, addr: u16) {
        self.watchpoints.push(addr);
    }

    // Overlay a device onto an inclusive address range; it handles all
    // reads and writes in the range instead of the memory array.
    pub fn attach_memory(&mut self, start: u16, end: u16, device: Box<dyn MemoryDevice>) {
        info!("Attached a memory-mapped device at 0x{:04X}..0x{:04X}.", start, end);
        self.overlays.push((start, end, device));
    }

    pub fn attach_device(&mut self, port: u8, device: Box<dyn PortDevice>) {
        info!("Attached a peripheral device to port 0x{:02X}.", port);
        self.devices.push((port, device));
    }

    fn in_rom(&self, addr: u16) -> bool {
        for &(start, end) in self.rom_ranges.iter() {
            if addr >= start && addr <= end {
                return true;
            }
        }
        false
    }

    // Direct memory access for the host: frontpanel sampling, DMA masters,
    // the debugger.  These bypass ROM protection and watchpoints, and must
    // not be interleaved with active CPU cycles.
    pub fn putmem(&mut self, addr: u16, val: u8) {
        self.memory[addr as usize] = val;
    }

    pub fn getmem(&self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    // Load a raw chunk of bytes into memory at the given offset.
    pub fn load_image(&mut self, image: &[u8], offset: u16) {
        let space = MEM_SIZE - (offset as usize);
        let count = if image.len() > space { space } else { image.len() };

        self.memory[(offset as usize)..(offset as usize) + count]
            .copy_from_slice(&image[..count]);

        info!("Loaded {} bytes at offset 0x{:04X}.", count, offset);
        if image.len() > count {
            warn!("{} bytes did not fit into memory at offset 0x{:04X}.",
                  image.len() - count, offset);
        }
    }

    // Load an Intel HEX image from a file.  Returns the lowest address
    // loaded, or None if the file was unreadable or malformed.
    pub fn load_hex_file<P: AsRef<path::Path>>(&mut self, path_in: P) -> Option<u16> {
        let path = path_in.as_ref() as &path::Path;

        let mut text = String::new();
        match fs::File::open(path) {
            Ok(mut file) => {
                if let Err(err) = file.read_to_string(&mut text) {
                    error!("Failed to read `{}': {}.", path.display(), err);
                    return None;
                }
            },
            Err(err) => {
                error!("Failed to open `{}': {}.", path.display(), err);
                return None;
            },
        }
        match self.load_hex(&text) {
            Some(start) => {
                info!("Loaded Intel HEX file `{}', start address 0x{:04X}.",
                      path.display(), start);
                Some(start)
            },
            None => {
                error!("The file `{}' is not a valid Intel HEX image.", path.display());
                None
            },
        }
    }

    // Decode Intel HEX records from a string into memory.
    pub fn load_hex(&mut self, text: &str) -> Option<u16> {
        let mut lowest: Option<u16> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let bytes = decode_hex_record(line)?;
            if bytes.len() < 5 {
                return None;
            }
            let count = bytes[0] as usize;
            let addr  = ((bytes[1] as u16) << 8) | (bytes[2] as u16);
            let rtype = bytes[3];

            if bytes.len() != count + 5 {
                return None;
            }
            let sum: u8 = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
            if sum != 0 {
                return None;
            }
            match rtype {
                0x00 => {
                    for (index, &byte) in bytes[4..4 + count].iter().enumerate() {
                        self.memory[(addr as usize + index) & 0xFFFF] = byte;
                    }
                    lowest = match lowest {
                        Some(prev) if prev <= addr => Some(prev),
                        _                          => Some(addr),
                    };
                },
                0x01 => {
                    break;
                },
                _ => {
                    return None;
                },
            }
        }
        lowest.or(Some(0))
    }
}

fn decode_hex_record(line: &str) -> Option<Vec<u8>> {
    let mut chars = line.chars();
    if chars.next() != Some(':') {
        return None;
    }
    let digits: Vec<u32> = chars.map(|c| c.to_digit(16)).collect::<Option<Vec<u32>>>()?;
    if digits.len() % 2 != 0 {
        return None;
    }
    Some(digits.chunks(2).map(|pair| ((pair[0] << 4) | pair[1]) as u8).collect())
}

impl Bus for SystemBus {
    fn mem_read(&mut self, addr: u16) -> u8 {
        for &mut (start, end, ref mut device) in self.overlays.iter_mut() {
            if addr >= start && addr <= end {
                return device.read_byte(addr - start);
            }
        }
        self.memory[addr as usize]
    }

    fn mem_write(&mut self, addr: u16, val: u8) {
        for &mut (start, end, ref mut device) in self.overlays.iter_mut() {
            if addr >= start && addr <= end {
                device.write_byte(addr - start, val);
                return;
            }
        }
        if self.in_rom(addr) {
            warn!("Refused write of 0x{:02X} to read-only address 0x{:04X}.", val, addr);
            return;
        }
        if self.watchpoints.contains(&addr) {
            info!("Watchpoint: write of 0x{:02X} to 0x{:04X}.", val, addr);
        }
        self.memory[addr as usize] = val;
    }

    fn io_in(&mut self, port_lo: u8, port_hi: u8) -> u8 {
        for &mut (port, ref mut device) in self.devices.iter_mut() {
            if port == port_lo {
                return device.port_in(port_lo, port_hi);
            }
        }
        warn!("Failed read: Port 0x{:02X} doesn't belong to any installed peripheral device.", port_lo);

        0xFF
    }

    fn io_out(&mut self, port_lo: u8, port_hi: u8, val: u8) {
        for &mut (port, ref mut device) in self.devices.iter_mut() {
            if port == port_lo {
                device.port_out(port_lo, port_hi, val);
                return;
            }
        }
        warn!("Failed write of 0x{:02X}: Port 0x{:02X} doesn't belong to any installed peripheral device.", val, port_lo);
    }

    fn mem_error(&mut self) -> bool {
        let flagged = self.mem_error;
        self.mem_error = false;

        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rom_range_refuses_writes() {
        let mut bus = SystemBus::new();
        bus.putmem(0x0100, 0x55);
        bus.add_rom_range(0x0000, 0x0FFF);

        bus.mem_write(0x0100, 0xAA);
        assert_eq!(bus.getmem(0x0100), 0x55);

        bus.mem_write(0x1000, 0xAA);
        assert_eq!(bus.getmem(0x1000), 0xAA);
    }

    #[test]
    fn word_access_is_little_endian() {
        let mut bus = SystemBus::new();
        bus.mem_write_word(0x2000, 0x1234);

        assert_eq!(bus.getmem(0x2000), 0x34);
        assert_eq!(bus.getmem(0x2001), 0x12);
        assert_eq!(bus.mem_read_word(0x2000), 0x1234);
    }

    #[test]
    fn hex_decoding_reconstructs_the_image() {
        let mut bus = SystemBus::new();
        let start = bus.load_hex(":02010000AABB98\r\n:00000001FF\r\n");

        assert_eq!(start, Some(0x0100));
        assert_eq!(bus.getmem(0x0100), 0xAA);
        assert_eq!(bus.getmem(0x0101), 0xBB);
    }

    #[test]
    fn hex_decoding_rejects_bad_checksums() {
        let mut bus = SystemBus::new();

        assert_eq!(bus.load_hex(":02010000AABB99\r\n"), None);
    }

    #[test]
    fn unhandled_port_reads_as_0xff() {
        let mut bus = SystemBus::new();

        assert_eq!(bus.io_in(0x42, 0x00), 0xFF);
    }

    struct Scratch {
        data: [u8; 4],
    }

    impl MemoryDevice for Scratch {
        fn read_byte(&mut self, addr: u16) -> u8 {
            self.data[addr as usize]
        }
        fn write_byte(&mut self, addr: u16, val: u8) {
            self.data[addr as usize] = val;
        }
    }

    #[test]
    fn memory_overlays_intercept_their_range() {
        let mut bus = SystemBus::new();
        bus.attach_memory(0x3C00, 0x3C03, Box::new(Scratch { data: [0; 4] }));

        bus.mem_write(0x3C02, 0x55);
        assert_eq!(bus.mem_read(0x3C02), 0x55);
        // The underlying memory array is untouched:
        assert_eq!(bus.getmem(0x3C02), 0xFF);

        bus.mem_write(0x3C04, 0x66);
        assert_eq!(bus.getmem(0x3C04), 0x66);
    }
}
