/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;

use super::NascomMemory;

/// The size of the address space plus the wrap-around slot.
const MEM_SIZE: usize = 0x10001;
const WRAP_SLOT: usize = 0x10000;

/// A single page memory type with 64kb RAM.
///
/// An additional byte following address `0xFFFF` mirrors the value at address `0`.
///
/// With the `snapshot` feature enabled only the 64kb address space is serialized.
#[derive(Clone)]
pub struct Memory64k {
    mem: Box<[u8;MEM_SIZE]>
}

impl Default for Memory64k {
    fn default() -> Self {
        Memory64k { mem: Box::new([0;MEM_SIZE]) }
    }
}

impl fmt::Debug for Memory64k {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory64k").finish_non_exhaustive()
    }
}

impl NascomMemory for Memory64k {
    #[inline]
    fn reset(&mut self) {
        self.mem.fill(0);
    }

    #[inline(always)]
    fn read(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    #[inline]
    fn read16(&self, addr: u16) -> u16 {
        let addr = addr as usize;
        u16::from_le_bytes([self.mem[addr], self.mem[addr + 1]])
    }

    #[inline(always)]
    fn write(&mut self, addr: u16, val: u8) {
        self.mem[addr as usize] = val;
        if addr == 0 {
            self.mem[WRAP_SLOT] = val;
        }
    }

    #[inline]
    fn write16(&mut self, addr: u16, val: u16) {
        let [lo, hi] = val.to_le_bytes();
        self.write(addr, lo);
        self.write(addr.wrapping_add(1), hi);
    }

    #[inline]
    fn mem_ref(&self) -> &[u8] {
        &self.mem[..WRAP_SLOT]
    }

    #[inline]
    fn mem_mut(&mut self) -> &mut [u8] {
        &mut self.mem[..WRAP_SLOT]
    }

    #[inline]
    fn sync_wraparound(&mut self) {
        self.mem[WRAP_SLOT] = self.mem[0];
    }
}
