/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Memory API.
use core::fmt;
use core::ops::{Bound, Range, RangeBounds};
use std::io::{self, Read};

mod single_page;
#[cfg(feature = "snapshot")]
pub mod serde;

pub use single_page::*;

/// An error returned by the memory loading and filling methods.
#[non_exhaustive]
#[derive(Debug)]
pub enum MemoryError {
    UnsupportedAddressRange,
    Io(io::Error)
}

impl std::error::Error for MemoryError {}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", match self {
            MemoryError::UnsupportedAddressRange => "Address range is not supported",
            MemoryError::Io(err) => return err.fmt(f)
        })
    }
}

impl From<MemoryError> for io::Error {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Io(err) => err,
            e => io::Error::new(io::ErrorKind::InvalidInput, e)
        }
    }
}

impl From<io::Error> for MemoryError {
    fn from(err: io::Error) -> Self {
        MemoryError::Io(err)
    }
}

pub type Result<T> = core::result::Result<T, MemoryError>;

/// A trait for interfacing the NASCOM's flat 64kb address space.
///
/// The address space is modelled with one extra byte past `0xFFFF` which always
/// holds the value at address `0`, so a 16-bit read at `0xFFFF` wraps around
/// without special casing.
pub trait NascomMemory {
    /// The last available memory address.
    const RAMTOP: u16 = 0xFFFF;

    /// Clears the whole address space.
    fn reset(&mut self);
    fn read(&self, addr: u16) -> u8;
    /// Reads a little-endian 16-bit word, wrapping around the end of the address space.
    fn read16(&self, addr: u16) -> u16;
    /// Writes a byte and keeps the wrap-around slot in sync with address `0`.
    fn write(&mut self, addr: u16, val: u8);
    /// Writes a little-endian 16-bit word, wrapping around the end of the address space.
    fn write16(&mut self, addr: u16, val: u16);
    /// Returns a slice of the whole address space, excluding the wrap-around slot.
    fn mem_ref(&self) -> &[u8];
    /// Returns a mutable slice of the whole address space, excluding the wrap-around slot.
    ///
    /// Callers that modify address `0` through this slice must call
    /// [NascomMemory::sync_wraparound] afterwards.
    fn mem_mut(&mut self) -> &mut [u8];
    /// Copies the value at address `0` into the wrap-around slot.
    fn sync_wraparound(&mut self);
    /// Reads data from `rd` into the given address range.
    fn load_into_mem<A: RangeBounds<u16>, R: Read>(&mut self, address_range: A, mut rd: R) -> Result<()> {
        let range = normalize_address_range(address_range, 0, Self::RAMTOP)
                    .map_err(|_| MemoryError::UnsupportedAddressRange)?;
        rd.read_exact(&mut self.mem_mut()[range])?;
        self.sync_wraparound();
        Ok(())
    }
    /// Fills the given address range with the data produced by the closure F.
    ///
    /// Usefull to fill RAM with random bytes.
    fn fill_mem<A, F>(&mut self, address_range: A, mut f: F) -> Result<()>
        where A: RangeBounds<u16>, F: FnMut() -> u8
    {
        let range = normalize_address_range(address_range, 0, Self::RAMTOP)
                    .map_err(|_| MemoryError::UnsupportedAddressRange)?;
        for p in self.mem_mut()[range].iter_mut() {
            *p = f()
        }
        self.sync_wraparound();
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AddressRangeError {
    StartBoundTooLow,
    EndBoundTooHigh
}

fn normalize_address_range<R: RangeBounds<u16>>(
        range: R,
        min_inclusive: u16,
        max_inclusive: u16
    ) -> core::result::Result<Range<usize>, AddressRangeError>
{
    let start = match range.start_bound() {
        Bound::Included(start) => if *start < min_inclusive {
                return Err(AddressRangeError::StartBoundTooLow)
            } else { *start as usize },
        Bound::Excluded(start) => if *start < min_inclusive.saturating_sub(1) {
                return Err(AddressRangeError::StartBoundTooLow)
            } else { *start as usize + 1 },
        Bound::Unbounded => min_inclusive as usize
    };
    let end = match range.end_bound() {
        Bound::Included(end) => if *end > max_inclusive {
                return Err(AddressRangeError::EndBoundTooHigh)
            } else { *end as usize + 1},
        Bound::Excluded(end) => if *end > max_inclusive.saturating_add(1) {
                return Err(AddressRangeError::EndBoundTooHigh)
            } else { *end as usize },
        Bound::Unbounded => max_inclusive as usize + 1
    };
    Ok(start..end.max(start))
}
