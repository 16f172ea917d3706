/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! **NAS** memory image format.
//!
//! A **NAS** file is a text file with one record per line:
//!
//! ```text
//! 0C80 31 00 10 21 52 0D CD 0C 26
//! 0C88 0D C3 86 0C 00 00 00 00 F6
//! .
//! ```
//!
//! Each record consists of a 4 hex digit address followed by 8 bytes of data, 2 hex digits each.
//! An optional checksum byte may follow: the sum of both address bytes and all data bytes modulo 256.
//! Lines may end with any number of control characters (files produced by the NAS-SYS monitor end
//! them with backspaces). A line starting with `.` terminates the image.
//!
//! Malformed lines are skipped and counted, they never abort loading.
use core::fmt;
use core::ops::RangeInclusive;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use arrayvec::ArrayVec;
use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{space0, space1};
use nom::combinator::{eof, map_res, opt};
use nom::multi::fold_many_m_n;
use nom::sequence::preceded;
use nom::IResult;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use nascom_core::memory::NascomMemory;

/// The number of data bytes in each record.
pub const RECORD_LEN: usize = 8;

/// An error returned by the **NAS** loader and writer.
#[non_exhaustive]
#[derive(Debug)]
pub enum NasError {
    /// The address range to write is empty.
    EmptyRange,
    Io(io::Error)
}

impl std::error::Error for NasError {}

impl fmt::Display for NasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NasError::EmptyRange => f.write_str("the address range is empty"),
            NasError::Io(err) => err.fmt(f)
        }
    }
}

impl From<io::Error> for NasError {
    fn from(err: io::Error) -> Self {
        NasError::Io(err)
    }
}

impl From<NasError> for io::Error {
    fn from(err: NasError) -> Self {
        match err {
            NasError::Io(err) => err,
            e => io::Error::new(io::ErrorKind::InvalidInput, e)
        }
    }
}

/// A single **NAS** record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NasRecord {
    pub address: u16,
    pub data: ArrayVec<u8, RECORD_LEN>,
    /// The checksum found in the record, if any.
    pub checksum: Option<u8>,
}

impl NasRecord {
    /// Creates a record with a computed checksum.
    pub fn new(address: u16, data: ArrayVec<u8, RECORD_LEN>) -> Self {
        let mut record = NasRecord { address, data, checksum: None };
        record.checksum = Some(record.compute_checksum());
        record
    }
    /// Returns the sum of the address bytes and data bytes modulo 256.
    pub fn compute_checksum(&self) -> u8 {
        let [lo, hi] = self.address.to_le_bytes();
        self.data.iter().fold(lo.wrapping_add(hi), |sum, &byte| sum.wrapping_add(byte))
    }
    /// Returns `false` if the record has a checksum that doesn't match its contents.
    pub fn is_checksum_valid(&self) -> bool {
        self.checksum.map_or(true, |checksum| checksum == self.compute_checksum())
    }
    /// Returns the address of the last byte of this record.
    pub fn last_address(&self) -> u16 {
        self.address.wrapping_add(self.data.len().saturating_sub(1) as u16)
    }
    /// Writes record data into `memory`.
    pub fn load_into<M: NascomMemory + ?Sized>(&self, memory: &mut M) {
        for (offset, &byte) in self.data.iter().enumerate() {
            memory.write(self.address.wrapping_add(offset as u16), byte);
        }
    }
}

impl fmt::Display for NasRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.address)?;
        for byte in self.data.iter() {
            write!(f, " {:02X}", byte)?;
        }
        if let Some(checksum) = self.checksum {
            write!(f, " {:02X}", checksum)?;
        }
        Ok(())
    }
}

/// A parsed line of a **NAS** file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NasLine {
    Record(NasRecord),
    /// A line starting with `.`.
    Terminator,
    /// A line with nothing but white space or control characters.
    Blank,
}

/// A summary of a loaded **NAS** image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NasSummary {
    /// The number of records loaded.
    pub records: usize,
    /// The number of bytes written into memory.
    pub bytes: usize,
    /// The number of malformed lines skipped.
    pub skipped: usize,
    /// The number of records loaded despite a checksum mismatch.
    pub bad_checksums: usize,
    /// The lowest address written.
    pub lowest: Option<u16>,
    /// The highest address written.
    pub highest: Option<u16>,
}

impl NasSummary {
    fn add_record(&mut self, record: &NasRecord) {
        self.records += 1;
        self.bytes += record.data.len();
        let last = record.address.saturating_add(record.data.len().saturating_sub(1) as u16);
        self.lowest = Some(self.lowest.map_or(record.address, |lowest| lowest.min(record.address)));
        self.highest = Some(self.highest.map_or(last, |highest| highest.max(last)));
    }
}

impl fmt::Display for NasSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} records, {} bytes", self.records, self.bytes)?;
        if let (Some(lowest), Some(highest)) = (self.lowest, self.highest) {
            write!(f, " at {:04X}-{:04X}", lowest, highest)?;
        }
        if self.skipped != 0 {
            write!(f, ", {} lines skipped", self.skipped)?;
        }
        if self.bad_checksums != 0 {
            write!(f, ", {} bad checksums", self.bad_checksums)?;
        }
        Ok(())
    }
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, is_hex_digit), |s| u8::from_str_radix(s, 16))(input)
}

fn hex_word(input: &str) -> IResult<&str, u16> {
    map_res(take_while_m_n(4, 4, is_hex_digit), |s| u16::from_str_radix(s, 16))(input)
}

fn parse_record(input: &str) -> IResult<&str, NasRecord> {
    let (input, address) = hex_word(input)?;
    let (input, data) = fold_many_m_n(RECORD_LEN, RECORD_LEN,
        preceded(space1, hex_byte),
        ArrayVec::new,
        |mut data: ArrayVec<u8, RECORD_LEN>, byte| {
            data.push(byte);
            data
        })(input)?;
    let (input, checksum) = opt(preceded(space1, hex_byte))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = eof(input)?;
    Ok((input, NasRecord { address, data, checksum }))
}

/// Parses a single line of a **NAS** file.
///
/// Returns `None` if the line is malformed.
pub fn parse_nas_line(line: &str) -> Option<NasLine> {
    let line = line.trim_matches(|c: char| c.is_ascii_control() || c.is_ascii_whitespace());
    if line.is_empty() {
        Some(NasLine::Blank)
    }
    else if line.starts_with('.') {
        Some(NasLine::Terminator)
    }
    else {
        parse_record(line).ok().map(|(_, record)| NasLine::Record(record))
    }
}

/// Reads a **NAS** image from `rd` and writes its contents into `memory`.
///
/// Loading stops at the terminator line or at the end of input. Malformed lines and lines
/// that are not valid UTF-8 are skipped. Records with a bad checksum are loaded anyway.
pub fn load_nas<R: BufRead, M: NascomMemory + ?Sized>(rd: R, memory: &mut M) -> Result<NasSummary, NasError> {
    let mut summary = NasSummary::default();
    for (index, line) in rd.split(b'\n').enumerate() {
        let line = line?;
        let parsed = std::str::from_utf8(&line).ok().and_then(parse_nas_line);
        match parsed {
            Some(NasLine::Record(record)) => {
                if !record.is_checksum_valid() {
                    warn!("nas: line {}: checksum mismatch", index + 1);
                    summary.bad_checksums += 1;
                }
                record.load_into(memory);
                summary.add_record(&record);
            }
            Some(NasLine::Terminator) => break,
            Some(NasLine::Blank) => {}
            None => {
                warn!("nas: line {}: malformed record skipped", index + 1);
                summary.skipped += 1;
            }
        }
    }
    info!("nas: loaded {}", summary);
    Ok(summary)
}

/// Opens a **NAS** file and loads it into `memory`. See [load_nas].
pub fn read_nas_file<P: AsRef<Path>, M: NascomMemory + ?Sized>(path: P, memory: &mut M) -> Result<NasSummary, NasError> {
    let file = File::open(path)?;
    load_nas(BufReader::new(file), memory)
}

/// Writes the contents of `memory` in the given address `range` as a **NAS** image.
///
/// Records always have 8 bytes, so the last record may extend past the end of `range`.
/// Returns the number of records written.
pub fn write_nas<W: Write, M: NascomMemory + ?Sized>(
        mut wr: W,
        memory: &M,
        range: RangeInclusive<u16>
    ) -> Result<usize, NasError>
{
    if range.is_empty() {
        return Err(NasError::EmptyRange)
    }
    let (start, end) = range.into_inner();
    let len = (end - start) as usize + 1;
    let mut records = 0;
    for offset in (0..len).step_by(RECORD_LEN) {
        let address = start.wrapping_add(offset as u16);
        let data = (0..RECORD_LEN as u16).map(|i| memory.read(address.wrapping_add(i))).collect();
        writeln!(wr, "{}", NasRecord::new(address, data))?;
        records += 1;
    }
    writeln!(wr, ".")?;
    wr.flush()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nascom_core::memory::Memory64k;
    use rand::{RngCore, SeedableRng, rngs::SmallRng};

    #[test]
    fn parse_nas_line_works() {
        let record = match parse_nas_line("0C80 31 00 10 21 52 0D CD 0C 26\u{8}\u{8}\r") {
            Some(NasLine::Record(record)) => record,
            res => panic!("unexpected: {:?}", res)
        };
        assert_eq!(record.address, 0x0C80);
        assert_eq!(&record.data[..], &[0x31, 0x00, 0x10, 0x21, 0x52, 0x0D, 0xCD, 0x0C]);
        assert_eq!(record.checksum, Some(0x26));
        assert!(record.is_checksum_valid());
        assert_eq!(record.last_address(), 0x0C87);
        assert_eq!(record.to_string(), "0C80 31 00 10 21 52 0D CD 0C 26");
        let record = match parse_nas_line("fffe 01 02 03 04 05 06 07 08") {
            Some(NasLine::Record(record)) => record,
            res => panic!("unexpected: {:?}", res)
        };
        assert_eq!(record.address, 0xFFFE);
        assert_eq!(record.checksum, None);
        assert!(record.is_checksum_valid());
        assert_eq!(parse_nas_line(".\r"), Some(NasLine::Terminator));
        assert_eq!(parse_nas_line(" \u{8}\r"), Some(NasLine::Blank));
        assert_eq!(parse_nas_line("0C80 31 00 10 21 52 0D CD"), None);
        assert_eq!(parse_nas_line("0C80 31 00 10 21 52 0D CD 0C 5A 00"), None);
        assert_eq!(parse_nas_line("0C8 31 00 10 21 52 0D CD 0C"), None);
        assert_eq!(parse_nas_line("0C80 310 00 10 21 52 0D CD 0C"), None);
        assert_eq!(parse_nas_line("ZZZZ 31 00 10 21 52 0D CD 0C"), None);
        assert_eq!(parse_nas_line("0C80 31 00 10 21 52 0D CD 0C 5"), None);
    }

    #[test]
    fn load_nas_works() {
        let image = "0C80 31 00 10 21 52 0D CD 0C 26\u{8}\u{8}\r\n\
                     garbage\r\n\
                     \r\n\
                     0C88 0D C3 86 0C 00 00 00 00 00\u{8}\u{8}\r\n\
                     FFF8 01 02 03 04 05 06 07 08\n\
                     0000 AA 00 00 00 00 00 00 00\n\
                     .\r\n\
                     0D00 FF FF FF FF FF FF FF FF\r\n";
        let mut mem = Memory64k::default();
        let summary = load_nas(image.as_bytes(), &mut mem).unwrap();
        assert_eq!(summary, NasSummary {
            records: 4,
            bytes: 32,
            skipped: 1,
            bad_checksums: 1,
            lowest: Some(0x0000),
            highest: Some(0xFFFF)
        });
        assert_eq!(mem.read16(0x0C80), 0x0031);
        assert_eq!(mem.read(0x0C89), 0xC3);
        assert_eq!(mem.read(0x0D00), 0x00);
        assert_eq!(mem.read16(0xFFFF), 0xAA08);
        assert_eq!(summary.to_string(), "4 records, 32 bytes at 0000-FFFF, 1 lines skipped, 1 bad checksums");
    }

    #[test]
    fn load_nas_skips_invalid_utf8() {
        let mut image = b"0C80 31 00 10 21 52 0D CD 0C\n".to_vec();
        image.extend_from_slice(b"\xFF\xFE\n0C88 01 02 03 04 05 06 07 08");
        let mut mem = Memory64k::default();
        let summary = load_nas(&image[..], &mut mem).unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(mem.read(0x0C8F), 8);
    }

    #[test]
    fn write_nas_loads_back() {
        let mut rng = SmallRng::seed_from_u64(0x0C80);
        let mut mem = Memory64k::default();
        rng.fill_bytes(&mut mem.mem_mut()[0x1000..0x1100]);
        let mut out = Vec::new();
        assert_eq!(write_nas(&mut out, &mem, 0x1000..=0x10FC).unwrap(), 32);
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("\n.\n"));
        assert_eq!(text.lines().count(), 33);
        let mut copy = Memory64k::default();
        let summary = load_nas(text.as_bytes(), &mut copy).unwrap();
        assert_eq!(summary.records, 32);
        assert_eq!(summary.bad_checksums, 0);
        assert_eq!(&copy.mem_ref()[0x1000..0x1100], &mem.mem_ref()[0x1000..0x1100]);
        #[allow(clippy::reversed_empty_ranges)]
        let empty = 0x10..=0x0F;
        assert!(matches!(write_nas(&mut Vec::new(), &mem, empty), Err(NasError::EmptyRange)));
    }
}
