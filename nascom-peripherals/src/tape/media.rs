/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{TapeInput, TapeOutput};

/// A tape media backed by a file on the host file system.
///
/// As an input, the file is opened read-only. As an output, the file is created if it does not
/// exist and new data is appended to its end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TapeFile {
    path: PathBuf
}

impl TapeFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        TapeFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TapeInput for TapeFile {
    type Reader = BufReader<File>;

    fn open_input(&mut self) -> io::Result<Self::Reader> {
        File::open(&self.path).map(BufReader::new)
    }
}

impl TapeOutput for TapeFile {
    type Writer = BufWriter<File>;

    fn open_output(&mut self) -> io::Result<Self::Writer> {
        OpenOptions::new().create(true).append(true).open(&self.path).map(BufWriter::new)
    }
}

/// A tape media kept in memory, shared between clones.
///
/// As an input, the contents at the time of opening are played back. As an output, new data
/// is appended to the shared contents.
#[derive(Clone, Debug, Default)]
pub struct TapeBuffer(Arc<Mutex<Vec<u8>>>);

impl From<Vec<u8>> for TapeBuffer {
    fn from(data: Vec<u8>) -> Self {
        TapeBuffer(Arc::new(Mutex::new(data)))
    }
}

impl TapeBuffer {
    /// Returns a copy of the current contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TapeInput for TapeBuffer {
    type Reader = Cursor<Vec<u8>>;

    fn open_input(&mut self) -> io::Result<Self::Reader> {
        Ok(Cursor::new(self.contents()))
    }
}

impl TapeOutput for TapeBuffer {
    type Writer = TapeBufferWriter;

    fn open_output(&mut self) -> io::Result<Self::Writer> {
        Ok(TapeBufferWriter(self.clone()))
    }
}

/// Appends to a [TapeBuffer].
#[derive(Debug)]
pub struct TapeBufferWriter(TapeBuffer);

impl Write for TapeBufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
