/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NASCOM-2 cassette tape interface.
//!
//! Tape data is exchanged byte by byte through the UART. The tape media are plain byte streams:
//! an input stream that is played back in a loop and an output stream that is only appended to.
//!
//! Streams are opened when the tape motor is switched on and closed when it is switched off.
//! Failures to open, read or write a stream are logged and otherwise ignored: the guest simply
//! sees no data.
use core::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

mod media;
pub use media::*;

/// A source of the tape input stream.
pub trait TapeInput {
    type Reader: Read + Seek;
    /// Opens a new stream positioned at the start of the tape.
    fn open_input(&mut self) -> io::Result<Self::Reader>;
}

/// A sink of the tape output stream.
pub trait TapeOutput {
    type Writer: Write;
    /// Opens a new stream appending to any previously recorded data.
    fn open_output(&mut self) -> io::Result<Self::Writer>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapeState {
    Idle,
    Playing,
    Recording,
    PlayingAndRecording
}

struct InputStream<R> {
    reader: R,
    position: u64,
    len: u64,
}

impl<R: Read + Seek> InputStream<R> {
    fn new(mut reader: R) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(InputStream { reader, position: 0, len })
    }

    #[inline]
    fn has_data(&self) -> bool {
        self.position < self.len
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        if !self.has_data() {
            self.reader.seek(SeekFrom::Start(0))?;
            self.position = 0;
        }
        let mut byte = [0u8];
        self.reader.read_exact(&mut byte)?;
        self.position += 1;
        Ok(byte[0])
    }
}

/// The tape recorder emulator.
///
/// `I` is a [TapeInput] providing the played back data and `O` is a [TapeOutput] receiving the
/// recorded data. Both are optional and can be bound or replaced at any time.
pub struct TapeDevice<I: TapeInput = TapeFile, O: TapeOutput = TapeFile> {
    motor_on: bool,
    input: Option<I>,
    output: Option<O>,
    reader: Option<InputStream<I::Reader>>,
    writer: Option<O::Writer>,
}

impl<I: TapeInput, O: TapeOutput> Default for TapeDevice<I, O> {
    fn default() -> Self {
        TapeDevice { motor_on: false, input: None, output: None, reader: None, writer: None }
    }
}

impl<I: TapeInput, O: TapeOutput> fmt::Debug for TapeDevice<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapeDevice")
         .field("motor_on", &self.motor_on)
         .field("state", &self.state())
         .field("input_bound", &self.input.is_some())
         .field("output_bound", &self.output.is_some())
         .finish()
    }
}

impl<I: TapeInput, O: TapeOutput> TapeDevice<I, O> {
    pub fn new(input: Option<I>, output: Option<O>) -> Self {
        TapeDevice { input, output, ..Default::default() }
    }
    /// Binds a new input media, returning the previous one.
    ///
    /// An open input stream is closed, the new media is opened on the next motor-on.
    pub fn bind_input(&mut self, input: I) -> Option<I> {
        if self.reader.take().is_some() {
            debug!("tape: input stream closed on rebind");
        }
        self.input.replace(input)
    }
    /// Binds a new output media, returning the previous one.
    ///
    /// An open output stream is flushed and closed, the new media is opened on the next motor-on.
    pub fn bind_output(&mut self, output: O) -> Option<O> {
        self.close_output();
        self.output.replace(output)
    }
    /// Removes the input media.
    pub fn unbind_input(&mut self) -> Option<I> {
        self.reader = None;
        self.input.take()
    }
    /// Removes the output media.
    pub fn unbind_output(&mut self) -> Option<O> {
        self.close_output();
        self.output.take()
    }
    pub fn input_ref(&self) -> Option<&I> {
        self.input.as_ref()
    }
    pub fn output_ref(&self) -> Option<&O> {
        self.output.as_ref()
    }
    #[inline]
    pub fn is_motor_on(&self) -> bool {
        self.motor_on
    }
    /// Switches the motor on and opens the bound media. Does nothing if the motor is already on.
    pub fn start_motor(&mut self) {
        if !self.motor_on {
            self.motor_on = true;
            debug!("tape: motor on");
            self.open();
        }
    }
    /// Closes the open streams and switches the motor off. Does nothing if the motor is already off.
    pub fn stop_motor(&mut self) {
        if self.motor_on {
            self.close();
            self.motor_on = false;
            debug!("tape: motor off");
        }
    }
    /// Opens streams of the bound media that are not already open.
    pub fn open(&mut self) {
        if self.reader.is_none() {
            if let Some(input) = self.input.as_mut() {
                match input.open_input().and_then(InputStream::new) {
                    Ok(stream) => {
                        debug!("tape: input opened, {} bytes", stream.len);
                        self.reader = Some(stream);
                    }
                    Err(err) => warn!("tape: could not open input: {}", err)
                }
            }
        }
        if self.writer.is_none() {
            if let Some(output) = self.output.as_mut() {
                match output.open_output() {
                    Ok(writer) => {
                        debug!("tape: output opened");
                        self.writer = Some(writer);
                    }
                    Err(err) => warn!("tape: could not open output: {}", err)
                }
            }
        }
    }
    /// Closes the open streams, flushing the output.
    pub fn close(&mut self) {
        self.reader = None;
        self.close_output();
    }
    /// Returns `true` if an input stream is open and has unread bytes remaining.
    #[inline]
    pub fn has_data(&self) -> bool {
        self.reader.as_ref().map_or(false, InputStream::has_data)
    }
    /// Returns the next byte from the input stream.
    ///
    /// When the stream is exhausted playback restarts from the beginning. Returns `0` if the motor
    /// is off, no input stream is open, the input is empty or an error occurs.
    pub fn read_byte(&mut self) -> u8 {
        if !self.motor_on {
            return 0
        }
        let stream = match self.reader.as_mut() {
            Some(stream) if stream.len != 0 => stream,
            _ => return 0
        };
        if !stream.has_data() {
            debug!("tape: input exhausted, rewinding");
        }
        match stream.read_byte() {
            Ok(byte) => byte,
            Err(err) => {
                warn!("tape: read failed, input closed: {}", err);
                self.reader = None;
                0
            }
        }
    }
    /// Appends a byte to the output stream.
    ///
    /// The byte is dropped if the motor is off, no output stream is open or an error occurs.
    pub fn write_byte(&mut self, data: u8) {
        if !self.motor_on {
            trace!("tape: byte {:02x} dropped, motor off", data);
            return
        }
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writer.write_all(&[data]) {
                warn!("tape: write failed, output closed: {}", err);
                self.writer = None;
            }
        }
    }
    /// Flushes the output stream.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(err) = writer.flush() {
                warn!("tape: flush failed, output closed: {}", err);
                self.writer = None;
            }
        }
    }
    pub fn state(&self) -> TapeState {
        match (self.reader.is_some(), self.writer.is_some()) {
            (false, false) => TapeState::Idle,
            (true, false) => TapeState::Playing,
            (false, true) => TapeState::Recording,
            (true, true) => TapeState::PlayingAndRecording
        }
    }

    fn close_output(&mut self) {
        self.flush();
        self.writer = None;
    }
}
