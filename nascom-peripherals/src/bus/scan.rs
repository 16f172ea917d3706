/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The NASCOM-2 keyboard and tape UART ports as a [BusDevice].
//!
//! ```text
//! port  read                         write
//!  0    inverted keyboard row        control: b0 advance row, b1 reset scan, b4 tape motor
//!  1    UART data (tape input)       UART data (tape output)
//!  2    UART status                  -
//! ```
//!
//! The scan advances on the rising edge of bit 0. Bit 1 resets the scan whenever it is set,
//! taking priority over an advance in the same write. The tape motor follows the edges of bit 4.
use core::num::NonZeroU16;
use core::fmt;

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use nascom_core::{
    bus::{BusDevice, NullDevice, PortAddress},
    clock::FTs
};

use crate::keyboard::{KeyboardHandle, KeyMatrix};
use crate::tape::{TapeDevice, TapeFile, TapeInput, TapeOutput};

bitflags! {
    /// Bits of the value written to the keyboard control port.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ControlFlags: u8 {
        const KBD_ADVANCE = 0b0000_0001;
        const KBD_RESET   = 0b0000_0010;
        const TAPE_MOTOR  = 0b0001_0000;
    }
}

bitflags! {
    /// Bits of the value read from the UART status port.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct UartStatus: u8 {
        const TX_EMPTY   = 0b0100_0000;
        const DATA_READY = 0b1000_0000;
    }
}

impl From<u8> for ControlFlags {
    fn from(flags: u8) -> Self {
        ControlFlags::from_bits_retain(flags)
    }
}

impl From<ControlFlags> for u8 {
    fn from(flags: ControlFlags) -> Self {
        flags.bits()
    }
}

#[derive(Clone, Copy, Default, Debug)]
struct KeyboardPortAddress;
impl PortAddress for KeyboardPortAddress {
    const ADDRESS_BITS: u16 = 0x0000;
}

#[derive(Clone, Copy, Default, Debug)]
struct UartDataPortAddress;
impl PortAddress for UartDataPortAddress {
    const ADDRESS_BITS: u16 = 0x0001;
}

#[derive(Clone, Copy, Default, Debug)]
struct UartStatusPortAddress;
impl PortAddress for UartStatusPortAddress {
    const ADDRESS_BITS: u16 = 0x0002;
}

/// Translates the guest's port traffic into keyboard scan and tape events.
///
/// Reads from ports not handled by this device are forwarded to the next device in the chain.
/// With [ScanProtocolController::set_trace_io] enabled every access to ports `0`, `1` and `2`
/// is logged at the debug level.
pub struct ScanProtocolController<I: TapeInput = TapeFile, O: TapeOutput = TapeFile, D = NullDevice<FTs>> {
    /// Provides a direct access to the keyboard matrix.
    pub keyboard: KeyMatrix,
    /// Provides a direct access to the tape device.
    pub tape: TapeDevice<I, O>,
    control: ControlFlags,
    trace_io: bool,
    bus: D
}

impl<I: TapeInput, O: TapeOutput, D: Default> Default for ScanProtocolController<I, O, D> {
    fn default() -> Self {
        ScanProtocolController {
            keyboard: KeyMatrix::default(),
            tape: TapeDevice::default(),
            control: ControlFlags::empty(),
            trace_io: false,
            bus: D::default()
        }
    }
}

impl<I: TapeInput, O: TapeOutput, D: fmt::Debug> fmt::Debug for ScanProtocolController<I, O, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanProtocolController")
         .field("keyboard", &self.keyboard)
         .field("tape", &self.tape)
         .field("control", &self.control)
         .field("trace_io", &self.trace_io)
         .field("bus", &self.bus)
         .finish()
    }
}

impl<I: TapeInput, O: TapeOutput, D> ScanProtocolController<I, O, D> {
    pub fn new(tape: TapeDevice<I, O>, bus: D) -> Self {
        ScanProtocolController {
            keyboard: KeyMatrix::default(),
            tape,
            control: ControlFlags::empty(),
            trace_io: false,
            bus
        }
    }
    /// Returns a new handle to the live keyboard state.
    pub fn keyboard_handle(&self) -> KeyboardHandle {
        self.keyboard.handle()
    }
    /// Enables or disables logging of the keyboard and UART port traffic.
    pub fn set_trace_io(&mut self, trace_io: bool) {
        self.trace_io = trace_io;
    }
    pub fn is_tracing_io(&self) -> bool {
        self.trace_io
    }
    /// Returns the last value written to the control port.
    pub fn control(&self) -> ControlFlags {
        self.control
    }
    /// Handles a value written to the keyboard control port.
    pub fn write_control(&mut self, data: u8) {
        let control = ControlFlags::from_bits_retain(data);
        let rising = control & !self.control;
        let falling = self.control & !control;
        self.control = control;
        if control.contains(ControlFlags::KBD_RESET) {
            self.keyboard.reset_scan();
        }
        else if rising.contains(ControlFlags::KBD_ADVANCE) {
            self.keyboard.advance_scan();
        }
        if rising.contains(ControlFlags::TAPE_MOTOR) {
            self.tape.start_motor();
        }
        else if falling.contains(ControlFlags::TAPE_MOTOR) {
            self.tape.stop_motor();
        }
    }
    /// Returns the value the guest reads from the keyboard port: the current row, inverted.
    #[inline]
    pub fn read_keyboard(&self) -> u8 {
        !self.keyboard.current_byte()
    }
    /// Returns the value the guest reads from the UART status port.
    pub fn read_status(&self) -> UartStatus {
        let mut status = UartStatus::TX_EMPTY;
        status.set(UartStatus::DATA_READY, self.tape.is_motor_on() && self.tape.has_data());
        status
    }
    /// Returns the value the guest reads from the UART data port.
    pub fn read_data(&mut self) -> u8 {
        if self.tape.is_motor_on() && self.tape.has_data() {
            self.tape.read_byte()
        }
        else {
            0
        }
    }
}

impl<I, O, D> BusDevice for ScanProtocolController<I, O, D>
    where I: TapeInput,
          O: TapeOutput,
          D: BusDevice<Timestamp=FTs>
{
    type Timestamp = FTs;
    type NextDevice = D;

    #[inline]
    fn next_device_mut(&mut self) -> &mut Self::NextDevice {
        &mut self.bus
    }
    #[inline]
    fn next_device_ref(&self) -> &Self::NextDevice {
        &self.bus
    }
    #[inline]
    fn into_next_device(self) -> Self::NextDevice {
        self.bus
    }
    fn reset(&mut self, timestamp: Self::Timestamp) {
        self.tape.stop_motor();
        self.control = ControlFlags::empty();
        self.keyboard.reset_scan();
        self.bus.reset(timestamp);
    }
    fn next_batch(&mut self, timestamp: Self::Timestamp) {
        self.tape.flush();
        self.bus.next_batch(timestamp);
    }
    fn read_io(&mut self, port: u16, timestamp: Self::Timestamp) -> Option<(u8, Option<NonZeroU16>)> {
        let data = if KeyboardPortAddress::match_port(port) {
            self.read_keyboard()
        }
        else if UartDataPortAddress::match_port(port) {
            self.read_data()
        }
        else if UartStatusPortAddress::match_port(port) {
            self.read_status().bits()
        }
        else {
            return self.bus.read_io(port, timestamp)
        };
        if self.trace_io {
            debug!("read_io: {:04x} {:02x} {:?}", port, data, timestamp);
        }
        Some((data, None))
    }
    fn write_io(&mut self, port: u16, data: u8, timestamp: Self::Timestamp) -> Option<u16> {
        if KeyboardPortAddress::match_port(port) {
            self.write_control(data);
        }
        else if UartDataPortAddress::match_port(port) {
            self.tape.write_byte(data);
        }
        else {
            return self.bus.write_io(port, data, timestamp)
        }
        if self.trace_io {
            debug!("write_io: {:04x} {:02x} {:?}", port, data, timestamp);
        }
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::{KeyChord, KeyCoord, MATRIX_ROWS};
    use crate::tape::TapeBuffer;

    type TestController = ScanProtocolController<TapeBuffer, TapeBuffer, NullDevice<FTs>>;

    #[test]
    fn control_flags_works() {
        let flags = ControlFlags::from(0xFF);
        assert!(flags.contains(ControlFlags::all()));
        assert_eq!(u8::from(flags), 0xFF);
        assert_eq!(ControlFlags::from_bits_truncate(0xFF).bits(), 0b0001_0011);
    }

    #[test]
    fn scan_advances_on_rising_edge() {
        let mut ctrl = TestController::default();
        ctrl.write_io(0, 0x02, 0);
        assert_eq!(ctrl.keyboard.cursor(), 0);
        ctrl.write_io(0, 0x00, 0);
        ctrl.write_io(0, 0x01, 0);
        assert_eq!(ctrl.keyboard.cursor(), 1);
        ctrl.write_io(0, 0x01, 0);
        assert_eq!(ctrl.keyboard.cursor(), 1);
        ctrl.write_io(0, 0x00, 0);
        ctrl.write_io(0xFF00, 0x01, 0);
        assert_eq!(ctrl.keyboard.cursor(), 2);
        ctrl.write_io(0, 0x00, 0);
        ctrl.write_io(0, 0x03, 0);
        assert_eq!(ctrl.keyboard.cursor(), 0);
        ctrl.write_io(0, 0x01, 0);
        assert_eq!(ctrl.keyboard.cursor(), 0);
        ctrl.write_io(0, 0x00, 0);
        ctrl.write_io(0, 0x01, 0);
        assert_eq!(ctrl.keyboard.cursor(), 1);
        ctrl.write_io(0, 0x03, 0);
        ctrl.write_io(0, 0x02, 0);
        assert_eq!(ctrl.keyboard.cursor(), 0);
    }

    #[test]
    fn keyboard_port_reads_inverted_rows() {
        let mut ctrl = TestController::default();
        let handle = ctrl.keyboard_handle();
        handle.apply_chord(KeyChord::shifted(KeyCoord::new(4, 4)), true);
        ctrl.write_io(0, 0x02, 0);
        ctrl.write_io(0, 0x00, 0);
        let mut rows = Vec::new();
        for _ in 0..MATRIX_ROWS {
            rows.push(ctrl.read_io(0, 0).unwrap().0);
            ctrl.write_io(0, 0x01, 0);
            ctrl.write_io(0, 0x00, 0);
        }
        assert_eq!(rows, [!0x10, 0xFF, 0xFF, 0xFF, !0x10, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn uart_follows_tape_motor() {
        let output = TapeBuffer::default();
        let tape = TapeDevice::new(Some(TapeBuffer::from(vec![0xE5, 0x0D])), Some(output.clone()));
        let mut ctrl: TestController = ScanProtocolController::new(tape, NullDevice::default());
        assert_eq!(ctrl.read_io(2, 0), Some((0x40, None)));
        assert_eq!(ctrl.read_io(1, 0), Some((0, None)));
        ctrl.write_io(1, 0x77, 0);
        ctrl.write_io(0, 0x10, 0);
        assert!(ctrl.tape.is_motor_on());
        assert_eq!(ctrl.read_io(2, 0), Some((0xC0, None)));
        assert_eq!(ctrl.read_io(1, 0), Some((0xE5, None)));
        assert_eq!(ctrl.read_io(1, 0), Some((0x0D, None)));
        assert_eq!(ctrl.read_io(2, 0), Some((0x40, None)));
        assert_eq!(ctrl.read_io(1, 0), Some((0, None)));
        ctrl.tape.read_byte();
        assert_eq!(ctrl.read_io(2, 0), Some((0xC0, None)));
        assert_eq!(ctrl.read_io(1, 0), Some((0x0D, None)));
        ctrl.write_io(1, 0x3E, 0);
        ctrl.write_io(0, 0x11, 0);
        assert!(ctrl.tape.is_motor_on());
        ctrl.write_io(0, 0x00, 0);
        assert!(!ctrl.tape.is_motor_on());
        ctrl.write_io(1, 0x00, 0);
        assert_eq!(output.contents(), [0x3E]);
        ctrl.write_io(0, 0x10, 0);
        assert_eq!(ctrl.read_io(1, 0), Some((0xE5, None)));
        ctrl.reset(0);
        assert!(!ctrl.tape.is_motor_on());
        assert_eq!(ctrl.control(), ControlFlags::empty());
    }

    #[test]
    fn unclaimed_ports_are_forwarded() {
        let mut ctrl = TestController::default();
        assert_eq!(ctrl.read_io(3, 0), None);
        assert_eq!(ctrl.read_io(0x00FE, 0), None);
        assert_eq!(ctrl.write_io(2, 0xFF, 0), None);
        ctrl.next_batch(0);
    }

    #[test]
    fn port_trace_keeps_port_behavior() {
        let output = TapeBuffer::default();
        let tape = TapeDevice::new(Some(TapeBuffer::from(vec![0xE5])), Some(output.clone()));
        let mut ctrl: TestController = ScanProtocolController::new(tape, NullDevice::default());
        assert!(!ctrl.is_tracing_io());
        ctrl.set_trace_io(true);
        assert!(ctrl.is_tracing_io());
        assert_eq!(ctrl.read_io(0, 0), Some((0xFF, None)));
        assert_eq!(ctrl.write_io(0, 0x10, 0), Some(0));
        assert_eq!(ctrl.control(), ControlFlags::TAPE_MOTOR);
        assert_eq!(ctrl.read_io(2, 0), Some((0xC0, None)));
        assert_eq!(ctrl.read_io(1, 0), Some((0xE5, None)));
        assert_eq!(ctrl.write_io(1, 0x42, 0), Some(0));
        assert_eq!(ctrl.read_io(3, 0), None);
        assert_eq!(ctrl.write_io(2, 0xFF, 0), None);
        ctrl.write_io(0, 0x00, 0);
        assert_eq!(output.contents(), [0x42]);
        ctrl.set_trace_io(false);
        assert!(!ctrl.is_tracing_io());
    }
}
