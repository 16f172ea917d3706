/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A passthrough debugging device.
use core::num::NonZeroU16;
use core::fmt::Debug;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

use nascom_core::bus::BusDevice;

/// A passthrough [BusDevice] that outputs I/O data read and written by CPU using [log] `debug`.
///
/// Ports not claimed by any downstream device are logged as well, together with the value
/// the CPU will see.
#[derive(Clone, Default, Debug)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct DebugBusDevice<D> {
    #[cfg_attr(feature = "snapshot", serde(default))]
    bus: D,
}

impl<D> DebugBusDevice<D> {
    pub fn new(bus: D) -> Self {
        DebugBusDevice { bus }
    }
}

impl<D: BusDevice> BusDevice for DebugBusDevice<D>
    where D::Timestamp: Debug + Copy
{
    type Timestamp = D::Timestamp;
    type NextDevice = D;

    fn next_device_mut(&mut self) -> &mut Self::NextDevice {
        &mut self.bus
    }
    fn next_device_ref(&self) -> &Self::NextDevice {
        &self.bus
    }
    fn into_next_device(self) -> Self::NextDevice {
        self.bus
    }
    fn read_io(&mut self, port: u16, timestamp: Self::Timestamp) -> Option<(u8, Option<NonZeroU16>)> {
        let res = self.bus.read_io(port, timestamp);
        match res {
            Some((data, _)) => debug!("read_io: {:04x} {:02x} {:?}", port, data, timestamp),
            None => debug!("read_io: {:04x} unclaimed {:?}", port, timestamp)
        }
        res
    }
    fn write_io(&mut self, port: u16, data: u8, timestamp: Self::Timestamp) -> Option<u16> {
        debug!("write_io: {:04x} {:02x} {:?}", port, data, timestamp);
        self.bus.write_io(port, data, timestamp)
    }
}
