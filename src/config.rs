/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Emulator configuration.
use core::time::Duration;
use std::path::PathBuf;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

#[cfg(not(target_arch = "wasm32"))]
use crate::chip::CadenceController;
#[cfg(feature = "peripherals")]
use crate::peripherals::tape::{TapeDevice, TapeFile};

/// The emulator configuration.
///
/// With the `snapshot` feature enabled it can be stored in any format supported by [serde].
/// Missing fields take their default values.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "snapshot", serde(rename_all = "camelCase", default))]
pub struct NascomConfig {
    /// The number of instructions executed in each batch.
    pub instructions_per_batch: u32,
    /// The number of batches that should be executed in each second of real time.
    pub target_batches_per_second: u32,
    /// The inter-batch delay used before the first measurement window completes.
    pub initial_delay_ms: u64,
    /// A file played back by the tape.
    pub tape_input: Option<PathBuf>,
    /// A file the tape records to.
    pub tape_output: Option<PathBuf>,
    /// Memory images loaded in order at startup.
    pub images: Vec<PathBuf>,
    /// The program counter after startup, the reset vector if `None`.
    pub start_address: Option<u16>,
}

impl Default for NascomConfig {
    fn default() -> Self {
        NascomConfig {
            instructions_per_batch: 4000,
            target_batches_per_second: 50,
            initial_delay_ms: 10,
            tape_input: None,
            tape_output: None,
            images: Vec::new(),
            start_address: None
        }
    }
}

impl NascomConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
    /// Creates a cadence controller. Zero batch parameters are treated as `1`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn cadence(&self) -> CadenceController {
        CadenceController::new(self.instructions_per_batch.max(1),
                               self.target_batches_per_second.max(1),
                               self.initial_delay())
    }
    /// Creates a tape device bound to the configured files.
    #[cfg(feature = "peripherals")]
    pub fn tape_device(&self) -> TapeDevice<TapeFile, TapeFile> {
        TapeDevice::new(self.tape_input.as_ref().map(TapeFile::new),
                        self.tape_output.as_ref().map(TapeFile::new))
    }
}
