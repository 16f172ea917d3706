/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! T-state timestamp types and counters.
pub use z80emu::host::TsCounter;

/// A linear T-state timestamp type.
pub type FTs = i32;
