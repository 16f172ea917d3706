/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Chipset emulation building blocks and implementations.
#[cfg(feature = "peripherals")]
mod nascom;

#[cfg(feature = "peripherals")]
pub use self::nascom::*;
pub use nascom_core::chip::*;
