/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    NASCOM is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    NASCOM is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
//! A library for building emulators of the NASCOM-2 computer.
//!
//! The Z80 CPU is emulated by [z80emu]. This library provides the rest of the machine: the
//! memory, the keyboard matrix and its scan protocol, the cassette tape interface, the character
//! video window renderer and the batch pacing of the emulation loop.
pub mod chip;
pub mod config;
pub mod video;

pub use nascom_core::{bus, clock, memory, z80emu};

#[cfg(feature = "formats")]
pub use nascom_formats as formats;

#[cfg(feature = "peripherals")]
pub use nascom_peripherals as peripherals;
