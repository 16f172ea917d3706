/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! System bus device emulators to be used with the NASCOM control unit.
pub mod debug;
pub mod scan;
