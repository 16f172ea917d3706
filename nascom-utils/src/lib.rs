//! Various helper utilities for emulators based on NASCOM: The NASCOM-2 emulator library.
pub mod keyboard;
pub mod screen;
