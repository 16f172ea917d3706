/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Chipset emulation building blocks.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(not(target_arch = "wasm32"))]
mod cadence;
#[cfg(not(target_arch = "wasm32"))]
pub use cadence::*;

/// The result of executing a single batch of instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatchOutcome {
    /// All requested instructions were executed.
    Completed {
        /// The number of instructions executed.
        executed: u32
    },
    /// The batch was interrupted by a [ModeRequest] before all instructions were executed.
    Yielded {
        /// The number of instructions executed before yielding.
        executed: u32
    },
}

impl BatchOutcome {
    /// Returns the number of instructions executed.
    #[inline]
    pub fn executed(self) -> u32 {
        match self {
            BatchOutcome::Completed { executed }|BatchOutcome::Yielded { executed } => executed
        }
    }
    /// Returns `true` if the batch was interrupted by a mode request.
    #[inline]
    pub fn is_yielded(self) -> bool {
        matches!(self, BatchOutcome::Yielded {..})
    }
}

/// A flag raised by the host to make the emulation loop yield control between two instructions.
///
/// Clones share the same flag, so one clone can be given to another thread.
#[derive(Clone, Debug, Default)]
pub struct ModeRequest(Arc<AtomicBool>);

impl ModeRequest {
    pub fn new() -> Self {
        Self::default()
    }
    /// Requests the emulation loop to yield.
    #[inline]
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst)
    }
    /// Withdraws a pending request.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst)
    }
    /// Returns `true` if a request is pending.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
    /// Returns `true` if a request was pending and clears it.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_request_works() {
        let mode = ModeRequest::new();
        let remote = mode.clone();
        assert!(!mode.is_requested());
        std::thread::spawn(move || remote.request()).join().unwrap();
        assert!(mode.is_requested());
        assert!(mode.take());
        assert!(!mode.take());
        mode.request();
        mode.clear();
        assert!(!mode.is_requested());
    }

    #[test]
    fn batch_outcome_works() {
        assert_eq!(BatchOutcome::Completed { executed: 4000 }.executed(), 4000);
        assert!(!BatchOutcome::Completed { executed: 4000 }.is_yielded());
        assert_eq!(BatchOutcome::Yielded { executed: 17 }.executed(), 17);
        assert!(BatchOutcome::Yielded { executed: 0 }.is_yielded());
    }
}
