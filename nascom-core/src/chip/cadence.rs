/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of NASCOM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
use core::fmt;
use std::time::{Duration, Instant};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

/// The real time duration a measurement window of batches should ideally take.
pub const TARGET_WINDOW: Duration = Duration::from_secs(1);
/// The upper limit of the inter-batch delay.
pub const MAX_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Paces batches of emulated instructions to approximate the real machine speed.
///
/// After each completed batch the running thread sleeps for the current delay. Once every
/// `target_batches_per_second` batches the real time elapsed is compared against
/// [TARGET_WINDOW] and the delay is corrected:
///
/// * if the window took too long, the delay is reduced by the overage divided by the number
///   of batches in the window, unless the per-batch overage exceeds the delay itself, in which
///   case the delay is halved;
/// * if the window was too short, the delay is increased by the shortfall divided by the
///   number of batches in the window, up to [MAX_BATCH_DELAY];
/// * otherwise the delay stays unchanged.
#[derive(Clone, Debug)]
pub struct CadenceController {
    instructions_per_batch: u32,
    target_batches_per_second: u32,
    delay: Duration,
    window_start: Instant,
    window_batches: u32,
    total_batches: u64,
    windows: u64,
    last_window: Option<Duration>,
}

/// A snapshot of the [CadenceController] statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CadenceStats {
    /// The number of batches recorded since creation.
    pub total_batches: u64,
    /// The number of completed measurement windows.
    pub windows: u64,
    /// The current inter-batch delay.
    pub delay: Duration,
    /// The real time duration of the last completed measurement window.
    pub last_window: Option<Duration>,
}

impl CadenceStats {
    /// Returns the number of batches per second measured over the last completed window.
    pub fn batch_rate(&self, batches_per_window: u32) -> Option<f64> {
        self.last_window.filter(|window| !window.is_zero())
                        .map(|window| batches_per_window as f64 / window.as_secs_f64())
    }
}

impl fmt::Display for CadenceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batches: {} windows: {} delay: {:?}", self.total_batches, self.windows, self.delay)?;
        if let Some(window) = self.last_window {
            write!(f, " last window: {:?}", window)?;
        }
        Ok(())
    }
}

impl CadenceController {
    /// # Panics
    /// Panics if either `instructions_per_batch` or `target_batches_per_second` is `0`.
    pub fn new(instructions_per_batch: u32, target_batches_per_second: u32, initial_delay: Duration) -> Self {
        assert_ne!(instructions_per_batch, 0, "instructions per batch must be positive");
        assert_ne!(target_batches_per_second, 0, "target batches per second must be positive");
        CadenceController {
            instructions_per_batch,
            target_batches_per_second,
            delay: initial_delay.min(MAX_BATCH_DELAY),
            window_start: Instant::now(),
            window_batches: 0,
            total_batches: 0,
            windows: 0,
            last_window: None
        }
    }
    /// Returns the number of instructions the host should execute in each batch.
    #[inline]
    pub fn instructions_per_batch(&self) -> u32 {
        self.instructions_per_batch
    }
    #[inline]
    pub fn target_batches_per_second(&self) -> u32 {
        self.target_batches_per_second
    }
    /// Returns the current inter-batch delay.
    #[inline]
    pub fn delay(&self) -> Duration {
        self.delay
    }
    pub fn stats(&self) -> CadenceStats {
        CadenceStats {
            total_batches: self.total_batches,
            windows: self.windows,
            delay: self.delay,
            last_window: self.last_window
        }
    }
    /// Restarts the measurement window. Usefull e.g. for resuming paused emulation.
    ///
    /// Returns the start time of the abandoned window.
    pub fn restart(&mut self) -> Instant {
        self.restart_at(Instant::now())
    }
    /// Restarts the measurement window at the given time.
    pub fn restart_at(&mut self, now: Instant) -> Instant {
        self.window_batches = 0;
        core::mem::replace(&mut self.window_start, now)
    }
    /// Records a completed batch. See [CadenceController::record_batch_at].
    pub fn record_batch(&mut self) -> Option<Duration> {
        self.record_batch_at(Instant::now())
    }
    /// Records a batch completed at `now`.
    ///
    /// Returns the measured duration of the window if this batch has completed it, in which
    /// case the delay has been corrected and a new window starts at `now`.
    pub fn record_batch_at(&mut self, now: Instant) -> Option<Duration> {
        self.total_batches = self.total_batches.wrapping_add(1);
        self.window_batches += 1;
        if self.window_batches < self.target_batches_per_second {
            return None
        }
        let elapsed = now.saturating_duration_since(self.window_start);
        self.restart_at(now);
        self.windows = self.windows.wrapping_add(1);
        self.last_window = Some(elapsed);
        self.adjust_delay(elapsed);
        Some(elapsed)
    }
    /// Corrects the delay from the real time duration of a whole measurement window.
    pub fn adjust_delay(&mut self, elapsed: Duration) {
        let batches = self.target_batches_per_second;
        let delay = self.delay;
        if let Some(overage) = elapsed.checked_sub(TARGET_WINDOW) {
            let per_batch = overage / batches;
            if per_batch > delay {
                self.delay = delay / 2;
            }
            else {
                self.delay = delay - per_batch;
            }
        }
        else {
            let per_batch = (TARGET_WINDOW - elapsed) / batches;
            self.delay = (delay + per_batch).min(MAX_BATCH_DELAY);
        }
        debug!("cadence window: {:?} delay: {:?} -> {:?}", elapsed, delay, self.delay);
    }
    /// Sleeps the current thread for the duration of the current delay.
    pub fn pace(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn cadence_records_windows() {
        let start = Instant::now();
        let mut cadence = CadenceController::new(4000, 50, 10*MS);
        cadence.restart_at(start);
        for i in 1..50 {
            assert_eq!(cadence.record_batch_at(start + i*10*MS), None);
        }
        assert_eq!(cadence.record_batch_at(start + 800*MS), Some(800*MS));
        // 200ms short over 50 batches
        assert_eq!(cadence.delay(), 14*MS);
        let stats = cadence.stats();
        assert_eq!(stats.total_batches, 50);
        assert_eq!(stats.windows, 1);
        assert_eq!(stats.last_window, Some(800*MS));
        assert_eq!(stats.batch_rate(50), Some(62.5));
        assert_eq!(CadenceController::new(1, 1, MS).stats().batch_rate(1), None);
        let next = start + 800*MS;
        for i in 1..50 {
            assert_eq!(cadence.record_batch_at(next + i*MS), None);
        }
        assert_eq!(cadence.record_batch_at(next + 1000*MS), Some(1000*MS));
        assert_eq!(cadence.delay(), 14*MS);
        assert_eq!(cadence.stats().windows, 2);
    }

    #[test]
    fn cadence_adjusts_delay() {
        let mut cadence = CadenceController::new(1000, 10, 50*MS);
        cadence.adjust_delay(1000*MS);
        assert_eq!(cadence.delay(), 50*MS);
        cadence.adjust_delay(1200*MS);
        assert_eq!(cadence.delay(), 30*MS);
        cadence.adjust_delay(1400*MS);
        assert_eq!(cadence.delay(), 15*MS);
        cadence.adjust_delay(500*MS);
        assert_eq!(cadence.delay(), 65*MS);
        cadence.adjust_delay(Duration::ZERO);
        assert_eq!(cadence.delay(), 165*MS);
        let mut cadence = CadenceController::new(1000, 1, 900*MS);
        cadence.adjust_delay(Duration::ZERO);
        assert_eq!(cadence.delay(), MAX_BATCH_DELAY);
        assert_eq!(CadenceController::new(1, 1, 2*MAX_BATCH_DELAY).delay(), MAX_BATCH_DELAY);
    }

    #[test]
    fn cadence_converges_to_stable_delay() {
        for &(work, initial) in &[(12*MS, 0*MS), (12*MS, 500*MS), (3*MS, 17*MS), (19*MS, 1*MS)] {
            let start = Instant::now();
            let mut cadence = CadenceController::new(4000, 50, initial);
            cadence.restart_at(start);
            let mut now = start;
            let mut delays = Vec::new();
            for _ in 0..20 {
                for _ in 0..50 {
                    now += work + cadence.delay();
                    cadence.record_batch_at(now);
                }
                delays.push(cadence.delay());
            }
            let settled = 20*MS - work;
            let tail = &delays[delays.len() - 5..];
            assert!(tail.iter().all(|&delay| delay == settled), "{:?}", delays);
            for pair in delays.windows(3) {
                let (a, b, c) = (pair[0], pair[1], pair[2]);
                let swing = |x: Duration, y: Duration| if x > y { x - y } else { y - x };
                assert!(swing(b, c) <= swing(a, b) || swing(b, c) <= MS, "{:?}", delays);
            }
        }
    }

    #[test]
    fn cadence_never_goes_negative() {
        let mut cadence = CadenceController::new(1000, 50, 3*MS);
        for _ in 0..40 {
            cadence.adjust_delay(10_000*MS);
        }
        assert_eq!(cadence.delay(), Duration::ZERO);
        cadence.adjust_delay(10_000*MS);
        assert_eq!(cadence.delay(), Duration::ZERO);
    }

    #[test]
    fn cadence_restart_discards_partial_window() {
        let start = Instant::now();
        let mut cadence = CadenceController::new(4000, 2, 10*MS);
        cadence.restart_at(start);
        assert_eq!(cadence.record_batch_at(start + 100*MS), None);
        let resumed = start + 5000*MS;
        assert_eq!(cadence.restart_at(resumed), start);
        assert_eq!(cadence.record_batch_at(resumed + 400*MS), None);
        assert_eq!(cadence.record_batch_at(resumed + 1000*MS), Some(1000*MS));
        assert_eq!(cadence.delay(), 10*MS);
        assert_eq!(cadence.stats().total_batches, 3);
    }

    #[test]
    #[should_panic]
    fn cadence_rejects_zero_batches() {
        CadenceController::new(4000, 0, MS);
    }
}
