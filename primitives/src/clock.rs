//! # Clocks
//!
//! Unlock times are epoch seconds, so the ledger needs "now" in the same
//! unit. It asks a [`Clock`] rather than the OS so tests (and hosts with
//! their own notion of block time) can drive it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// Source of the current time in epoch seconds.
pub trait Clock {
    /// Seconds since the UNIX epoch.
    fn now(&self) -> u64;
}

/// Wall clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        // Pre-epoch system clocks read as zero rather than wrapping.
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Hand-cranked clock for tests and simulations.
///
/// Clones share the same underlying time, so a test can keep one handle
/// and give another to the code under test. Time never moves backwards.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start` seconds.
    pub fn new(start: u64) -> Self {
        Self {
            seconds: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Moves the clock to `seconds`. Earlier values are ignored.
    pub fn set(&self, seconds: u64) {
        self.seconds.fetch_max(seconds, Ordering::SeqCst);
    }

    /// Moves the clock forward by `delta` seconds, saturating at `u64::MAX`.
    pub fn advance(&self, delta: u64) {
        let _ = self
            .seconds
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                Some(s.saturating_add(delta))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.seconds.load(Ordering::SeqCst)
    }
}
