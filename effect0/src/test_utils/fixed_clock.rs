//! FixedClock: a clock that only moves when told to.

use crate::error::ClockFailure;
use crate::runner::ClockRunner;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// A [`ClockRunner`] that returns a settable instant.
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    /// Start at `now_ms` milliseconds since the epoch.
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    /// Move the clock forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClockRunner for FixedClock {
    async fn now_ms(&self) -> Result<u64, ClockFailure> {
        Ok(self.now.load(Ordering::SeqCst))
    }
}
