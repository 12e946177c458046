//! Wall clock.

use async_trait::async_trait;
use effect0::{ClockFailure, ClockRunner};
use std::time::{SystemTime, UNIX_EPOCH};

/// A [`ClockRunner`] reading `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a system clock.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ClockRunner for SystemClock {
    async fn now_ms(&self) -> Result<u64, ClockFailure> {
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ClockFailure::Unavailable(format!("clock before epoch: {e}")))?;
        Ok(u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
    }
}
