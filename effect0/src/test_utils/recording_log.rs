//! RecordingLog: keeps every emitted line for inspection.

use crate::effect::LogLevel;
use crate::error::LogFailure;
use crate::runner::LogRunner;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A [`LogRunner`] that records `(level, message)` pairs in arrival order.
/// An optional per-line delay makes ordering between callers observable.
#[derive(Default)]
pub struct RecordingLog {
    delay: Duration,
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingLog {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `delay` after recording each line.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Recorded lines, in arrival order.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Just the messages, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl LogRunner for RecordingLog {
    async fn emit(&self, level: LogLevel, message: String) -> Result<(), LogFailure> {
        self.lines
            .lock()
            .map_err(|e| LogFailure::Sink(e.to_string()))?
            .push((level, message));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}
