//! Interpreter counters and the serializable snapshot behind `Interpreter::stats`.

use effect0::{EffectError, EffectOutput};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of interpreter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Requests admitted.
    pub submitted: u64,
    /// Requests refused with `QueueFull`.
    pub rejected: u64,
    /// Resolved with `Ok`.
    pub succeeded: u64,
    /// Resolved with a runner failure other than timeout or cancellation.
    pub failed: u64,
    /// Resolved with a timeout.
    pub timed_out: u64,
    /// Resolved with a cancellation.
    pub cancelled: u64,
    /// Admitted and not yet resolved.
    pub in_flight: u64,
}

/// How an admitted request resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ok,
    Failed,
    TimedOut,
    Cancelled,
}

impl Outcome {
    pub(crate) fn of(result: &Result<EffectOutput, EffectError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) if e.is_timeout() => Self::TimedOut,
            Err(e) if e.is_cancelled() => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    pub(crate) fn admitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn resolved(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Ok => &self.succeeded,
            Outcome::Failed => &self.failed,
            Outcome::TimedOut => &self.timed_out,
            Outcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, in_flight: u64) -> Stats {
        Stats {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            in_flight,
        }
    }
}
