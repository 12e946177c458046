//! Interpreter configuration.

use effect0::DurationMs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default admission bound.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default grace period for soft cancellation.
pub const DEFAULT_SOFT_CANCEL_GRACE: DurationMs = DurationMs::from_millis(1_000);

/// Settings fixed at [`crate::Interpreter::start`].
///
/// Per-kind timeouts are not here; they are declared when a runner is
/// registered (see [`crate::RunnersBuilder`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Maximum number of admitted requests that have not yet resolved,
    /// queued and in-flight together. Submissions past this bound fail
    /// with `QueueFull` immediately.
    pub queue_capacity: usize,

    /// How long a soft-cancelled runner may keep running before it is
    /// aborted. Never extends past the invocation's own deadline.
    pub soft_cancel_grace: DurationMs,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            soft_cancel_grace: DEFAULT_SOFT_CANCEL_GRACE,
        }
    }
}

impl InterpreterConfig {
    /// Set the admission bound.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the soft-cancel grace period.
    #[must_use]
    pub fn with_soft_cancel_grace(mut self, grace: DurationMs) -> Self {
        self.soft_cancel_grace = grace;
        self
    }

    /// Reject settings the interpreter cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.queue_capacity > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(ConfigError::CapacityTooLarge(self.queue_capacity));
        }
        Ok(())
    }
}

/// Invalid interpreter settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `queue_capacity` was zero.
    #[error("queue_capacity must be at least 1")]
    ZeroCapacity,

    /// `queue_capacity` exceeds what the admission semaphore can hold.
    #[error("queue_capacity {0} is too large")]
    CapacityTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: InterpreterConfig = serde_json::from_str(r#"{"queue_capacity": 100}"#).unwrap();
        assert_eq!(cfg.queue_capacity, 100);
        assert_eq!(cfg.soft_cancel_grace, DEFAULT_SOFT_CANCEL_GRACE);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let cfg = InterpreterConfig::default().with_queue_capacity(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroCapacity));
        assert!(InterpreterConfig::default().validate().is_ok());
    }
}
