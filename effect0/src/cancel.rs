//! Cancellation modes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an in-flight effect invocation should be interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Terminate immediately. The runner task is aborted at its next
    /// suspension point; no cleanup is guaranteed.
    Hard,
    /// Ask for a graceful stop. The in-flight runner call is allowed to
    /// finish (bounded by a grace period) before the invocation resolves
    /// as cancelled.
    Soft,
}

impl fmt::Display for CancelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelMode::Hard => f.write_str("hard"),
            CancelMode::Soft => f.write_str("soft"),
        }
    }
}
