//! Millisecond durations for runner timeouts and grace windows.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A whole number of milliseconds. Serializes as a bare integer
/// (`100`, not `{"secs":0,"nanos":100000000}`).
///
/// Arithmetic saturates: a deadline never wraps around to "forever".
///
/// ```
/// use effect0::DurationMs;
///
/// let timeout = DurationMs::from_secs(2);
/// let spent = DurationMs::from_millis(1_500);
/// assert_eq!(timeout.saturating_sub(spent), DurationMs::from_millis(500));
/// assert!(spent.saturating_sub(timeout).is_zero());
/// assert_eq!(serde_json::json!(timeout), serde_json::json!(2000));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// No time at all.
    pub const ZERO: Self = Self(0);

    /// `ms` milliseconds.
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// `secs` seconds, saturating at `u64::MAX` milliseconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Whether this is [`DurationMs::ZERO`].
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Time left after `spent`, or zero once it is used up.
    #[must_use]
    pub const fn saturating_sub(self, spent: Self) -> Self {
        Self(self.0.saturating_sub(spent.0))
    }

    /// For `tokio::time` and other std-based APIs.
    pub fn to_std(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

/// Truncates sub-millisecond precision; saturates past `u64::MAX` ms.
impl From<Duration> for DurationMs {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<DurationMs> for Duration {
    fn from(d: DurationMs) -> Self {
        d.to_std()
    }
}

impl std::fmt::Display for DurationMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
