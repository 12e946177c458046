//! Failure taxonomy: one exhaustive enum per effect kind.
//!
//! Every kind's enum carries `Timeout`, `Cancelled` and `Panicked`
//! variants so the interpreter's supervisor can produce terminal states
//! in the kind's own type via [`Failure`].

use crate::cancel::CancelMode;
use crate::duration::DurationMs;
use crate::effect::EffectKind;
use thiserror::Error;

/// Terminal states the supervisor must be able to construct for any kind.
pub trait Failure: std::error::Error + Send + Sync + Sized + 'static {
    /// The invocation exceeded its declared deadline.
    fn timed_out(after: DurationMs) -> Self;
    /// The invocation was cancelled by its caller.
    fn cancelled(mode: CancelMode) -> Self;
    /// The runner panicked; the panic was caught at the runner boundary.
    fn panicked(message: String) -> Self;
    /// Whether this is the timeout variant.
    fn is_timeout(&self) -> bool;
    /// Whether this is the cancellation variant.
    fn is_cancelled(&self) -> bool;
}

macro_rules! terminal_states {
    ($name:ident) => {
        impl Failure for $name {
            fn timed_out(after: DurationMs) -> Self {
                $name::Timeout(after)
            }

            fn cancelled(mode: CancelMode) -> Self {
                $name::Cancelled(mode)
            }

            fn panicked(message: String) -> Self {
                $name::Panicked(message)
            }

            fn is_timeout(&self) -> bool {
                matches!(self, $name::Timeout(_))
            }

            fn is_cancelled(&self) -> bool {
                matches!(self, $name::Cancelled(_))
            }
        }
    };
}

/// Database failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbFailure {
    /// A `QueryMode::One` query matched no row.
    #[error("not found")]
    NotFound,

    /// A uniqueness or concurrent-update conflict.
    #[error("conflict")]
    Conflict,

    /// A constraint (foreign key, check, not-null) was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The query was rejected before reaching the database.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The deadline elapsed.
    #[error("timed out after {0}")]
    Timeout(DurationMs),

    /// The connection or pool failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The caller cancelled the invocation.
    #[error("cancelled ({0})")]
    Cancelled(CancelMode),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),

    /// Anything the driver reported that fits no other variant.
    #[error("{0}")]
    Unknown(String),
}

impl DbFailure {
    /// Whether the same query may succeed if retried. Advisory only;
    /// the interpreter never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connection(_) | Self::Conflict
        )
    }
}

terminal_states!(DbFailure);

/// HTTP failures. A response with any status code is not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpFailure {
    /// The request was rejected before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Connect, reset or DNS failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer violated HTTP or the body could not be read.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The deadline elapsed.
    #[error("timed out after {0}")]
    Timeout(DurationMs),

    /// The caller cancelled the invocation.
    #[error("cancelled ({0})")]
    Cancelled(CancelMode),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),

    /// Anything else.
    #[error("{0}")]
    Unknown(String),
}

impl HttpFailure {
    /// Whether the same request may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}

terminal_states!(HttpFailure);

/// Key-value store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvFailure {
    /// The key failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The store could not be reached or is poisoned.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The deadline elapsed.
    #[error("timed out after {0}")]
    Timeout(DurationMs),

    /// The caller cancelled the invocation.
    #[error("cancelled ({0})")]
    Cancelled(CancelMode),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),

    /// Anything else.
    #[error("{0}")]
    Unknown(String),
}

impl KvFailure {
    /// Whether the same operation may succeed if retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

terminal_states!(KvFailure);

/// Clock failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockFailure {
    /// The clock could not be read (e.g. it is set before the epoch).
    #[error("clock unavailable: {0}")]
    Unavailable(String),

    /// The deadline elapsed.
    #[error("timed out after {0}")]
    Timeout(DurationMs),

    /// The caller cancelled the invocation.
    #[error("cancelled ({0})")]
    Cancelled(CancelMode),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),
}

terminal_states!(ClockFailure);

/// Randomness failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RandomFailure {
    /// More bytes were requested than the runner allows in one draw.
    #[error("requested {requested} bytes, at most {max} allowed")]
    TooLarge {
        /// Bytes requested.
        requested: usize,
        /// Per-draw limit of the runner.
        max: usize,
    },

    /// The entropy source failed.
    #[error("entropy source failed: {0}")]
    Source(String),

    /// The deadline elapsed.
    #[error("timed out after {0}")]
    Timeout(DurationMs),

    /// The caller cancelled the invocation.
    #[error("cancelled ({0})")]
    Cancelled(CancelMode),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),
}

terminal_states!(RandomFailure);

/// Log sink failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogFailure {
    /// The sink rejected the line.
    #[error("log sink failed: {0}")]
    Sink(String),

    /// The deadline elapsed.
    #[error("timed out after {0}")]
    Timeout(DurationMs),

    /// The caller cancelled the invocation.
    #[error("cancelled ({0})")]
    Cancelled(CancelMode),

    /// The runner panicked.
    #[error("runner panicked: {0}")]
    Panicked(String),
}

terminal_states!(LogFailure);

/// Everything a caller can get back from submitting an effect.
///
/// Runner-level outcomes keep their kind's enum; interpreter-level
/// outcomes (admission, registration, shutdown) have their own variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    /// A DB runner failure.
    #[error("db: {0}")]
    Db(#[from] DbFailure),

    /// An HTTP runner failure.
    #[error("http: {0}")]
    Http(#[from] HttpFailure),

    /// A KV runner failure.
    #[error("kv: {0}")]
    Kv(#[from] KvFailure),

    /// A clock runner failure.
    #[error("clock: {0}")]
    Clock(#[from] ClockFailure),

    /// A randomness runner failure.
    #[error("random: {0}")]
    Random(#[from] RandomFailure),

    /// A log runner failure.
    #[error("log: {0}")]
    Log(#[from] LogFailure),

    /// Admission refused: `capacity` requests are already pending.
    #[error("queue full ({capacity} pending)")]
    QueueFull {
        /// The configured admission bound.
        capacity: usize,
    },

    /// No runner is registered for this kind.
    #[error("no runner bound for {0}")]
    Unbound(EffectKind),

    /// The interpreter is shut down and accepts no more effects.
    #[error("interpreter shut down")]
    Shutdown,
}

impl EffectError {
    /// Whether this is any kind's timeout variant.
    pub fn is_timeout(&self) -> bool {
        match self {
            EffectError::Db(e) => e.is_timeout(),
            EffectError::Http(e) => e.is_timeout(),
            EffectError::Kv(e) => e.is_timeout(),
            EffectError::Clock(e) => e.is_timeout(),
            EffectError::Random(e) => e.is_timeout(),
            EffectError::Log(e) => e.is_timeout(),
            EffectError::QueueFull { .. } | EffectError::Unbound(_) | EffectError::Shutdown => {
                false
            }
        }
    }

    /// Whether this is any kind's cancellation variant.
    pub fn is_cancelled(&self) -> bool {
        match self {
            EffectError::Db(e) => e.is_cancelled(),
            EffectError::Http(e) => e.is_cancelled(),
            EffectError::Kv(e) => e.is_cancelled(),
            EffectError::Clock(e) => e.is_cancelled(),
            EffectError::Random(e) => e.is_cancelled(),
            EffectError::Log(e) => e.is_cancelled(),
            EffectError::QueueFull { .. } | EffectError::Unbound(_) | EffectError::Shutdown => {
                false
            }
        }
    }

    /// Whether resubmitting the same effect may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            EffectError::Db(e) => e.is_retryable(),
            EffectError::Http(e) => e.is_retryable(),
            EffectError::Kv(e) => e.is_retryable(),
            EffectError::Clock(e) => e.is_timeout(),
            EffectError::Random(e) => e.is_timeout(),
            EffectError::Log(e) => e.is_timeout(),
            EffectError::QueueFull { .. } => true,
            EffectError::Unbound(_) | EffectError::Shutdown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_constructors_round_trip_predicates() {
        let t = DbFailure::timed_out(DurationMs::from_millis(100));
        assert_eq!(t, DbFailure::Timeout(DurationMs::from_millis(100)));
        assert!(t.is_timeout());
        assert!(!t.is_cancelled());

        let c = HttpFailure::cancelled(CancelMode::Soft);
        assert!(c.is_cancelled());
        assert_eq!(c.to_string(), "cancelled (soft)");
    }

    #[test]
    fn effect_error_wraps_kind_failures() {
        let e: EffectError = DbFailure::Timeout(DurationMs::from_millis(100)).into();
        assert!(e.is_timeout());
        assert!(e.is_retryable());
        assert_eq!(e.to_string(), "db: timed out after 100ms");
    }

    #[test]
    fn queue_full_is_retryable_but_not_timeout() {
        let e = EffectError::QueueFull { capacity: 100 };
        assert!(e.is_retryable());
        assert!(!e.is_timeout());
        assert!(!e.is_cancelled());
    }

    #[test]
    fn validation_failures_are_not_retryable() {
        assert!(!DbFailure::InvalidQuery("empty".into()).is_retryable());
        assert!(!DbFailure::Constraint("fk".into()).is_retryable());
        assert!(!HttpFailure::InvalidRequest("url".into()).is_retryable());
        assert!(!EffectError::Unbound(EffectKind::Http).is_retryable());
    }
}
