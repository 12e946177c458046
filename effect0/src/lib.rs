//! # effect0: the effect vocabulary for effectful
//!
//! This crate defines the data that crosses the boundary between pure
//! decision logic and impure execution. It performs no I/O itself.
//!
//! ## The pieces
//!
//! | Piece | Types | What it does |
//! |-------|-------|-------------|
//! | Effects | [`Effect`], [`EffectKind`] | Inert descriptions of one side-effect |
//! | Outputs | [`EffectOutput`], [`DbRows`], [`HttpResponse`] | What a successful runner hands back |
//! | Failures | [`DbFailure`], [`HttpFailure`], [`EffectError`], … | Exhaustive, typed error taxonomy |
//! | Runners | [`DbRunner`], [`HttpRunner`], [`KvRunner`], … | One impure function per effect kind |
//! | Cancellation | [`CancelMode`] | Hard vs. soft interruption |
//!
//! ## Design Principle
//!
//! Pure code builds an [`Effect`] and hands it to an interpreter. The
//! interpreter picks the runner bound to the effect's [`EffectKind`], wraps
//! the call in a deadline and a cancellation scope, and returns exactly one
//! `Result`. Timeout and cancellation are ordinary variants of every
//! failure enum, not exceptional paths.
//!
//! Failure enums are deliberately not `#[non_exhaustive]`: adding a
//! variant must break every exhaustive `match` downstream.

#![deny(missing_docs)]

pub mod cancel;
pub mod duration;
pub mod effect;
pub mod error;
pub mod output;
pub mod runner;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use cancel::CancelMode;
pub use duration::DurationMs;
pub use effect::{DbQuery, Effect, EffectKind, HttpMethod, HttpRequest, LogLevel, QueryMode};
pub use error::{
    ClockFailure, DbFailure, EffectError, Failure, HttpFailure, KvFailure, LogFailure,
    RandomFailure,
};
pub use output::{DbRow, DbRows, EffectOutput, HttpResponse, SqlValue};
pub use runner::{ClockRunner, DbRunner, HttpRunner, KvRunner, LogRunner, RandomRunner};
