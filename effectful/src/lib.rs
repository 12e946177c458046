#![deny(missing_docs)]
//! # effectful: umbrella crate
//!
//! Single import surface for the effect protocol, the interpreter and the
//! stock runners. Re-exports each crate behind a feature flag, plus a
//! `prelude` for the happy path.

#[cfg(feature = "core")]
pub use effect0;
#[cfg(feature = "core")]
pub use effectful_interp;
#[cfg(feature = "runners")]
pub use effectful_runners;

/// Happy-path imports for wiring runners into an interpreter.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use effect0::{
        CancelMode, DbQuery, DbRow, DbRows, DurationMs, Effect, EffectError, EffectKind,
        EffectOutput, HttpRequest, HttpResponse, LogLevel, QueryMode, SqlValue,
    };

    #[cfg(feature = "core")]
    pub use effectful_interp::{
        CancelHandle, Caller, EffectHandle, Interpreter, InterpreterConfig, Perform, Runners,
    };

    #[cfg(feature = "runners")]
    pub use effectful_runners::{MemoryKv, OsRandom, SystemClock, TracingLog};

    #[cfg(feature = "runner-http")]
    pub use effectful_runners::ReqwestHttp;

    #[cfg(feature = "runner-sqlite")]
    pub use effectful_runners::SqliteDb;
}
