#![deny(missing_docs)]
//! Concrete runners for the effect kinds defined in `effect0`.
//!
//! | Runner | Kind | Backing |
//! |--------|------|---------|
//! | [`MemoryKv`] | `KvGet`, `KvSet` | `tokio::sync::RwLock<HashMap>` |
//! | [`SystemClock`] | `Clock` | `SystemTime` |
//! | [`OsRandom`] | `Random` | OS entropy via `rand` |
//! | [`TracingLog`] | `Log` | `tracing` events |
//! | `ReqwestHttp` | `Http` | `reqwest` (feature `http`, default) |
//! | `SqliteDb` | `Db` | `sqlx` SQLite pool (feature `sqlite`) |
//!
//! Each runner converts its dependency's errors into the kind's failure
//! enum; nothing dependency-specific leaks through the trait.

pub mod clock;
#[cfg(feature = "http")]
pub mod http;
pub mod kv;
pub mod log;
pub mod random;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use clock::SystemClock;
#[cfg(feature = "http")]
pub use http::ReqwestHttp;
pub use kv::MemoryKv;
pub use log::TracingLog;
pub use random::OsRandom;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDb;
