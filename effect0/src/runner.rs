//! Runner traits: one impure capability per effect kind.
//!
//! A runner is constructed once with its dependencies (pool, client,
//! store) and lives for the process lifetime. Each method receives only
//! the effect's payload; there is no ambient configuration. Every
//! dependency error must be converted into the kind's failure enum
//! before it leaves the method.
//!
//! Runners never call other runners. Composition happens one level up,
//! in pure code that issues several effects.

use crate::effect::{DbQuery, HttpRequest, LogLevel};
use crate::error::{ClockFailure, DbFailure, HttpFailure, KvFailure, LogFailure, RandomFailure};
use crate::output::{DbRows, HttpResponse};
use async_trait::async_trait;

/// Executes one SQL statement per call.
#[async_trait]
pub trait DbRunner: Send + Sync {
    /// Run `query`, honouring its [`crate::QueryMode`].
    async fn query(&self, query: DbQuery) -> Result<DbRows, DbFailure>;
}

/// Performs one HTTP exchange per call.
#[async_trait]
pub trait HttpRunner: Send + Sync {
    /// Send `request` and collect the full response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure>;
}

/// Reads and writes a key-value store. Serves both `KvGet` and `KvSet`.
#[async_trait]
pub trait KvRunner: Send + Sync {
    /// Read a key. `Ok(None)` when absent.
    async fn get(&self, key: String) -> Result<Option<serde_json::Value>, KvFailure>;

    /// Write a key, replacing any previous value.
    async fn set(&self, key: String, value: serde_json::Value) -> Result<(), KvFailure>;
}

/// Reads the wall clock.
#[async_trait]
pub trait ClockRunner: Send + Sync {
    /// Milliseconds since the Unix epoch.
    async fn now_ms(&self) -> Result<u64, ClockFailure>;
}

/// Draws random bytes.
#[async_trait]
pub trait RandomRunner: Send + Sync {
    /// Exactly `len` bytes.
    async fn fill(&self, len: usize) -> Result<Vec<u8>, RandomFailure>;
}

/// Emits log lines.
#[async_trait]
pub trait LogRunner: Send + Sync {
    /// Emit one line at `level`.
    async fn emit(&self, level: LogLevel, message: String) -> Result<(), LogFailure>;
}
