//! PanickingRunner: every call panics.

use crate::effect::{DbQuery, HttpRequest, LogLevel};
use crate::error::{ClockFailure, DbFailure, HttpFailure, KvFailure, LogFailure, RandomFailure};
use crate::output::{DbRows, HttpResponse};
use crate::runner::{ClockRunner, DbRunner, HttpRunner, KvRunner, LogRunner, RandomRunner};
use async_trait::async_trait;

/// A runner for every kind that panics with a fixed message.
/// Proves the interpreter converts panics into typed failures.
pub struct PanickingRunner {
    message: &'static str,
}

impl PanickingRunner {
    /// Panic with `message` on every call.
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

impl Default for PanickingRunner {
    fn default() -> Self {
        Self::new("runner exploded")
    }
}

#[async_trait]
impl DbRunner for PanickingRunner {
    async fn query(&self, _query: DbQuery) -> Result<DbRows, DbFailure> {
        panic!("{}", self.message)
    }
}

#[async_trait]
impl HttpRunner for PanickingRunner {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        panic!("{}", self.message)
    }
}

#[async_trait]
impl KvRunner for PanickingRunner {
    async fn get(&self, _key: String) -> Result<Option<serde_json::Value>, KvFailure> {
        panic!("{}", self.message)
    }

    async fn set(&self, _key: String, _value: serde_json::Value) -> Result<(), KvFailure> {
        panic!("{}", self.message)
    }
}

#[async_trait]
impl ClockRunner for PanickingRunner {
    async fn now_ms(&self) -> Result<u64, ClockFailure> {
        panic!("{}", self.message)
    }
}

#[async_trait]
impl RandomRunner for PanickingRunner {
    async fn fill(&self, _len: usize) -> Result<Vec<u8>, RandomFailure> {
        panic!("{}", self.message)
    }
}

#[async_trait]
impl LogRunner for PanickingRunner {
    async fn emit(&self, _level: LogLevel, _message: String) -> Result<(), LogFailure> {
        panic!("{}", self.message)
    }
}
