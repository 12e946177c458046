//! StalledRunner: every call hangs forever.

use crate::effect::{DbQuery, HttpRequest, LogLevel};
use crate::error::{ClockFailure, DbFailure, HttpFailure, KvFailure, LogFailure, RandomFailure};
use crate::output::{DbRows, HttpResponse};
use crate::runner::{ClockRunner, DbRunner, HttpRunner, KvRunner, LogRunner, RandomRunner};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A runner for every kind whose calls never resolve on their own.
///
/// Counts how many calls started and how many in-flight calls were
/// dropped (aborted by the interpreter).
#[derive(Default)]
pub struct StalledRunner {
    started: AtomicUsize,
    dropped: Arc<AtomicUsize>,
}

/// Increments the shared counter when the stalled future is dropped.
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl StalledRunner {
    /// Create a new stalled runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls that started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// In-flight calls whose futures were dropped.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    async fn stall<T>(&self) -> T {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _guard = DropCounter(Arc::clone(&self.dropped));
        std::future::pending().await
    }
}

#[async_trait]
impl DbRunner for StalledRunner {
    async fn query(&self, _query: DbQuery) -> Result<DbRows, DbFailure> {
        self.stall().await
    }
}

#[async_trait]
impl HttpRunner for StalledRunner {
    async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        self.stall().await
    }
}

#[async_trait]
impl KvRunner for StalledRunner {
    async fn get(&self, _key: String) -> Result<Option<serde_json::Value>, KvFailure> {
        self.stall().await
    }

    async fn set(&self, _key: String, _value: serde_json::Value) -> Result<(), KvFailure> {
        self.stall().await
    }
}

#[async_trait]
impl ClockRunner for StalledRunner {
    async fn now_ms(&self) -> Result<u64, ClockFailure> {
        self.stall().await
    }
}

#[async_trait]
impl RandomRunner for StalledRunner {
    async fn fill(&self, _len: usize) -> Result<Vec<u8>, RandomFailure> {
        self.stall().await
    }
}

#[async_trait]
impl LogRunner for StalledRunner {
    async fn emit(&self, _level: LogLevel, _message: String) -> Result<(), LogFailure> {
        self.stall().await
    }
}
