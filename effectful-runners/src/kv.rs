//! In-memory key-value store.

use async_trait::async_trait;
use effect0::effect::check_kv_key;
use effect0::{KvFailure, KvRunner};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A [`KvRunner`] backed by a `HashMap` behind a `RwLock`.
///
/// Values live for the lifetime of the runner. Suitable for tests and
/// single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryKv {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            data: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KvRunner for MemoryKv {
    async fn get(&self, key: String) -> Result<Option<Value>, KvFailure> {
        check_kv_key(&key)?;
        Ok(self.data.read().await.get(&key).cloned())
    }

    async fn set(&self, key: String, value: Value) -> Result<(), KvFailure> {
        check_kv_key(&key)?;
        self.data.write().await.insert(key, value);
        Ok(())
    }
}
