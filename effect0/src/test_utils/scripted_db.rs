//! ScriptedDb: returns canned rows (or a canned failure) after a delay.

use crate::effect::{DbQuery, QueryMode};
use crate::error::DbFailure;
use crate::output::{DbRow, DbRows};
use crate::runner::DbRunner;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A [`DbRunner`] that sleeps for a fixed delay and then answers from a
/// script. Records the SQL of every call, in call order, on entry.
pub struct ScriptedDb {
    rows: Vec<DbRow>,
    failure: Option<DbFailure>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    completed: AtomicUsize,
}

impl ScriptedDb {
    /// Answer every query with `rows`.
    pub fn new(rows: Vec<DbRow>) -> Self {
        Self {
            rows,
            failure: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            completed: AtomicUsize::new(0),
        }
    }

    /// Answer every query with `failure`.
    pub fn failing(failure: DbFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// SQL text of every call that started, in start order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls that ran to completion (were not aborted).
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DbRunner for ScriptedDb {
    async fn query(&self, query: DbQuery) -> Result<DbRows, DbFailure> {
        query.check()?;
        self.calls
            .lock()
            .map_err(|e| DbFailure::Unknown(e.to_string()))?
            .push(query.sql.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        match query.mode {
            QueryMode::One => DbRows::exactly_one(self.rows.clone()),
            QueryMode::Many => Ok(DbRows(self.rows.clone())),
            QueryMode::Execute => Ok(DbRows::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn poisoned_lock_still_reports_calls() {
        let db = Arc::new(ScriptedDb::new(vec![]));
        db.calls.lock().unwrap().push("SELECT 1".into());

        let holder = Arc::clone(&db);
        let _ = std::thread::spawn(move || {
            let _guard = holder.calls.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(db.calls.is_poisoned());
        assert_eq!(db.calls(), vec!["SELECT 1".to_string()]);
    }
}
