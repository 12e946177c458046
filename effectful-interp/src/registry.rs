//! Runner registration and closed dispatch.
//!
//! One optional slot per kind, each holding the runner and its declared
//! timeout. Dispatch is an exhaustive match over [`Effect`]: adding a
//! kind is a compile error here until it is wired up.

use crate::supervise::supervise;
use crate::tree::CancelSignal;
use effect0::{
    ClockRunner, DbRunner, DurationMs, Effect, EffectError, EffectKind, EffectOutput, HttpRunner,
    KvRunner, LogRunner, RandomRunner,
};
use std::fmt;
use std::sync::Arc;

/// A registered runner with the deadline applied to each of its calls.
pub(crate) struct Bound<R: ?Sized> {
    runner: Arc<R>,
    timeout: DurationMs,
}

impl<R: ?Sized> Bound<R> {
    fn timeout(&self) -> DurationMs {
        self.timeout
    }
}

impl<R: ?Sized> Clone for Bound<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            timeout: self.timeout,
        }
    }
}

/// The set of runners an interpreter dispatches to.
///
/// Built once with [`Runners::builder`] and immutable afterwards.
#[derive(Clone, Default)]
pub struct Runners {
    db: Option<Bound<dyn DbRunner>>,
    http: Option<Bound<dyn HttpRunner>>,
    kv: Option<Bound<dyn KvRunner>>,
    clock: Option<Bound<dyn ClockRunner>>,
    random: Option<Bound<dyn RandomRunner>>,
    log: Option<Bound<dyn LogRunner>>,
}

impl fmt::Debug for Runners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in EffectKind::ALL {
            if let Some(t) = self.timeout_for(kind) {
                map.entry(&kind.as_str(), &t);
            }
        }
        map.finish()
    }
}

impl Runners {
    /// Start an empty registration.
    pub fn builder() -> RunnersBuilder {
        RunnersBuilder::default()
    }

    /// Declared timeout for `kind`, or `None` if nothing is bound.
    /// `KvGet` and `KvSet` share the key-value runner's timeout.
    pub fn timeout_for(&self, kind: EffectKind) -> Option<DurationMs> {
        match kind {
            EffectKind::Db => self.db.as_ref().map(Bound::timeout),
            EffectKind::Http => self.http.as_ref().map(Bound::timeout),
            EffectKind::KvGet | EffectKind::KvSet => self.kv.as_ref().map(Bound::timeout),
            EffectKind::Clock => self.clock.as_ref().map(Bound::timeout),
            EffectKind::Random => self.random.as_ref().map(Bound::timeout),
            EffectKind::Log => self.log.as_ref().map(Bound::timeout),
        }
    }

    /// Whether a runner is registered for `kind`.
    pub fn is_bound(&self, kind: EffectKind) -> bool {
        self.timeout_for(kind).is_some()
    }

    /// Execute one effect under supervision.
    pub(crate) async fn run(
        &self,
        effect: Effect,
        grace: DurationMs,
        cancel: CancelSignal,
    ) -> Result<EffectOutput, EffectError> {
        let kind = effect.kind();
        match effect {
            Effect::DbQuery(query) => {
                let b = self.db.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move {
                    b.runner.query(query).await
                })
                .await
                .map(EffectOutput::DbRows)
                .map_err(EffectError::Db)
            }
            Effect::HttpRequest(request) => {
                let b = self.http.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move {
                    b.runner.send(request).await
                })
                .await
                .map(EffectOutput::Http)
                .map_err(EffectError::Http)
            }
            Effect::KvGet { key } => {
                let b = self.kv.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move {
                    b.runner.get(key).await
                })
                .await
                .map(EffectOutput::KvValue)
                .map_err(EffectError::Kv)
            }
            Effect::KvSet { key, value } => {
                let b = self.kv.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move {
                    b.runner.set(key, value).await
                })
                .await
                .map(|()| EffectOutput::KvStored)
                .map_err(EffectError::Kv)
            }
            Effect::NowMs => {
                let b = self.clock.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move { b.runner.now_ms().await })
                    .await
                    .map(EffectOutput::NowMs)
                    .map_err(EffectError::Clock)
            }
            Effect::RandomBytes { len } => {
                let b = self.random.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move {
                    b.runner.fill(len).await
                })
                .await
                .map(EffectOutput::Bytes)
                .map_err(EffectError::Random)
            }
            Effect::Log { level, message } => {
                let b = self.log.clone().ok_or(EffectError::Unbound(kind))?;
                supervise(b.timeout, grace, cancel, async move {
                    b.runner.emit(level, message).await
                })
                .await
                .map(|()| EffectOutput::Logged)
                .map_err(EffectError::Log)
            }
        }
    }
}

/// Builder for [`Runners`]. Each kind is bound at most once; binding a
/// kind again replaces the earlier runner.
#[derive(Default)]
pub struct RunnersBuilder {
    inner: Runners,
}

impl RunnersBuilder {
    /// Bind the database runner.
    #[must_use]
    pub fn db<R: DbRunner + 'static>(mut self, runner: Arc<R>, timeout: DurationMs) -> Self {
        let runner: Arc<dyn DbRunner> = runner;
        self.inner.db = Some(Bound { runner, timeout });
        self
    }

    /// Bind the HTTP runner.
    #[must_use]
    pub fn http<R: HttpRunner + 'static>(mut self, runner: Arc<R>, timeout: DurationMs) -> Self {
        let runner: Arc<dyn HttpRunner> = runner;
        self.inner.http = Some(Bound { runner, timeout });
        self
    }

    /// Bind the key-value runner. Serves both reads and writes.
    #[must_use]
    pub fn kv<R: KvRunner + 'static>(mut self, runner: Arc<R>, timeout: DurationMs) -> Self {
        let runner: Arc<dyn KvRunner> = runner;
        self.inner.kv = Some(Bound { runner, timeout });
        self
    }

    /// Bind the clock runner.
    #[must_use]
    pub fn clock<R: ClockRunner + 'static>(mut self, runner: Arc<R>, timeout: DurationMs) -> Self {
        let runner: Arc<dyn ClockRunner> = runner;
        self.inner.clock = Some(Bound { runner, timeout });
        self
    }

    /// Bind the randomness runner.
    #[must_use]
    pub fn random<R: RandomRunner + 'static>(
        mut self,
        runner: Arc<R>,
        timeout: DurationMs,
    ) -> Self {
        let runner: Arc<dyn RandomRunner> = runner;
        self.inner.random = Some(Bound { runner, timeout });
        self
    }

    /// Bind the log runner.
    #[must_use]
    pub fn log<R: LogRunner + 'static>(mut self, runner: Arc<R>, timeout: DurationMs) -> Self {
        let runner: Arc<dyn LogRunner> = runner;
        self.inner.log = Some(Bound { runner, timeout });
        self
    }

    /// Finish registration.
    pub fn build(self) -> Runners {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use effect0::test_utils::{FixedClock, RecordingLog};
    use effect0::{ClockFailure, LogLevel};
    use tokio::sync::watch;

    fn live() -> CancelSignal {
        watch::channel(None).1
    }

    #[test]
    fn kv_timeout_covers_get_and_set() {
        let kv = Arc::new(effectful_runners::MemoryKv::new());
        let runners = Runners::builder()
            .kv(kv, DurationMs::from_millis(20))
            .build();
        assert_eq!(
            runners.timeout_for(EffectKind::KvGet),
            Some(DurationMs::from_millis(20))
        );
        assert!(runners.is_bound(EffectKind::KvSet));
        assert!(!runners.is_bound(EffectKind::Db));
    }

    #[test]
    fn debug_lists_bound_kinds_only() {
        let runners = Runners::builder()
            .clock(Arc::new(FixedClock::new(0)), DurationMs::from_millis(5))
            .build();
        assert_eq!(format!("{runners:?}"), r#"{"clock": DurationMs(5)}"#);
    }

    #[tokio::test]
    async fn unbound_kind_is_reported() {
        let runners = Runners::default();
        let err = runners
            .run(Effect::now_ms(), DurationMs::ZERO, live())
            .await
            .unwrap_err();
        assert_eq!(err, EffectError::Unbound(EffectKind::Clock));
    }

    #[tokio::test]
    async fn outputs_match_effect_kind() {
        let log = Arc::new(RecordingLog::new());
        let runners = Runners::builder()
            .clock(Arc::new(FixedClock::new(42)), DurationMs::from_millis(50))
            .log(Arc::clone(&log), DurationMs::from_millis(50))
            .build();

        let now = runners
            .run(Effect::now_ms(), DurationMs::ZERO, live())
            .await
            .unwrap();
        assert_eq!(now, EffectOutput::NowMs(42));

        let logged = runners
            .run(
                Effect::log(LogLevel::Info, "hello"),
                DurationMs::ZERO,
                live(),
            )
            .await
            .unwrap();
        assert_eq!(logged, EffectOutput::Logged);
        assert_eq!(log.messages(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn cancelled_signal_maps_to_kind_failure() {
        let runners = Runners::builder()
            .clock(Arc::new(FixedClock::new(1)), DurationMs::from_millis(50))
            .build();
        let (tx, rx) = watch::channel(None);
        tx.send_replace(Some(effect0::CancelMode::Hard));
        let err = runners
            .run(Effect::now_ms(), DurationMs::ZERO, rx)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EffectError::Clock(ClockFailure::Cancelled(effect0::CancelMode::Hard))
        );
    }
}
