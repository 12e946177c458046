//! The public interpreter surface.

use crate::config::{ConfigError, InterpreterConfig};
use crate::dispatch::{Job, LaneId, Shared, run_loop};
use crate::registry::Runners;
use crate::stats::{Counters, Stats};
use crate::tree::{CancelTree, NodeKind, OpId};
use async_trait::async_trait;
use effect0::{
    CancelMode, ClockFailure, DbFailure, DbQuery, DbRows, Effect, EffectError, EffectKind,
    EffectOutput, HttpFailure, HttpRequest, HttpResponse, KvFailure, LogFailure, LogLevel,
    RandomFailure,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::{Semaphore, TryAcquireError, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a running interpreter. Cheap to clone; all clones share the
/// same runners, admission bound and cancellation tree.
///
/// Must be started inside a tokio runtime.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

struct Inner {
    shared: Arc<Shared>,
    intake: mpsc::Sender<Job>,
    admission: Arc<Semaphore>,
    capacity: usize,
    next_lane: AtomicU64,
    closed: AtomicBool,
    stop: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("runners", &self.inner.shared.runners)
            .field("capacity", &self.inner.capacity)
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl Interpreter {
    /// Validate `config` and spawn the dispatch loop.
    pub fn start(config: InterpreterConfig, runners: Runners) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.queue_capacity;
        let tree = Arc::new(CancelTree::new());
        let shared = Arc::new(Shared {
            runners,
            tree,
            grace: config.soft_cancel_grace,
            counters: Counters::default(),
        });
        let (intake, rx) = mpsc::channel(capacity);
        let stop = CancellationToken::new();
        let worker = tokio::spawn(run_loop(Arc::clone(&shared), rx, stop.clone()));

        tracing::info!(
            capacity,
            grace_ms = config.soft_cancel_grace.as_millis(),
            runners = ?shared.runners,
            "effectful.interp.start"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                intake,
                admission: Arc::new(Semaphore::new(capacity)),
                capacity,
                next_lane: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                stop,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// A new caller scope directly under the root. Effects submitted
    /// through it run one at a time, in submission order.
    pub fn caller(&self) -> Result<Caller, EffectError> {
        let root = self.inner.shared.tree.root();
        Caller::open(self.clone(), root)
    }

    /// Counters plus the number of admitted, unresolved requests.
    pub fn stats(&self) -> Stats {
        let free = self.inner.admission.available_permits();
        let in_flight = self.inner.capacity.saturating_sub(free) as u64;
        self.inner.shared.counters.snapshot(in_flight)
    }

    /// The configured admission bound.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Whether [`Interpreter::shutdown`] has begun.
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop admitting, cancel everything outstanding with `mode`, and wait
    /// for every admitted request to resolve. Later submissions fail with
    /// [`EffectError::Shutdown`]. Calling it again is a no-op.
    pub async fn shutdown(&self, mode: CancelMode) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let tree = &self.inner.shared.tree;
        tracing::info!(mode = %mode, in_flight = self.stats().in_flight, "effectful.interp.shutdown");
        self.inner.admission.close();
        tree.cancel(tree.root(), mode);
        self.inner.stop.cancel();

        let worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "effectful.interp.worker_failed");
            }
        }
    }

    fn next_lane(&self) -> LaneId {
        self.inner.next_lane.fetch_add(1, Ordering::Relaxed)
    }

    fn submit_in(
        &self,
        lane: LaneId,
        parent: OpId,
        effect: Effect,
    ) -> Result<EffectHandle, EffectError> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return Err(EffectError::Shutdown);
        }
        let kind = effect.kind();
        if !inner.shared.runners.is_bound(kind) {
            return Err(EffectError::Unbound(kind));
        }

        let permit = match Arc::clone(&inner.admission).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                inner.shared.counters.rejected();
                tracing::warn!(kind = %kind, capacity = inner.capacity, "effectful.queue.full");
                return Err(EffectError::QueueFull {
                    capacity: inner.capacity,
                });
            }
            Err(TryAcquireError::Closed) => return Err(EffectError::Shutdown),
        };

        let tree = Arc::clone(&inner.shared.tree);
        let (op, cancel) = tree
            .spawn(parent, NodeKind::Effect(kind))
            .ok_or(EffectError::Shutdown)?;
        let (reply, rx) = oneshot::channel();
        let job = Job {
            lane,
            effect,
            op,
            cancel,
            reply,
            permit,
        };

        if let Err(e) = inner.intake.try_send(job) {
            tree.settle(op);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => EffectError::QueueFull {
                    capacity: inner.capacity,
                },
                mpsc::error::TrySendError::Closed(_) => EffectError::Shutdown,
            });
        }
        inner.shared.counters.admitted();

        Ok(EffectHandle {
            kind,
            rx,
            cancel: CancelHandle { tree, id: op },
        })
    }
}

/// Submission surface shared by [`Interpreter`] and [`Caller`], with
/// typed helpers for each effect kind.
#[async_trait]
pub trait Perform: Send + Sync {
    /// Admit `effect` without waiting for it. Fails immediately with
    /// `QueueFull`, `Unbound` or `Shutdown`.
    fn submit(&self, effect: Effect) -> Result<EffectHandle, EffectError>;

    /// Submit and wait for the result.
    async fn perform(&self, effect: Effect) -> Result<EffectOutput, EffectError> {
        self.submit(effect)?.await
    }

    /// Run a SQL statement.
    async fn query(&self, query: DbQuery) -> Result<DbRows, EffectError> {
        let out = self.perform(Effect::DbQuery(query)).await?;
        out.into_db_rows().ok_or_else(|| mismatch(EffectKind::Db))
    }

    /// Perform an HTTP exchange.
    async fn http(&self, request: HttpRequest) -> Result<HttpResponse, EffectError> {
        let out = self.perform(Effect::http(request)).await?;
        out.into_http_response()
            .ok_or_else(|| mismatch(EffectKind::Http))
    }

    /// Read a key.
    async fn kv_get(&self, key: String) -> Result<Option<serde_json::Value>, EffectError> {
        let out = self.perform(Effect::kv_get(key)).await?;
        out.into_kv_value().ok_or_else(|| mismatch(EffectKind::KvGet))
    }

    /// Write a key.
    async fn kv_set(&self, key: String, value: serde_json::Value) -> Result<(), EffectError> {
        match self.perform(Effect::kv_set(key, value)).await? {
            EffectOutput::KvStored => Ok(()),
            _ => Err(mismatch(EffectKind::KvSet)),
        }
    }

    /// Read the wall clock in Unix milliseconds.
    async fn now_ms(&self) -> Result<u64, EffectError> {
        let out = self.perform(Effect::now_ms()).await?;
        out.as_now_ms().ok_or_else(|| mismatch(EffectKind::Clock))
    }

    /// Draw `len` random bytes.
    async fn random_bytes(&self, len: usize) -> Result<Vec<u8>, EffectError> {
        let out = self.perform(Effect::random_bytes(len)).await?;
        out.into_bytes().ok_or_else(|| mismatch(EffectKind::Random))
    }

    /// Emit a log line.
    async fn log(&self, level: LogLevel, message: String) -> Result<(), EffectError> {
        match self.perform(Effect::log(level, message)).await? {
            EffectOutput::Logged => Ok(()),
            _ => Err(mismatch(EffectKind::Log)),
        }
    }
}

/// Dispatch builds each output from the matched effect, so a wrong shape
/// only comes from a broken runner binding.
fn mismatch(kind: EffectKind) -> EffectError {
    let msg = format!("{kind} runner produced a mismatched output");
    match kind {
        EffectKind::Db => EffectError::Db(DbFailure::Unknown(msg)),
        EffectKind::Http => EffectError::Http(HttpFailure::Unknown(msg)),
        EffectKind::KvGet | EffectKind::KvSet => EffectError::Kv(KvFailure::Unknown(msg)),
        EffectKind::Clock => EffectError::Clock(ClockFailure::Unavailable(msg)),
        EffectKind::Random => EffectError::Random(RandomFailure::Source(msg)),
        EffectKind::Log => EffectError::Log(LogFailure::Sink(msg)),
    }
}

#[async_trait]
impl Perform for Interpreter {
    /// Each call gets its own lane; concurrent submissions may run in
    /// any order.
    fn submit(&self, effect: Effect) -> Result<EffectHandle, EffectError> {
        let root = self.inner.shared.tree.root();
        self.submit_in(self.next_lane(), root, effect)
    }
}

/// A serialization domain and cancellation scope.
///
/// Effects submitted through one caller start strictly after the
/// previous one resolved. Cancelling the caller cancels every effect it
/// submitted and every child caller, depth-first.
///
/// Dropping a caller does not cancel outstanding effects.
pub struct Caller {
    interp: Interpreter,
    lane: LaneId,
    scope: OpId,
}

impl std::fmt::Debug for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Caller")
            .field("lane", &self.lane)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Caller {
    fn open(interp: Interpreter, parent: OpId) -> Result<Self, EffectError> {
        if interp.is_shut_down() {
            return Err(EffectError::Shutdown);
        }
        let (scope, _) = interp
            .inner
            .shared
            .tree
            .spawn(parent, NodeKind::Scope)
            .ok_or(EffectError::Shutdown)?;
        let lane = interp.next_lane();
        Ok(Self {
            interp,
            lane,
            scope,
        })
    }

    /// A nested caller with its own lane. Cancelling `self` cancels it.
    pub fn child(&self) -> Result<Caller, EffectError> {
        Caller::open(self.interp.clone(), self.scope)
    }

    /// Handle that cancels this caller's whole subtree.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tree: Arc::clone(&self.interp.inner.shared.tree),
            id: self.scope,
        }
    }
}

#[async_trait]
impl Perform for Caller {
    fn submit(&self, effect: Effect) -> Result<EffectHandle, EffectError> {
        self.interp.submit_in(self.lane, self.scope, effect)
    }
}

impl Drop for Caller {
    fn drop(&mut self) {
        self.interp.inner.shared.tree.settle(self.scope);
    }
}

/// Pending result of one admitted effect. Await it for the outcome.
///
/// Dropping the handle does not cancel the effect; use
/// [`EffectHandle::cancel_handle`] for that.
#[derive(Debug)]
pub struct EffectHandle {
    kind: EffectKind,
    rx: oneshot::Receiver<Result<EffectOutput, EffectError>>,
    cancel: CancelHandle,
}

impl EffectHandle {
    /// Kind of the submitted effect.
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Handle that cancels this effect only.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }
}

impl Future for EffectHandle {
    type Output = Result<EffectOutput, EffectError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(EffectError::Shutdown)))
    }
}

/// Requests cancellation of one node and its descendants.
#[derive(Clone)]
pub struct CancelHandle {
    tree: Arc<CancelTree>,
    id: OpId,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.id)
            .field("mode", &self.mode())
            .finish()
    }
}

impl CancelHandle {
    /// Signal cancellation to the subtree. Already-resolved nodes are
    /// unaffected; a soft request can later be upgraded to hard.
    pub fn request_cancel(&self, mode: CancelMode) {
        tracing::debug!(mode = %mode, "effectful.cancel.request");
        self.tree.cancel(self.id, mode);
    }

    /// Hard cancel: abort in-flight runners at their next await point.
    pub fn interrupt(&self) {
        self.request_cancel(CancelMode::Hard);
    }

    /// Soft cancel: let in-flight runners finish within the grace period.
    pub fn cancel_gracefully(&self) {
        self.request_cancel(CancelMode::Soft);
    }

    /// Cancel and wait until every signalled effect has resolved.
    pub async fn cancel_and_wait(&self, mode: CancelMode) {
        let waits = self.tree.cancel(self.id, mode);
        for mut settled in waits {
            // Err means the node is already reclaimed, i.e. settled.
            let _ = settled.wait_for(|s| *s).await;
        }
    }

    /// The cancellation requested on this node, if any. `None` once the
    /// node has resolved and been reclaimed.
    pub fn mode(&self) -> Option<CancelMode> {
        self.tree.cancel_mode(self.id)
    }

    /// Whether cancellation has been requested on this node.
    pub fn is_cancelled(&self) -> bool {
        self.mode().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use effect0::DurationMs;
    use effect0::test_utils::FixedClock;

    fn clock_only() -> Runners {
        Runners::builder()
            .clock(Arc::new(FixedClock::new(7)), DurationMs::from_millis(50))
            .build()
    }

    #[tokio::test]
    async fn caller_scopes_are_reclaimed_on_drop() {
        let interp = Interpreter::start(InterpreterConfig::default(), clock_only()).unwrap();
        let caller = interp.caller().unwrap();
        assert_eq!(caller.now_ms().await.unwrap(), 7);
        let child = caller.child().unwrap();
        assert_eq!(interp.inner.shared.tree.len(), 3);
        drop(child);
        drop(caller);
        assert_eq!(interp.inner.shared.tree.len(), 1);
    }

    #[tokio::test]
    async fn lanes_are_distinct() {
        let interp = Interpreter::start(InterpreterConfig::default(), clock_only()).unwrap();
        let a = interp.caller().unwrap();
        let b = a.child().unwrap();
        assert_ne!(a.lane, b.lane);
    }

    #[tokio::test]
    async fn second_shutdown_is_a_no_op() {
        let interp = Interpreter::start(InterpreterConfig::default(), clock_only()).unwrap();
        interp.shutdown(CancelMode::Hard).await;
        interp.shutdown(CancelMode::Soft).await;
        assert!(interp.is_shut_down());
        assert!(matches!(interp.caller(), Err(EffectError::Shutdown)));
    }

    #[test]
    fn mismatch_stays_in_kind() {
        assert!(matches!(mismatch(EffectKind::KvSet), EffectError::Kv(_)));
        assert!(matches!(mismatch(EffectKind::Clock), EffectError::Clock(_)));
    }
}
