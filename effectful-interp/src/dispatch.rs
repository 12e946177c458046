//! The dispatch loop.
//!
//! A single task owns the lane table. Jobs arrive on the intake channel
//! tagged with a lane; a lane runs one job at a time, in arrival order.
//! Distinct lanes run concurrently. The loop itself never awaits a
//! runner: each job runs on its own task and reports back on the
//! completion channel when it resolves.

use crate::registry::Runners;
use crate::stats::{Counters, Outcome};
use crate::tree::{CancelSignal, CancelTree, OpId};
use effect0::{DurationMs, Effect, EffectError, EffectOutput};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Serialization domain. One per caller; anonymous submissions get a
/// fresh lane each.
pub(crate) type LaneId = u64;

pub(crate) type Reply = oneshot::Sender<Result<EffectOutput, EffectError>>;

/// An admitted request waiting for its lane.
pub(crate) struct Job {
    pub(crate) lane: LaneId,
    pub(crate) effect: Effect,
    pub(crate) op: OpId,
    pub(crate) cancel: CancelSignal,
    pub(crate) reply: Reply,
    /// Admission slot; released when the job resolves.
    pub(crate) permit: OwnedSemaphorePermit,
}

/// State shared by the loop and every job task.
pub(crate) struct Shared {
    pub(crate) runners: Runners,
    pub(crate) tree: Arc<CancelTree>,
    pub(crate) grace: DurationMs,
    pub(crate) counters: Counters,
}

/// Run until `stop` fires (or every intake sender is gone) and every
/// admitted job has resolved.
pub(crate) async fn run_loop(
    shared: Arc<Shared>,
    mut intake: mpsc::Receiver<Job>,
    stop: CancellationToken,
) {
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<LaneId>();
    let mut waiting: HashMap<LaneId, VecDeque<Job>> = HashMap::new();
    let mut busy = 0usize;
    let mut draining = false;
    let mut intake_open = true;

    loop {
        tokio::select! {
            () = stop.cancelled(), if !draining => {
                // Buffered jobs are still delivered; nothing new gets in.
                intake.close();
                draining = true;
            }
            job = intake.recv(), if intake_open => match job {
                Some(job) => {
                    let lane = job.lane;
                    match waiting.get_mut(&lane) {
                        Some(queue) => queue.push_back(job),
                        None => {
                            waiting.insert(lane, VecDeque::new());
                            busy += 1;
                            start(&shared, job, &done_tx);
                        }
                    }
                }
                None => intake_open = false,
            },
            Some(lane) = done_rx.recv() => {
                let next = waiting.get_mut(&lane).and_then(VecDeque::pop_front);
                match next {
                    Some(job) => start(&shared, job, &done_tx),
                    None => {
                        waiting.remove(&lane);
                        busy -= 1;
                    }
                }
            }
            else => break,
        }

        if !intake_open && busy == 0 {
            break;
        }
    }

    tracing::debug!("effectful.interp.drained");
}

/// Spawn one job. Its lane stays busy until the completion is reported.
fn start(shared: &Arc<Shared>, job: Job, done: &mpsc::UnboundedSender<LaneId>) {
    let shared = Arc::clone(shared);
    let done = done.clone();
    tokio::spawn(async move {
        let Job {
            lane,
            effect,
            op,
            cancel,
            reply,
            permit,
        } = job;
        let kind = effect.kind();
        let started = Instant::now();
        tracing::debug!(kind = %kind, lane, "effectful.effect.start");

        let result = shared.runners.run(effect, shared.grace, cancel).await;

        let outcome = Outcome::of(&result);
        let elapsed_ms = DurationMs::from(started.elapsed()).as_millis();
        match (&result, outcome) {
            (Err(e), Outcome::TimedOut) => {
                tracing::warn!(kind = %kind, lane, elapsed_ms, error = %e, "effectful.effect.timeout");
            }
            (Err(e), Outcome::Cancelled) => {
                tracing::debug!(kind = %kind, lane, elapsed_ms, error = %e, "effectful.effect.cancel");
            }
            _ => {}
        }
        tracing::debug!(
            kind = %kind,
            lane,
            elapsed_ms,
            outcome = outcome.as_str(),
            "effectful.effect.finish"
        );

        shared.counters.resolved(outcome);
        shared.tree.settle(op);
        drop(permit);
        // The caller may have dropped its handle; the result is then discarded.
        let _ = reply.send(result);
        let _ = done.send(lane);
    });
}
