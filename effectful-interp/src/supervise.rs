//! Per-invocation supervision: deadline, cancellation and panic capture.
//!
//! Every runner call is spawned on its own task and raced against its
//! deadline and its cancellation signal. Whatever happens inside the
//! task, the caller gets exactly one result in the kind's failure type.

use crate::tree::CancelSignal;
use effect0::{CancelMode, DurationMs, Failure};
use std::any::Any;
use std::future::Future;
use tokio::task::JoinError;
use tokio::time::Instant;

/// Run `call` under `timeout`, observing `cancel`.
///
/// - Completion within the deadline returns the runner's own result.
/// - Deadline first: `F::timed_out(timeout)`. The task is detached; its
///   late result is discarded.
/// - Hard cancel: the task is aborted at its next await point.
/// - Soft cancel: the task gets `grace` (capped at the time left before
///   the deadline) to finish, then is aborted. A hard request during the
///   grace window aborts at once. The runner's result is discarded either
///   way; the caller sees `Cancelled`.
/// - A panic inside the runner becomes `F::panicked`.
pub(crate) async fn supervise<T, F, Fut>(
    timeout: DurationMs,
    grace: DurationMs,
    mut cancel: CancelSignal,
    call: Fut,
) -> Result<T, F>
where
    T: Send + 'static,
    F: Failure,
    Fut: Future<Output = Result<T, F>> + Send + 'static,
{
    let already = *cancel.borrow_and_update();
    if let Some(mode) = already {
        return Err(F::cancelled(mode));
    }

    let started = Instant::now();
    let mut task = tokio::spawn(call);
    let deadline = tokio::time::sleep(timeout.to_std());
    tokio::pin!(deadline);

    tokio::select! {
        biased;

        joined = &mut task => settle(joined),

        () = &mut deadline => Err(F::timed_out(timeout)),

        mode = requested(&mut cancel) => match mode {
            CancelMode::Hard => {
                task.abort();
                Err(F::cancelled(CancelMode::Hard))
            }
            CancelMode::Soft => {
                let left = timeout.saturating_sub(DurationMs::from(started.elapsed()));
                let window = grace.min(left).to_std();
                let mode = tokio::select! {
                    _ = tokio::time::timeout(window, &mut task) => CancelMode::Soft,
                    () = escalated(&mut cancel) => CancelMode::Hard,
                };
                task.abort();
                Err(F::cancelled(mode))
            }
        },
    }
}

/// Resolves once any cancellation is requested. Never resolves if the
/// signal's sender is gone.
async fn requested(cancel: &mut CancelSignal) -> CancelMode {
    let seen = match cancel.wait_for(Option::is_some).await {
        Ok(mode) => *mode,
        Err(_) => None,
    };
    match seen {
        Some(mode) => mode,
        None => std::future::pending().await,
    }
}

/// Resolves once a hard cancellation is requested.
async fn escalated(cancel: &mut CancelSignal) {
    let hard = cancel
        .wait_for(|m| *m == Some(CancelMode::Hard))
        .await
        .is_ok();
    if !hard {
        std::future::pending::<()>().await;
    }
}

fn settle<T, F: Failure>(joined: Result<Result<T, F>, JoinError>) -> Result<T, F> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(F::panicked(panic_message(e.into_panic()))),
        Err(_) => Err(F::cancelled(CancelMode::Hard)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
