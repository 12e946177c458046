//! Interpreter acceptance tests.
//!
//! Tests cover:
//! - Deadlines: success inside, `Timeout` (never `Ok`) outside
//! - Dependency errors arrive as the kind's own variant
//! - Fail-fast admission under load
//! - Per-caller ordering vs. concurrent anonymous submissions
//! - Cancellation trees, hard and soft
//! - Panic capture, unbound kinds, shutdown

use effect0::test_utils::{FailingHttp, PanickingRunner, ScriptedDb, StalledRunner};
use effect0::*;
use effectful_interp::*;
use std::sync::Arc;
use std::time::Duration;

const MS_100: DurationMs = DurationMs::from_millis(100);

fn db_interp(db: Arc<ScriptedDb>, timeout: DurationMs) -> Interpreter {
    let runners = Runners::builder().db(db, timeout).build();
    Interpreter::start(InterpreterConfig::default(), runners).unwrap()
}

fn select_one() -> DbQuery {
    DbQuery::new("SELECT 1 AS one", vec![], QueryMode::One)
}

fn named(sql: &str) -> Effect {
    Effect::query(sql, vec![], QueryMode::Execute)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Deadlines and dependency errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn db_query_inside_deadline_returns_rows() {
    let db = Arc::new(
        ScriptedDb::new(vec![DbRow::new().with("one", 1i64)]).with_delay(Duration::from_millis(5)),
    );
    let interp = db_interp(Arc::clone(&db), MS_100);

    let rows = interp.query(select_one()).await.unwrap();
    assert_eq!(rows.first().and_then(|r| r.get("one")), Some(&SqlValue::Integer(1)));
    assert_eq!(db.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn db_query_past_deadline_times_out() {
    let db = Arc::new(
        ScriptedDb::new(vec![DbRow::new().with("one", 1i64)])
            .with_delay(Duration::from_millis(200)),
    );
    let interp = db_interp(db, MS_100);

    let err = interp.query(select_one()).await.unwrap_err();
    assert_eq!(err, EffectError::Db(DbFailure::Timeout(MS_100)));
    assert!(err.is_timeout());
}

#[tokio::test]
async fn connection_reset_is_an_http_connection_failure() {
    let runners = Runners::builder()
        .http(Arc::new(FailingHttp::connection_reset()), MS_100)
        .build();
    let interp = Interpreter::start(InterpreterConfig::default(), runners).unwrap();

    let err = interp
        .http(HttpRequest::get("https://unreachable.invalid/"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, EffectError::Http(HttpFailure::Connection(_))),
        "got {err:?}"
    );
}

#[tokio::test]
async fn runner_panic_becomes_panicked_and_interpreter_survives() {
    let runners = Runners::builder()
        .http(Arc::new(PanickingRunner::default()), MS_100)
        .log(Arc::new(effect0::test_utils::RecordingLog::new()), MS_100)
        .build();
    let interp = Interpreter::start(InterpreterConfig::default(), runners).unwrap();

    let err = interp
        .http(HttpRequest::get("https://example.com/"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EffectError::Http(HttpFailure::Panicked("runner exploded".into()))
    );

    interp.log(LogLevel::Info, "still alive".into()).await.unwrap();
    assert_eq!(interp.stats().failed, 1);
    assert_eq!(interp.stats().succeeded, 1);
}

#[tokio::test]
async fn unbound_kind_fails_at_submission() {
    let interp = db_interp(Arc::new(ScriptedDb::new(vec![])), MS_100);
    let err = interp.submit(Effect::now_ms()).unwrap_err();
    assert_eq!(err, EffectError::Unbound(EffectKind::Clock));
    assert_eq!(interp.stats().submitted, 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backpressure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn admission_bound_rejects_immediately_under_load() {
    let stalled = Arc::new(StalledRunner::new());
    let runners = Runners::builder()
        .db(Arc::clone(&stalled), DurationMs::from_secs(60))
        .build();
    let interp = Interpreter::start(
        InterpreterConfig::default().with_queue_capacity(100),
        runners,
    )
    .unwrap();

    let mut admitted = Vec::new();
    let mut rejected = 0usize;
    for i in 0..10_000 {
        match interp.submit(named("SELECT pg_sleep(3600)")) {
            Ok(handle) => admitted.push(handle),
            Err(EffectError::QueueFull { capacity }) => {
                assert_eq!(capacity, 100);
                assert!(i >= 100, "submission {i} rejected below the bound");
                rejected += 1;
            }
            Err(other) => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(admitted.len(), 100);
    assert_eq!(rejected, 9_900);

    let stats = interp.stats();
    assert_eq!(stats.submitted, 100);
    assert_eq!(stats.rejected, 9_900);
    assert_eq!(stats.in_flight, 100);

    interp.shutdown(CancelMode::Hard).await;
    for handle in admitted {
        let err = handle.await.unwrap_err();
        assert_eq!(err, EffectError::Db(DbFailure::Cancelled(CancelMode::Hard)));
    }
    assert_eq!(interp.stats().in_flight, 0);

    tokio::time::timeout(Duration::from_secs(5), async {
        while stalled.dropped() < stalled.started() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("aborted runner futures are dropped");
}

#[tokio::test]
async fn capacity_frees_up_after_resolution() {
    let db = Arc::new(ScriptedDb::new(vec![]));
    let runners = Runners::builder().db(db, MS_100).build();
    let interp =
        Interpreter::start(InterpreterConfig::default().with_queue_capacity(1), runners).unwrap();

    for _ in 0..5 {
        interp.perform(named("DELETE FROM t")).await.unwrap();
    }
    assert_eq!(interp.stats().succeeded, 5);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ordering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn one_caller_runs_effects_in_submission_order() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_millis(50)));
    let interp = db_interp(Arc::clone(&db), MS_100);
    let caller = interp.caller().unwrap();

    let a = caller.submit(named("A")).unwrap();
    let b = caller.submit(named("B")).unwrap();
    let c = caller.submit(named("C")).unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(db.calls(), vec!["A"], "B must wait for A");

    a.await.unwrap();
    b.await.unwrap();
    c.await.unwrap();
    assert_eq!(db.calls(), vec!["A", "B", "C"]);
}

#[tokio::test(start_paused = true)]
async fn independent_submissions_run_concurrently() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_millis(50)));
    let interp = db_interp(Arc::clone(&db), MS_100);

    let a = interp.submit(named("A")).unwrap();
    let b = interp.submit(named("B")).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(db.calls().len(), 2);

    a.await.unwrap();
    b.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn a_failure_does_not_block_the_lane() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_millis(200)));
    let interp = db_interp(Arc::clone(&db), MS_100);
    let caller = interp.caller().unwrap();

    let slow = caller.submit(named("SLOW")).unwrap();
    let bad = caller.submit(named("   ")).unwrap();
    assert!(slow.await.unwrap_err().is_timeout());
    assert!(matches!(
        bad.await,
        Err(EffectError::Db(DbFailure::InvalidQuery(_)))
    ));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cancellation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn cancelling_a_parent_cancels_all_children() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_secs(10)));
    let interp = db_interp(Arc::clone(&db), DurationMs::from_secs(60));
    let parent = interp.caller().unwrap();

    let children: Vec<Caller> = (0..3).map(|_| parent.child().unwrap()).collect();
    let handles: Vec<EffectHandle> = children
        .iter()
        .enumerate()
        .map(|(i, c)| c.submit(named(&format!("child {i}"))).unwrap())
        .collect();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(db.calls().len(), 3);

    parent.cancel_handle().cancel_and_wait(CancelMode::Hard).await;
    for handle in handles {
        assert_eq!(
            handle.await,
            Err(EffectError::Db(DbFailure::Cancelled(CancelMode::Hard)))
        );
    }
    assert_eq!(db.completed(), 0);
    assert!(children.iter().all(|c| c.cancel_handle().is_cancelled()));
}

#[tokio::test(start_paused = true)]
async fn queued_effects_of_a_cancelled_caller_never_start() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_secs(10)));
    let interp = db_interp(Arc::clone(&db), DurationMs::from_secs(60));
    let caller = interp.caller().unwrap();

    let handles: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|sql| caller.submit(named(sql)).unwrap())
        .collect();
    tokio::time::sleep(Duration::from_millis(10)).await;

    caller.cancel_handle().interrupt();
    for handle in handles {
        assert!(handle.await.unwrap_err().is_cancelled());
    }
    assert_eq!(db.calls(), vec!["A"]);
}

#[tokio::test(start_paused = true)]
async fn soft_cancel_lets_the_runner_finish() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_millis(50)));
    let interp = db_interp(Arc::clone(&db), MS_100);
    let caller = interp.caller().unwrap();

    let handle = caller.submit(named("UPDATE t SET x = 1")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    caller.cancel_handle().cancel_and_wait(CancelMode::Soft).await;

    assert_eq!(
        handle.await,
        Err(EffectError::Db(DbFailure::Cancelled(CancelMode::Soft)))
    );
    assert_eq!(db.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn soft_cancel_grace_is_bounded() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_secs(30)));
    let runners = Runners::builder()
        .db(Arc::clone(&db), DurationMs::from_secs(60))
        .build();
    let config =
        InterpreterConfig::default().with_soft_cancel_grace(DurationMs::from_millis(20));
    let interp = Interpreter::start(config, runners).unwrap();

    let handle = interp.submit(named("VACUUM")).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.cancel_handle().cancel_gracefully();

    assert!(handle.await.unwrap_err().is_cancelled());
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(db.completed(), 0);
}

#[tokio::test(start_paused = true)]
async fn new_work_under_a_cancelled_scope_starts_cancelled() {
    let db = Arc::new(ScriptedDb::new(vec![]));
    let interp = db_interp(Arc::clone(&db), MS_100);
    let caller = interp.caller().unwrap();
    caller.cancel_handle().interrupt();

    let child = caller.child().unwrap();
    let err = child.perform(named("INSERT")).await.unwrap_err();
    assert_eq!(err, EffectError::Db(DbFailure::Cancelled(CancelMode::Hard)));
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn cancelling_a_resolved_effect_changes_nothing() {
    let db = Arc::new(ScriptedDb::new(vec![]));
    let interp = db_interp(db, MS_100);

    let handle = interp.submit(named("DELETE FROM t")).unwrap();
    let cancel = handle.cancel_handle();
    assert_eq!(handle.await, Ok(EffectOutput::DbRows(DbRows::empty())));

    cancel.interrupt();
    assert!(!cancel.is_cancelled());
    assert_eq!(interp.stats().cancelled, 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shutdown
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_outstanding_and_refuses_new_work() {
    let db = Arc::new(ScriptedDb::new(vec![]).with_delay(Duration::from_secs(10)));
    let interp = db_interp(Arc::clone(&db), DurationMs::from_secs(60));
    let caller = interp.caller().unwrap();

    let in_flight = caller.submit(named("A")).unwrap();
    let queued = caller.submit(named("B")).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    interp.shutdown(CancelMode::Hard).await;
    assert!(in_flight.await.unwrap_err().is_cancelled());
    assert!(queued.await.unwrap_err().is_cancelled());

    assert_eq!(caller.submit(named("C")).unwrap_err(), EffectError::Shutdown);
    assert_eq!(interp.submit(named("D")).unwrap_err(), EffectError::Shutdown);
    assert_eq!(interp.stats().cancelled, 2);
}

#[test]
fn zero_capacity_is_a_config_error() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let err = Interpreter::start(
            InterpreterConfig::default().with_queue_capacity(0),
            Runners::default(),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::ZeroCapacity);
    });
}
