//! The prelude is enough to wire stock runners into an interpreter.

use effectful::prelude::*;
use serde_json::json;
use std::sync::Arc;

const MS_50: DurationMs = DurationMs::from_millis(50);

fn stock() -> Interpreter {
    let runners = Runners::builder()
        .kv(Arc::new(MemoryKv::new()), MS_50)
        .clock(Arc::new(SystemClock::new()), MS_50)
        .random(Arc::new(OsRandom::new()), MS_50)
        .log(Arc::new(TracingLog::new().with_source("composition")), MS_50)
        .build();
    Interpreter::start(InterpreterConfig::default(), runners).unwrap()
}

#[tokio::test]
async fn stock_runners_round_trip_through_the_interpreter() {
    let interp = stock();
    let caller = interp.caller().unwrap();

    caller
        .kv_set("session:1".into(), json!({"user": 7}))
        .await
        .unwrap();
    assert_eq!(
        caller.kv_get("session:1".into()).await.unwrap(),
        Some(json!({"user": 7}))
    );
    assert!(caller.now_ms().await.unwrap() > 0);
    assert_eq!(caller.random_bytes(16).await.unwrap().len(), 16);
    caller.log(LogLevel::Info, "done".into()).await.unwrap();

    interp.shutdown(CancelMode::Soft).await;
    assert_eq!(interp.stats().succeeded, 5);
}

#[tokio::test]
async fn unbound_db_is_reported_by_kind() {
    let interp = stock();
    let err = interp
        .query(DbQuery::new("SELECT 1", vec![], QueryMode::One))
        .await
        .unwrap_err();
    assert_eq!(err, EffectError::Unbound(EffectKind::Db));
}
