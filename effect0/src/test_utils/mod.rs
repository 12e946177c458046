//! Scripted runner implementations for testing.
//!
//! Available behind the `test-utils` feature flag. Each one is a minimal,
//! deterministic runner that makes one interpreter behavior observable:
//! canned rows after a delay, a call that never resolves, a dependency
//! error, a panic, a recorded log line, a fixed clock.

mod failing_http;
mod fixed_clock;
mod panicking;
mod recording_log;
mod scripted_db;
mod stalled;

pub use failing_http::FailingHttp;
pub use fixed_clock::FixedClock;
pub use panicking::PanickingRunner;
pub use recording_log::RecordingLog;
pub use scripted_db::ScriptedDb;
pub use stalled::StalledRunner;
