#![deny(missing_docs)]
//! Effect interpreter: binds runners to effect kinds and executes
//! effects under deadlines, cancellation and bounded admission.
//!
//! Every submitted effect resolves to exactly one `Result`: the runner's
//! own outcome, or a timeout, cancellation or panic expressed in the
//! kind's failure enum. Nothing a runner does can escape as an unwind.
//!
//! ```no_run
//! use effect0::{DurationMs, QueryMode};
//! use effectful_interp::{Interpreter, InterpreterConfig, Perform, Runners};
//! # use std::sync::Arc;
//! # async fn demo(db: Arc<impl effect0::DbRunner + 'static>) -> Result<(), Box<dyn std::error::Error>> {
//! let runners = Runners::builder()
//!     .db(db, DurationMs::from_millis(100))
//!     .build();
//! let interp = Interpreter::start(InterpreterConfig::default(), runners)?;
//!
//! let caller = interp.caller()?;
//! let rows = caller
//!     .query(effect0::DbQuery::new("SELECT 1", vec![], QueryMode::One))
//!     .await?;
//! # let _ = rows;
//! interp.shutdown(effect0::CancelMode::Soft).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
mod dispatch;
mod interpreter;
mod registry;
mod stats;
mod supervise;
mod tree;

pub use config::{ConfigError, InterpreterConfig};
pub use interpreter::{CancelHandle, Caller, EffectHandle, Interpreter, Perform};
pub use registry::{Runners, RunnersBuilder};
pub use stats::Stats;
pub use tree::OpId;
