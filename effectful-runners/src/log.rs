//! Log sink that forwards to `tracing`.

use async_trait::async_trait;
use effect0::{LogFailure, LogLevel, LogRunner};

/// A [`LogRunner`] emitting each line as a `tracing` event under the
/// `effectful::log` target.
///
/// The optional source tag is attached as a `source` field so lines from
/// different components can be told apart.
#[derive(Debug, Clone, Default)]
pub struct TracingLog {
    source: Option<String>,
}

impl TracingLog {
    /// Create a sink with no source tag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every line with `source`.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[async_trait]
impl LogRunner for TracingLog {
    async fn emit(&self, level: LogLevel, message: String) -> Result<(), LogFailure> {
        let source = self.source.as_deref().unwrap_or("-");
        match level {
            LogLevel::Trace => tracing::trace!(target: "effectful::log", source, "{message}"),
            LogLevel::Debug => tracing::debug!(target: "effectful::log", source, "{message}"),
            LogLevel::Info => tracing::info!(target: "effectful::log", source, "{message}"),
            LogLevel::Warn => tracing::warn!(target: "effectful::log", source, "{message}"),
            LogLevel::Error => tracing::error!(target: "effectful::log", source, "{message}"),
        }
        Ok(())
    }
}
