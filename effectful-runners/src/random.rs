//! Operating-system randomness.

use async_trait::async_trait;
use effect0::{RandomFailure, RandomRunner};
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Default per-draw limit: 1 MiB.
pub const DEFAULT_MAX_LEN: usize = 1 << 20;

/// A [`RandomRunner`] drawing from the OS entropy source.
#[derive(Debug, Clone, Copy)]
pub struct OsRandom {
    max_len: usize,
}

impl Default for OsRandom {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl OsRandom {
    /// Create with the default per-draw limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap a single draw at `max_len` bytes.
    #[must_use]
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

#[async_trait]
impl RandomRunner for OsRandom {
    async fn fill(&self, len: usize) -> Result<Vec<u8>, RandomFailure> {
        if len > self.max_len {
            return Err(RandomFailure::TooLarge {
                requested: len,
                max: self.max_len,
            });
        }
        let mut buf = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| RandomFailure::Source(e.to_string()))?;
        Ok(buf)
    }
}
