//! Pipeline configuration loaded from environment variables.

use std::time::Duration;

/// Tuning knobs for the command pipeline.
///
/// Reads from environment variables:
/// - `PIPELINE_MAX_RETRIES` — retries after a version conflict (default: `3`)
/// - `PIPELINE_RETRY_BACKOFF_MS` — base backoff, doubled per retry (default: `10`)
/// - `PIPELINE_UNDO_DEPTH` — retained undo frames per aggregate (default: `10`)
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How many times a conflicted command is retried with a refreshed
    /// version before surfacing the conflict.
    pub max_retries: u32,

    /// Base backoff between retries; attempt `n` sleeps
    /// `retry_backoff * 2^(n-1)`, which bounds total retry wall-clock.
    pub retry_backoff: Duration,

    /// How many committed (payload, version) pairs are retained per
    /// aggregate for undo.
    pub undo_depth: usize,
}

impl PipelineConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            max_retries: std::env::var("PIPELINE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            retry_backoff: Duration::from_millis(
                std::env::var("PIPELINE_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            undo_depth: std::env::var("PIPELINE_UNDO_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }

    /// Returns the backoff before retry attempt `n` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.retry_backoff * 2u32.saturating_pow(retry.saturating_sub(1))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff: Duration::from_millis(10),
            undo_depth: 10,
        }
    }
}
