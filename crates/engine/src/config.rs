// crates/engine/src/config.rs
//! Engine configuration.

use std::time::Duration;

/// Tuning knobs for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of each per-job progress channel. A slow subscriber loses
    /// the oldest updates instead of stalling the producer.
    pub job_channel_capacity: usize,
    /// Capacity of the engine-wide progress channel.
    pub global_channel_capacity: usize,
    /// Backoff for resolving a callback that raced its own registration.
    pub resolve_backoff: BackoffConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            job_channel_capacity: 64,
            global_channel_capacity: 256,
            resolve_backoff: BackoffConfig::default(),
        }
    }
}

/// Bounded exponential backoff: `initial_delay * 2^n`, capped at
/// `max_delay`, for at most `max_retries` sleeps.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            max_retries: 5,
        }
    }
}
