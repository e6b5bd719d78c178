// Engine configuration
// Env-var driven with compiled defaults (MEDIAFLOW_* variables); serde so an
// embedding binary can layer file-based config on top.

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::application::constants::{
    DEFAULT_CONCURRENCY_LIMIT, DEFAULT_POLL_CACHE_TTL_MS, DEFAULT_POLL_SWEEP_INTERVAL,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::application::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cache window for non-terminal external handles
    pub poll_cache_ttl_ms: i64,
    /// Background sweep interval for stale handles
    pub poll_sweep_interval_ms: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Worker pool size used when the caller does not pass one
    pub default_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_cache_ttl_ms: DEFAULT_POLL_CACHE_TTL_MS,
            poll_sweep_interval_ms: DEFAULT_POLL_SWEEP_INTERVAL.as_millis() as u64,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            default_concurrency: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any MEDIAFLOW_* environment variables present.
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("MEDIAFLOW_POLL_CACHE_TTL_MS") {
            config.poll_cache_ttl_ms = v;
        }
        if let Some(v) = env_parse("MEDIAFLOW_POLL_SWEEP_INTERVAL_MS") {
            config.poll_sweep_interval_ms = v;
        }
        if let Some(v) = env_parse("MEDIAFLOW_RETRY_MAX_ATTEMPTS") {
            config.retry_max_attempts = v;
        }
        if let Some(v) = env_parse("MEDIAFLOW_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = v;
        }
        if let Some(v) = env_parse("MEDIAFLOW_RETRY_MAX_DELAY_MS") {
            config.retry_max_delay_ms = v;
        }
        if let Some(v) = env_parse("MEDIAFLOW_DEFAULT_CONCURRENCY") {
            config.default_concurrency = v;
        }
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    pub fn poll_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.poll_sweep_interval_ms)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
