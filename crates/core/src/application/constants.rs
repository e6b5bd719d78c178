// Engine constants (no magic values)
use std::time::Duration;

/// Cache window for non-terminal external handles (30s).
/// Bounds remote polling to roughly 2 calls/minute per in-flight job.
pub const DEFAULT_POLL_CACHE_TTL_MS: i64 = 30_000;

/// Background sweep interval for stale handles (5s)
pub const DEFAULT_POLL_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Default retry attempt ceiling
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default retry base delay (1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Default retry delay ceiling (30s)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Default worker pool size per batch. A configured cap, never proportional
/// to item count: external providers rate-limit us.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;
