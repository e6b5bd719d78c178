// External Job Handle - cached view of a provider-owned async job

use serde::{Deserialize, Serialize};

use crate::domain::job::JobId;

/// Provider-assigned job identifier (video-analysis job id, batch-inference ARN, ...)
pub type ExternalId = String;

/// Last-observed status of an external job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalStatus {
    /// Provider-specific status value (e.g. "IN_PROGRESS", "SUCCEEDED")
    pub state: String,
    pub terminal: bool,
    /// Parsed result payload, present once terminal
    pub result: Option<serde_json::Value>,
}

impl ExternalStatus {
    pub fn in_progress(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            terminal: false,
            result: None,
        }
    }

    pub fn terminal(state: impl Into<String>, result: Option<serde_json::Value>) -> Self {
        Self {
            state: state.into(),
            terminal: true,
            result,
        }
    }
}

/// Cached polling state for one external job.
///
/// Lives as long as the owning job; evicted only when that job is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalJobHandle {
    pub external_id: ExternalId,
    /// Job that submitted this external work, used for eviction
    pub owner_job_id: Option<JobId>,
    /// Timestamp of the last successful remote query (epoch ms)
    pub last_checked_at: Option<i64>,
    /// Cached status may be served until this instant. Ignored once
    /// terminal: terminal external states are immutable and never re-queried.
    pub cache_until: Option<i64>,
    pub last_status: Option<ExternalStatus>,
    pub terminal: bool,
}

impl ExternalJobHandle {
    pub fn new(external_id: impl Into<String>, owner_job_id: Option<JobId>) -> Self {
        Self {
            external_id: external_id.into(),
            owner_job_id,
            last_checked_at: None,
            cache_until: None,
            last_status: None,
            terminal: false,
        }
    }

    /// True when the cached status may be returned without a remote call
    pub fn is_fresh(&self, now_millis: i64) -> bool {
        if self.terminal {
            return true;
        }
        matches!(self.cache_until, Some(until) if now_millis < until)
    }

    /// Record the outcome of a successful remote query.
    ///
    /// A failed query must NOT go through here: leaving the cache window
    /// untouched lets the next caller retry immediately.
    pub fn record(&mut self, status: ExternalStatus, now_millis: i64, cache_ttl_ms: i64) {
        self.last_checked_at = Some(now_millis);
        self.terminal = status.terminal;
        self.cache_until = if status.terminal {
            None // frozen via the terminal flag
        } else {
            Some(now_millis + cache_ttl_ms)
        };
        self.last_status = Some(status);
    }
}
