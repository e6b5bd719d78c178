// Job Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};

/// Job ID (UUID v4)
pub type JobId = String;

/// Opaque per-item identifier supplied by the caller (file path, media id, ...)
pub type ItemId = String;

/// Kind of tracked work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    SingleItem,
    Batch,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::SingleItem => write!(f, "SINGLE_ITEM"),
            JobKind::Batch => write!(f, "BATCH"),
        }
    }
}

/// Job lifecycle status. Monotonic: a terminal status never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Submitted,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Submitted => write!(f, "SUBMITTED"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Succeeded => write!(f, "SUCCEEDED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One failed work item. Recorded on the job, never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub item_id: ItemId,
    pub message: String,
}

/// Point-in-time view of a job's progress, safe to hand to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub current_item: Option<ItemId>,
    pub elapsed_seconds: f64,
    /// Advisory only. None until the job has started.
    pub eta_seconds: Option<f64>,
    pub errors: Vec<ItemError>,
}

/// Job Entity - one tracked unit of work (single item or batch)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,

    pub total_items: usize,
    /// Items handed to a worker so far. `dispatched - completed - failed`
    /// is the in-flight count the cancellation drain waits on.
    pub dispatched_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,

    /// Best-effort: last dispatched item. Cleared on terminal transition.
    pub current_item: Option<ItemId>,

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,

    /// Append-only per-item failure log
    pub errors: Vec<ItemError>,

    /// Set by cancel(); observed cooperatively by workers between items
    pub cancel_requested: bool,

    /// Coordinator fault message, set only when status == FAILED
    pub fault: Option<String>,
}

impl Job {
    /// Create a new job.
    ///
    /// `id` and `created_at` are injected (never generated here) so tests
    /// stay deterministic.
    pub fn new(id: impl Into<String>, kind: JobKind, total_items: usize, created_at: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            status: JobStatus::Submitted,
            total_items,
            dispatched_items: 0,
            completed_items: 0,
            failed_items: 0,
            current_item: None,
            created_at,
            started_at: None,
            completed_at: None,
            errors: Vec::new(),
            cancel_requested: false,
            fault: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp (tests only).
    ///
    /// Uses a simple counter (job-1, job-2, ...); timestamps start at 1000
    /// and increment by 1000.
    pub fn new_test(kind: JobKind, total_items: usize) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("job-{}", counter),
            kind,
            total_items,
            (counter * 1000) as i64,
        )
    }

    pub fn processed_items(&self) -> usize {
        self.completed_items + self.failed_items
    }

    pub fn in_flight_items(&self) -> usize {
        self.dispatched_items
            .saturating_sub(self.processed_items())
    }

    /// Record that `item_id` was handed to a worker
    pub fn begin_item(&mut self, item_id: ItemId) -> Result<()> {
        self.ensure_open("dispatch item")?;
        if self.dispatched_items >= self.total_items {
            return Err(DomainError::CounterOverflow {
                job_id: self.id.clone(),
                detail: format!("dispatch beyond total_items={}", self.total_items),
            });
        }
        self.dispatched_items += 1;
        self.current_item = Some(item_id);
        Ok(())
    }

    /// Record one successfully completed item
    pub fn mark_item_done(&mut self) -> Result<()> {
        self.ensure_open("complete item")?;
        if self.processed_items() >= self.total_items {
            return Err(DomainError::CounterOverflow {
                job_id: self.id.clone(),
                detail: format!("completion beyond total_items={}", self.total_items),
            });
        }
        self.completed_items += 1;
        Ok(())
    }

    /// Record one failed item. The failure never aborts the batch.
    pub fn mark_item_failed(&mut self, item_id: ItemId, message: impl Into<String>) -> Result<()> {
        self.ensure_open("fail item")?;
        if self.processed_items() >= self.total_items {
            return Err(DomainError::CounterOverflow {
                job_id: self.id.clone(),
                detail: format!("completion beyond total_items={}", self.total_items),
            });
        }
        self.failed_items += 1;
        self.errors.push(ItemError {
            item_id,
            message: message.into(),
        });
        Ok(())
    }

    /// Request cooperative cancellation. Workers stop pulling new items;
    /// in-flight items always drain.
    pub fn request_cancel(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: JobStatus::Cancelled.to_string(),
            });
        }
        self.cancel_requested = true;
        Ok(())
    }

    /// The only way status moves: SUBMITTED -> RUNNING on first call, and
    /// RUNNING -> terminal once all items drained (SUCCEEDED, per-item
    /// failures notwithstanding) or cancellation was observed with nothing
    /// left in flight (CANCELLED). Idempotent once terminal.
    pub fn advance(&mut self, now_millis: i64) -> JobStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if self.status == JobStatus::Submitted {
            self.status = JobStatus::Running;
            self.started_at = Some(now_millis);
        }
        if self.processed_items() == self.total_items {
            self.finish(JobStatus::Succeeded, now_millis);
        } else if self.cancel_requested && self.in_flight_items() == 0 {
            self.finish(JobStatus::Cancelled, now_millis);
        }
        self.status
    }

    /// Mark the whole batch FAILED on a coordinator fault (worker panic).
    /// Per-item failures never land here. No-op once terminal.
    pub fn fail(&mut self, fault: impl Into<String>, now_millis: i64) {
        if self.status.is_terminal() {
            return;
        }
        self.fault = Some(fault.into());
        self.finish(JobStatus::Failed, now_millis);
    }

    fn finish(&mut self, status: JobStatus, now_millis: i64) {
        self.status = status;
        self.completed_at = Some(now_millis);
        self.current_item = None;
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: action.to_string(),
            });
        }
        Ok(())
    }

    /// Build a progress snapshot as of `now_millis`.
    ///
    /// ETA is `elapsed * remaining / max(processed, 1)`: advisory, never
    /// negative, never a division by zero.
    pub fn snapshot(&self, now_millis: i64) -> ProgressSnapshot {
        let elapsed_ms = match self.started_at {
            Some(started) => self.completed_at.unwrap_or(now_millis).max(started) - started,
            None => 0,
        };
        let elapsed_seconds = elapsed_ms as f64 / 1000.0;

        let eta_seconds = if self.started_at.is_none() || self.status.is_terminal() {
            None
        } else {
            let remaining = (self.total_items - self.processed_items()) as f64;
            let divisor = self.processed_items().max(1) as f64;
            Some((elapsed_seconds * remaining / divisor).max(0.0))
        };

        ProgressSnapshot {
            job_id: self.id.clone(),
            kind: self.kind,
            status: self.status,
            total_items: self.total_items,
            completed_items: self.completed_items,
            failed_items: self.failed_items,
            current_item: self.current_item.clone(),
            elapsed_seconds,
            eta_seconds,
            errors: self.errors.clone(),
        }
    }
}
