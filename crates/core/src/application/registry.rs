// Job Registry - single source of truth for all tracked jobs

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::{Job, JobId, JobKind, JobStatus, ProgressSnapshot};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};

/// Filter for [`JobRegistry::list`]
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub kind: Option<JobKind>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        self.kind.map_or(true, |k| job.kind == k) && self.status.map_or(true, |s| job.status == s)
    }
}

/// Per-status job counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total: usize,
    pub submitted: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// In-memory job store with per-job locking.
///
/// The outer map lock is held only for map access; each job carries its own
/// lock, held only for the duration of one state transition and never across
/// I/O. Unrelated batches therefore never contend with each other.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Mutex<Job>>>>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRegistry {
    pub fn new(id_provider: Arc<dyn IdProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            id_provider,
            time_provider,
        }
    }

    /// Production registry: UUID ids, system clock
    pub fn with_system_defaults() -> Self {
        use crate::port::id_provider::UuidProvider;
        use crate::port::time_provider::SystemTimeProvider;

        Self::new(Arc::new(UuidProvider), Arc::new(SystemTimeProvider))
    }

    pub fn time_provider(&self) -> Arc<dyn TimeProvider> {
        Arc::clone(&self.time_provider)
    }

    /// Create a new job in SUBMITTED state and return its id
    pub async fn create(&self, kind: JobKind, total_items: usize) -> JobId {
        let id = self.id_provider.generate_id();
        let job = Job::new(id.clone(), kind, total_items, self.time_provider.now_millis());

        self.jobs
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(job)));

        info!(job_id = %id, kind = %kind, total_items = %total_items, "Job created");
        id
    }

    /// Fetch a point-in-time copy of a job
    pub async fn get(&self, job_id: &str) -> Result<Job> {
        let entry = self.entry(job_id).await?;
        let job = entry.lock().await;
        Ok(job.clone())
    }

    /// Apply one atomic state transition under the job's own lock.
    ///
    /// The closure must not block: the lock is held only for the duration
    /// of the mutation, never across an external call.
    pub async fn update<F, R>(&self, job_id: &str, mutate: F) -> Result<R>
    where
        F: FnOnce(&mut Job) -> Result<R>,
    {
        let entry = self.entry(job_id).await?;
        let mut job = entry.lock().await;
        mutate(&mut job)
    }

    /// Remove a terminal job. Deleting a non-terminal job is rejected:
    /// callers must cancel and wait for the drain first.
    pub async fn delete(&self, job_id: &str) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;

        {
            let job = entry.lock().await;
            if !job.status.is_terminal() {
                return Err(AppError::InvalidState(format!(
                    "job {} is {}; cancel it before deleting",
                    job_id, job.status
                )));
            }
        }

        let entry = jobs.remove(job_id).ok_or_else(|| {
            // Unreachable while the write lock is held
            AppError::NotFound(format!("job {}", job_id))
        })?;
        let job = entry.lock().await.clone();
        info!(job_id = %job_id, status = %job.status, "Job deleted");
        Ok(job)
    }

    /// List jobs matching the filter, newest first
    pub async fn list(&self, filter: &JobFilter) -> Vec<Job> {
        let entries: Vec<Arc<Mutex<Job>>> = self.jobs.read().await.values().cloned().collect();

        let mut out = Vec::new();
        for entry in entries {
            let job = entry.lock().await;
            if filter.matches(&job) {
                out.push(job.clone());
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        out
    }

    /// Per-status counts across all tracked jobs
    pub async fn stats(&self) -> RegistryStats {
        let entries: Vec<Arc<Mutex<Job>>> = self.jobs.read().await.values().cloned().collect();

        let mut stats = RegistryStats::default();
        for entry in entries {
            let job = entry.lock().await;
            stats.total += 1;
            match job.status {
                JobStatus::Submitted => stats.submitted += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Succeeded => stats.succeeded += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Progress snapshot as of now
    pub async fn snapshot(&self, job_id: &str) -> Result<ProgressSnapshot> {
        let entry = self.entry(job_id).await?;
        let now = self.time_provider.now_millis();
        let job = entry.lock().await;
        debug!(job_id = %job_id, status = %job.status, "Snapshot requested");
        Ok(job.snapshot(now))
    }

    async fn entry(&self, job_id: &str) -> Result<Arc<Mutex<Job>>> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))
    }
}
