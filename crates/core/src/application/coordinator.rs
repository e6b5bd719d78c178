// Batch Coordinator - fans items out across a bounded worker pool

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::registry::JobRegistry;
use crate::domain::{ItemId, JobId, JobKind, ProgressSnapshot};
use crate::error::{AppError, Result};
use crate::port::{ItemWorker, TimeProvider};

/// Fans a list of work items out across a fixed-size worker pool, tracking
/// progress in the [`JobRegistry`].
///
/// Partial-failure guarantee: a failing item is recorded on the job and the
/// batch keeps going. Only a fault of the pool itself (a worker panic) marks
/// the whole batch FAILED.
pub struct BatchCoordinator {
    registry: Arc<JobRegistry>,
    time_provider: Arc<dyn TimeProvider>,
}

impl BatchCoordinator {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        let time_provider = registry.time_provider();
        Self {
            registry,
            time_provider,
        }
    }

    /// Submit a batch. Returns the job id immediately; work proceeds in the
    /// background on `concurrency_limit` workers.
    pub async fn submit(
        &self,
        items: Vec<ItemId>,
        worker: Arc<dyn ItemWorker>,
        concurrency_limit: usize,
    ) -> Result<JobId> {
        self.spawn_batch(JobKind::Batch, items, worker, concurrency_limit)
            .await
    }

    /// Submit one item as a SINGLE_ITEM job, sharing the batch machinery
    pub async fn submit_single(&self, item: ItemId, worker: Arc<dyn ItemWorker>) -> Result<JobId> {
        self.spawn_batch(JobKind::SingleItem, vec![item], worker, 1)
            .await
    }

    /// Re-run exactly the failed items of a terminal job as a new, smaller
    /// batch. The source job is left untouched.
    pub async fn resubmit_failed(
        &self,
        job_id: &str,
        worker: Arc<dyn ItemWorker>,
        concurrency_limit: usize,
    ) -> Result<JobId> {
        let source = self.registry.get(job_id).await?;
        if !source.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "job {} is {}; wait for it to finish before resubmitting",
                job_id, source.status
            )));
        }

        let items: Vec<ItemId> = source.errors.iter().map(|e| e.item_id.clone()).collect();
        info!(
            source_job_id = %job_id,
            failed_items = %items.len(),
            "Resubmitting failed items as new batch"
        );
        self.spawn_batch(JobKind::Batch, items, worker, concurrency_limit)
            .await
    }

    /// Request cooperative cancellation. Returns as soon as the flag is set;
    /// in-flight items drain before the job reaches CANCELLED.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        self.registry
            .update(job_id, |job| {
                job.request_cancel()?;
                Ok(())
            })
            .await?;
        info!(job_id = %job_id, "Cancellation requested");
        Ok(true)
    }

    /// Current progress snapshot
    pub async fn status(&self, job_id: &str) -> Result<ProgressSnapshot> {
        self.registry.snapshot(job_id).await
    }

    async fn spawn_batch(
        &self,
        kind: JobKind,
        items: Vec<ItemId>,
        worker: Arc<dyn ItemWorker>,
        concurrency_limit: usize,
    ) -> Result<JobId> {
        let job_id = self.registry.create(kind, items.len()).await;

        if items.is_empty() {
            // Nothing to dispatch: drive straight to the terminal state
            let now = self.time_provider.now_millis();
            self.registry
                .update(&job_id, |job| {
                    job.advance(now);
                    Ok(())
                })
                .await?;
            return Ok(job_id);
        }

        let pool_size = concurrency_limit.clamp(1, items.len());
        let queue = Arc::new(Mutex::new(items.into_iter().collect::<VecDeque<ItemId>>()));

        info!(job_id = %job_id, pool_size = %pool_size, "Starting worker pool");

        let mut handles: Vec<JoinHandle<Result<()>>> = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            handles.push(tokio::spawn(run_worker(
                Arc::clone(&self.registry),
                Arc::clone(&self.time_provider),
                job_id.clone(),
                Arc::clone(&queue),
                Arc::clone(&worker),
            )));
        }

        // Detached supervisor: joins the pool, converts panics into a
        // batch-level fault, applies the terminal transition.
        tokio::spawn(supervise(
            Arc::clone(&self.registry),
            Arc::clone(&self.time_provider),
            job_id.clone(),
            handles,
        ));

        Ok(job_id)
    }
}

/// One worker: pull items until the queue is empty or cancellation is
/// observed. The cancel check happens between items only; an item already
/// started always drains (external calls may have billable side effects).
async fn run_worker(
    registry: Arc<JobRegistry>,
    time_provider: Arc<dyn TimeProvider>,
    job_id: JobId,
    queue: Arc<Mutex<VecDeque<ItemId>>>,
    worker: Arc<dyn ItemWorker>,
) -> Result<()> {
    loop {
        let cancel_requested = registry
            .update(&job_id, |job| Ok(job.cancel_requested))
            .await?;
        if cancel_requested {
            debug!(job_id = %job_id, "Cancellation observed, worker stops pulling");
            break;
        }

        let item = { queue.lock().await.pop_front() };
        let Some(item) = item else { break };

        let now = time_provider.now_millis();
        registry
            .update(&job_id, |job| {
                job.begin_item(item.clone())?;
                job.advance(now);
                Ok(())
            })
            .await?;
        debug!(job_id = %job_id, item_id = %item, "Dispatching item");

        match worker.run(&item).await {
            Ok(_) => {
                let now = time_provider.now_millis();
                registry
                    .update(&job_id, |job| {
                        job.mark_item_done()?;
                        job.advance(now);
                        Ok(())
                    })
                    .await?;
                debug!(job_id = %job_id, item_id = %item, "Item completed");
            }
            Err(e) => {
                warn!(job_id = %job_id, item_id = %item, error = %e, "Item failed");
                let now = time_provider.now_millis();
                registry
                    .update(&job_id, |job| {
                        job.mark_item_failed(item.clone(), e.to_string())?;
                        job.advance(now);
                        Ok(())
                    })
                    .await?;
            }
        }
    }
    Ok(())
}

/// Join all workers. A panicked or internally failed worker is a coordinator
/// fault and marks the batch FAILED; otherwise the final advance() settles
/// the terminal state (SUCCEEDED on full drain, CANCELLED on an observed
/// cancel with items left undispatched).
async fn supervise(
    registry: Arc<JobRegistry>,
    time_provider: Arc<dyn TimeProvider>,
    job_id: JobId,
    handles: Vec<JoinHandle<Result<()>>>,
) {
    let mut fault: Option<String> = None;

    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                fault = Some(format!("worker error: {}", e));
            }
            Err(join_err) if join_err.is_panic() => {
                fault = Some(format!("worker panicked: {}", join_err));
            }
            Err(join_err) => {
                fault = Some(format!("worker cancelled: {}", join_err));
            }
        }
    }

    let now = time_provider.now_millis();
    let outcome = registry
        .update(&job_id, |job| {
            match &fault {
                Some(message) => job.fail(message.clone(), now),
                None => {
                    job.advance(now);
                }
            }
            Ok(job.status)
        })
        .await;

    match outcome {
        Ok(status) => {
            if let Some(message) = fault {
                error!(job_id = %job_id, fault = %message, "Batch failed on coordinator fault");
            } else {
                info!(job_id = %job_id, status = %status, "Batch settled");
            }
        }
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to settle batch");
        }
    }
}
