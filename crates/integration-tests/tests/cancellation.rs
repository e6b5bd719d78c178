// Cooperative cancellation: in-flight items drain, nothing new dispatches

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use mediaflow_core::application::{BatchCoordinator, JobRegistry};
use mediaflow_core::domain::JobStatus;
use mediaflow_core::port::item_worker::mocks::{MockBehavior, MockItemWorker};
use mediaflow_core::AppError;

fn coordinator() -> (Arc<JobRegistry>, BatchCoordinator) {
    let registry = Arc::new(JobRegistry::with_system_defaults());
    let coordinator = BatchCoordinator::new(Arc::clone(&registry));
    (registry, coordinator)
}

async fn wait_terminal(coordinator: &BatchCoordinator, job_id: &str) -> Result<JobStatus> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = coordinator.status(job_id).await?;
        if snapshot.status.is_terminal() {
            return Ok(snapshot.status);
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("job {} never reached a terminal state", job_id);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_mid_batch_drains_in_flight() -> Result<()> {
    let (_registry, coordinator) = coordinator();

    let worker = Arc::new(MockItemWorker::new(MockBehavior::Delay(
        Duration::from_millis(150),
    )));
    let items: Vec<String> = (0..10).map(|i| format!("item-{}", i)).collect();

    let job_id = coordinator.submit(items, worker.clone(), 2).await?;

    // Let the two workers start their first items, then cancel
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(coordinator.cancel(&job_id).await?);

    let status = wait_terminal(&coordinator, &job_id).await?;
    assert_eq!(status, JobStatus::Cancelled);

    let snapshot = coordinator.status(&job_id).await?;
    // The two in-flight items drained; nothing further was dispatched
    assert!(snapshot.completed_items + snapshot.failed_items <= 2);
    assert!(worker.call_count() <= 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_returns_before_drain() -> Result<()> {
    let (_registry, coordinator) = coordinator();

    let worker = Arc::new(MockItemWorker::new(MockBehavior::Delay(
        Duration::from_millis(200),
    )));
    let items: Vec<String> = (0..4).map(|i| format!("item-{}", i)).collect();
    let job_id = coordinator.submit(items, worker, 2).await?;

    tokio::time::sleep(Duration::from_millis(20)).await;

    // cancel() acknowledges immediately while items are still in flight
    let acknowledged = coordinator.cancel(&job_id).await?;
    assert!(acknowledged);
    let snapshot = coordinator.status(&job_id).await?;
    assert!(!snapshot.status.is_terminal());

    wait_terminal(&coordinator, &job_id).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_terminal_job_is_invalid() -> Result<()> {
    let (_registry, coordinator) = coordinator();

    let worker = Arc::new(MockItemWorker::new_success());
    let job_id = coordinator.submit(vec!["only".to_string()], worker, 1).await?;
    wait_terminal(&coordinator, &job_id).await?;

    let err = coordinator.cancel(&job_id).await.unwrap_err();
    assert!(matches!(err, AppError::Domain(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_unknown_job_is_not_found() {
    let (_registry, coordinator) = coordinator();

    let err = coordinator.cancel("no-such-job").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancel_after_all_dispatched_reports_succeeded() -> Result<()> {
    let (_registry, coordinator) = coordinator();

    // Pool as wide as the batch: everything dispatches at once
    let worker = Arc::new(MockItemWorker::new(MockBehavior::Delay(
        Duration::from_millis(300),
    )));
    let items: Vec<String> = (0..3).map(|i| format!("item-{}", i)).collect();
    let job_id = coordinator.submit(items, worker, 3).await?;

    tokio::time::sleep(Duration::from_millis(50)).await;
    coordinator.cancel(&job_id).await?;

    // Nothing was skipped, so the drain settles as SUCCEEDED
    let status = wait_terminal(&coordinator, &job_id).await?;
    assert_eq!(status, JobStatus::Succeeded);
    let snapshot = coordinator.status(&job_id).await?;
    assert_eq!(snapshot.completed_items, 3);
    Ok(())
}
