// Rescan flow: reconcile disk vs records, then apply the change-set as a batch

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use mediaflow_core::application::{reconcile, BatchCoordinator, JobRegistry, WorkKind, WorkerSet};
use mediaflow_core::domain::{DiskEntry, JobStatus, RecordedEntry};
use mediaflow_core::port::item_worker::mocks::MockItemWorker;

fn rec(id: i64, path: &str, name: &str, size: u64, mtime: i64) -> RecordedEntry {
    RecordedEntry {
        id,
        path: path.to_string(),
        name: name.to_string(),
        size_bytes: size,
        mtime,
    }
}

fn disk(path: &str, name: &str, size: u64, mtime: i64) -> DiskEntry {
    DiskEntry {
        path: path.to_string(),
        name: name.to_string(),
        size_bytes: size,
        mtime,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_new_files_become_an_import_batch() -> Result<()> {
    let recorded = vec![
        rec(1, "/media/kept.mp4", "kept.mp4", 100, 10),
        rec(2, "/media/moved.mp4", "moved.mp4", 200, 20),
    ];
    let on_disk = vec![
        disk("/media/kept.mp4", "kept.mp4", 100, 10),
        disk("/media/archive/moved.mp4", "moved.mp4", 200, 20),
        disk("/media/new-a.mp4", "new-a.mp4", 300, 30),
        disk("/media/new-b.mp4", "new-b.mp4", 400, 40),
    ];

    let change_set = reconcile(&recorded, &on_disk);
    assert_eq!(change_set.matched.len(), 1);
    assert_eq!(change_set.moved.len(), 1);
    assert_eq!(change_set.new.len(), 2);

    // Applying the change-set is itself a batch job over the new paths
    let registry = Arc::new(JobRegistry::with_system_defaults());
    let coordinator = BatchCoordinator::new(Arc::clone(&registry));

    let mut workers = WorkerSet::new();
    let import_worker = Arc::new(MockItemWorker::new_success());
    workers.register(WorkKind::Rescan, import_worker.clone());

    let items: Vec<String> = change_set.new.iter().map(|e| e.path.clone()).collect();
    let job_id = coordinator
        .submit(items.clone(), workers.resolve(WorkKind::Rescan)?, 2)
        .await?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = coordinator.status(&job_id).await?;
        if snapshot.status.is_terminal() {
            assert_eq!(snapshot.status, JobStatus::Succeeded);
            assert_eq!(snapshot.completed_items, 2);
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("import batch never finished");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut imported = import_worker.calls();
    imported.sort();
    assert_eq!(imported, items);
    Ok(())
}
