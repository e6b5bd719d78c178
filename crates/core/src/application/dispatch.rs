// Work-kind dispatch - closed set of work the engine runs per item

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::port::ItemWorker;

/// The closed set of per-item work the service runs. Each kind resolves to
/// exactly one worker at submission time; the coordinator never branches on
/// kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkKind {
    /// Object/face detection on one media file
    Analyze,
    /// Speech-to-text on one media file
    Transcribe,
    /// Generative summary of one media file
    Summarize,
    /// Apply one rescan change-set entry (import/move/delete)
    Rescan,
}

impl std::fmt::Display for WorkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkKind::Analyze => write!(f, "ANALYZE"),
            WorkKind::Transcribe => write!(f, "TRANSCRIBE"),
            WorkKind::Summarize => write!(f, "SUMMARIZE"),
            WorkKind::Rescan => write!(f, "RESCAN"),
        }
    }
}

/// Registration table mapping each [`WorkKind`] to its worker
#[derive(Default)]
pub struct WorkerSet {
    workers: HashMap<WorkKind, Arc<dyn ItemWorker>>,
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: WorkKind, worker: Arc<dyn ItemWorker>) -> &mut Self {
        self.workers.insert(kind, worker);
        self
    }

    /// Resolve the worker for `kind`, done once per submission
    pub fn resolve(&self, kind: WorkKind) -> Result<Arc<dyn ItemWorker>> {
        self.workers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("no worker registered for {}", kind)))
    }
}
