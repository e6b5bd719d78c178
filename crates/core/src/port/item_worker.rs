// Item Worker Port
// The per-item work function a batch fans out: analysis, transcription,
// rescan-apply. Opaque to the coordinator, which only sees Result | Error.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ItemId;

/// Failure of a single work item. Recorded on the job; never aborts the batch.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct WorkError {
    pub message: String,
}

impl WorkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One unit of work per item
#[async_trait]
pub trait ItemWorker: Send + Sync {
    /// Execute the work for `item_id`. The result payload is the caller's
    /// concern (typically written to the metadata store by the worker
    /// itself); the coordinator only records success or failure.
    async fn run(&self, item_id: &ItemId) -> Result<serde_json::Value, WorkError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock worker behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Fail items whose id is in the set, succeed the rest
        FailItems(HashSet<ItemId>),
        /// Panic on items whose id is in the set (fault isolation testing)
        PanicOn(HashSet<ItemId>),
        /// Sleep before succeeding (cancellation testing)
        Delay(Duration),
    }

    /// Mock Item Worker for testing
    pub struct MockItemWorker {
        behavior: MockBehavior,
        calls: Mutex<Vec<ItemId>>,
    }

    impl MockItemWorker {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_failing(items: impl IntoIterator<Item = &'static str>) -> Self {
            Self::new(MockBehavior::FailItems(
                items.into_iter().map(String::from).collect(),
            ))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<ItemId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ItemWorker for MockItemWorker {
        async fn run(&self, item_id: &ItemId) -> Result<serde_json::Value, WorkError> {
            self.calls.lock().unwrap().push(item_id.clone());

            match &self.behavior {
                MockBehavior::Success => Ok(serde_json::json!({"item": item_id})),
                MockBehavior::FailItems(failing) => {
                    if failing.contains(item_id) {
                        Err(WorkError::new(format!("mock failure for {}", item_id)))
                    } else {
                        Ok(serde_json::json!({"item": item_id}))
                    }
                }
                MockBehavior::PanicOn(panicking) => {
                    if panicking.contains(item_id) {
                        panic!("mock panic for {}", item_id);
                    }
                    Ok(serde_json::json!({"item": item_id}))
                }
                MockBehavior::Delay(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(serde_json::json!({"item": item_id}))
                }
            }
        }
    }
}
