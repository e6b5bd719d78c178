// External Provider Client Port
// Abstraction over long-running remote analysis jobs (video analysis,
// batch model inference). The engine only ever submits and polls.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ExternalId, ExternalStatus};

/// Provider call errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("External job not found: {0}")]
    NotFound(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Transient errors are safe to retry; the rest are permanent
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_) | ProviderError::Throttled(_))
    }
}

/// Client for one external analysis provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Submit a unit of work, returning the provider-assigned job id
    async fn submit(&self, payload: &serde_json::Value) -> Result<ExternalId, ProviderError>;

    /// Fetch the current status of a previously submitted job
    ///
    /// # Errors
    /// - `ProviderError::Network` / `Throttled` on transient transport failures
    /// - `ProviderError::NotFound` if the provider no longer knows the id
    async fn poll(&self, external_id: &str) -> Result<ExternalStatus, ProviderError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    /// One scripted poll outcome
    #[derive(Debug, Clone)]
    pub enum PollScript {
        Status(ExternalStatus),
        /// Fail with a transient network error
        Fail(String),
    }

    /// Scripted provider client: each poll pops the next outcome for that
    /// external id. An exhausted script answers NotFound, which fails any
    /// test that polled more often than it scripted.
    pub struct MockProviderClient {
        scripts: Mutex<HashMap<String, VecDeque<PollScript>>>,
        poll_counts: Mutex<HashMap<String, usize>>,
        poll_delay: Option<Duration>,
    }

    impl MockProviderClient {
        pub fn new() -> Self {
            Self {
                scripts: Mutex::new(HashMap::new()),
                poll_counts: Mutex::new(HashMap::new()),
                poll_delay: None,
            }
        }

        /// Make every poll take `delay` (for concurrent-caller tests)
        pub fn with_poll_delay(mut self, delay: Duration) -> Self {
            self.poll_delay = Some(delay);
            self
        }

        pub fn script_status(&self, external_id: &str, status: ExternalStatus) {
            self.scripts
                .lock()
                .unwrap()
                .entry(external_id.to_string())
                .or_default()
                .push_back(PollScript::Status(status));
        }

        pub fn script_error(&self, external_id: &str, message: &str) {
            self.scripts
                .lock()
                .unwrap()
                .entry(external_id.to_string())
                .or_default()
                .push_back(PollScript::Fail(message.to_string()));
        }

        pub fn poll_count(&self, external_id: &str) -> usize {
            self.poll_counts
                .lock()
                .unwrap()
                .get(external_id)
                .copied()
                .unwrap_or(0)
        }
    }

    impl Default for MockProviderClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProviderClient for MockProviderClient {
        async fn submit(&self, _payload: &serde_json::Value) -> Result<ExternalId, ProviderError> {
            Ok("mock-external-id".to_string())
        }

        async fn poll(&self, external_id: &str) -> Result<ExternalStatus, ProviderError> {
            *self
                .poll_counts
                .lock()
                .unwrap()
                .entry(external_id.to_string())
                .or_insert(0) += 1;

            if let Some(delay) = self.poll_delay {
                tokio::time::sleep(delay).await;
            }

            let script = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(external_id)
                .and_then(|q| q.pop_front());

            match script {
                Some(PollScript::Status(status)) => Ok(status),
                Some(PollScript::Fail(msg)) => Err(ProviderError::Network(msg)),
                None => Err(ProviderError::NotFound(external_id.to_string())),
            }
        }
    }
}
