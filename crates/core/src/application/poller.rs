// External Status Poller - cached polling of provider-owned job handles

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::constants::DEFAULT_POLL_CACHE_TTL_MS;
use crate::application::shutdown::ShutdownToken;
use crate::domain::{ExternalJobHandle, ExternalStatus, JobId};
use crate::error::Result;
use crate::port::{ProviderClient, TimeProvider};

/// Rate-limits polling of long-lived external jobs.
///
/// While a handle is non-terminal its last status is served from cache for
/// `cache_ttl_ms`, bounding the remote call rate no matter how often callers
/// poll. A terminal status freezes the handle: completed provider jobs are
/// immutable and some providers disallow querying them indefinitely, so no
/// further remote calls are ever issued.
pub struct StatusPoller {
    provider: Arc<dyn ProviderClient>,
    time_provider: Arc<dyn TimeProvider>,
    cache_ttl_ms: i64,
    handles: RwLock<HashMap<String, Arc<Mutex<ExternalJobHandle>>>>,
}

impl StatusPoller {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        time_provider: Arc<dyn TimeProvider>,
        cache_ttl_ms: i64,
    ) -> Self {
        Self {
            provider,
            time_provider,
            cache_ttl_ms,
            handles: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_default_ttl(
        provider: Arc<dyn ProviderClient>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self::new(provider, time_provider, DEFAULT_POLL_CACHE_TTL_MS)
    }

    /// Start tracking an external job, recording which of ours owns it
    pub async fn track(&self, external_id: &str, owner_job_id: Option<JobId>) {
        let mut handles = self.handles.write().await;
        handles.entry(external_id.to_string()).or_insert_with(|| {
            debug!(external_id = %external_id, owner_job_id = ?owner_job_id, "Tracking external job");
            Arc::new(Mutex::new(ExternalJobHandle::new(
                external_id,
                owner_job_id,
            )))
        });
    }

    /// Current status: cached while the window is fresh, one remote query
    /// otherwise.
    ///
    /// The per-handle lock is held across the remote call: a second caller
    /// arriving while a query is in flight waits for that result instead of
    /// issuing a duplicate. A failed query leaves the cache window untouched
    /// so the next call retries immediately.
    pub async fn get_status(&self, external_id: &str) -> Result<ExternalStatus> {
        let entry = self.entry_or_insert(external_id).await;
        let mut handle = entry.lock().await;

        let now = self.time_provider.now_millis();
        if handle.is_fresh(now) {
            if let Some(status) = &handle.last_status {
                debug!(external_id = %external_id, state = %status.state, "Serving cached status");
                return Ok(status.clone());
            }
        }

        match self.provider.poll(external_id).await {
            Ok(status) => {
                let now = self.time_provider.now_millis();
                handle.record(status.clone(), now, self.cache_ttl_ms);
                if status.terminal {
                    info!(
                        external_id = %external_id,
                        state = %status.state,
                        "External job reached terminal state; handle frozen"
                    );
                } else {
                    debug!(external_id = %external_id, state = %status.state, "Remote status refreshed");
                }
                Ok(status)
            }
            Err(e) => {
                warn!(external_id = %external_id, error = %e, "Remote status query failed");
                Err(e.into())
            }
        }
    }

    /// Stop tracking one handle. Returns whether it existed.
    pub async fn forget(&self, external_id: &str) -> bool {
        let removed = self.handles.write().await.remove(external_id).is_some();
        if removed {
            debug!(external_id = %external_id, "Handle evicted");
        }
        removed
    }

    /// Evict every handle owned by `job_id`. Called when the owning job is
    /// deleted, never before.
    pub async fn forget_owned(&self, job_id: &str) -> usize {
        let mut handles = self.handles.write().await;
        let mut evict = Vec::new();
        for (external_id, entry) in handles.iter() {
            let handle = entry.lock().await;
            if handle.owner_job_id.as_deref() == Some(job_id) {
                evict.push(external_id.clone());
            }
        }
        for external_id in &evict {
            handles.remove(external_id);
        }
        if !evict.is_empty() {
            info!(job_id = %job_id, evicted = %evict.len(), "Evicted handles for deleted job");
        }
        evict.len()
    }

    pub async fn tracked_count(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Copy of a handle's current cache state (diagnostics, tests)
    pub async fn handle(&self, external_id: &str) -> Option<ExternalJobHandle> {
        let entry = self.handles.read().await.get(external_id).cloned()?;
        let handle = entry.lock().await;
        Some(handle.clone())
    }

    /// One sweep pass: refresh every stale, non-terminal handle. Remote
    /// failures are logged and skipped; the handle stays stale and the next
    /// sweep retries. Returns how many handles were refreshed.
    pub async fn refresh_stale(&self) -> usize {
        let now = self.time_provider.now_millis();
        let stale: Vec<String> = {
            let handles = self.handles.read().await;
            let mut ids = Vec::new();
            for (external_id, entry) in handles.iter() {
                let handle = entry.lock().await;
                if !handle.is_fresh(now) {
                    ids.push(external_id.clone());
                }
            }
            ids
        };

        let mut refreshed = 0;
        for external_id in stale {
            match self.get_status(&external_id).await {
                Ok(_) => refreshed += 1,
                Err(e) => {
                    warn!(external_id = %external_id, error = %e, "Sweep refresh failed");
                }
            }
        }
        refreshed
    }

    /// Background sweep loop. Status is still pulled lazily by callers; this
    /// loop only keeps in-flight handles from going arbitrarily stale between
    /// caller polls.
    pub async fn run(&self, interval: Duration, mut shutdown: ShutdownToken) {
        info!(interval_ms = %interval.as_millis(), "Status poll sweep started");
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    let refreshed = self.refresh_stale().await;
                    if refreshed > 0 {
                        debug!(refreshed = %refreshed, "Sweep pass complete");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Status poll sweep stopped");
                    break;
                }
            }
        }
    }

    async fn entry_or_insert(&self, external_id: &str) -> Arc<Mutex<ExternalJobHandle>> {
        if let Some(entry) = self.handles.read().await.get(external_id) {
            return Arc::clone(entry);
        }
        let mut handles = self.handles.write().await;
        Arc::clone(
            handles
                .entry(external_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ExternalJobHandle::new(external_id, None)))),
        )
    }
}
