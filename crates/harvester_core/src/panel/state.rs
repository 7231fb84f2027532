use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::view_model::{PanelViewModel, RowStatus, RowView};
use crate::{DedupeStats, JobStatus, KeyDeriver, Session, DEFAULT_MAX_RETRIES};

#[derive(Debug, Clone, PartialEq)]
pub struct PanelConfig {
    /// Give up on an outstanding job when no event arrives within this window.
    pub stall_timeout: Duration,
    /// Pause after a recorded result before advancing.
    pub result_cooldown: Duration,
    /// Pause after a failure before advancing.
    pub failure_cooldown: Duration,
    /// Pause before asking again after a busy reply.
    pub busy_retry_delay: Duration,
    pub max_retries: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            stall_timeout: Duration::from_secs(15),
            result_cooldown: Duration::from_secs(2),
            failure_cooldown: Duration::from_secs(5),
            busy_retry_delay: Duration::from_secs(2),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// The job the panel handed to the orchestrator and is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outstanding {
    pub url: String,
    /// Stall timer generation; timeouts carrying an older token are stale.
    pub token: u64,
}

#[derive(Debug, Clone)]
pub struct PanelState {
    pub(super) config: PanelConfig,
    pub(super) session: Session,
    pub(super) outstanding: Option<Outstanding>,
    pub(super) running: bool,
    pub(super) synced: bool,
    pub(super) complete: bool,
    pub(super) next_token: u64,
    pub(super) errors: BTreeMap<String, String>,
    pub(super) last_collection: Option<DedupeStats>,
    pub(super) dirty: bool,
    pub(super) keys: Arc<KeyDeriver>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new(PanelConfig::default())
    }
}

impl PanelState {
    pub fn new(config: PanelConfig) -> Self {
        Self {
            session: Session::new(config.max_retries),
            config,
            outstanding: None,
            running: false,
            synced: false,
            complete: false,
            next_token: 1,
            errors: BTreeMap::new(),
            last_collection: None,
            dirty: false,
            keys: Arc::new(KeyDeriver::standard()),
        }
    }

    pub fn with_key_deriver(mut self, keys: Arc<KeyDeriver>) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn outstanding(&self) -> Option<&Outstanding> {
        self.outstanding.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn error_for(&self, url: &str) -> Option<&str> {
        self.errors.get(url).map(String::as_str)
    }

    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        was_dirty
    }

    pub(super) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(super) fn mint_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    pub(super) fn is_outstanding(&self, url: &str) -> bool {
        self.outstanding
            .as_ref()
            .is_some_and(|outstanding| outstanding.url == url)
    }

    pub fn view(&self) -> PanelViewModel {
        let rows = self
            .session
            .jobs()
            .iter()
            .map(|job| {
                let error = self.errors.get(&job.id).cloned();
                let status = match job.status {
                    JobStatus::Completed => RowStatus::Completed,
                    JobStatus::InFlight => RowStatus::Processing,
                    JobStatus::Failed => {
                        RowStatus::Failed(error.unwrap_or_else(|| "failed".to_string()))
                    }
                    JobStatus::Pending => match error {
                        Some(reason) => RowStatus::Error(reason),
                        None => RowStatus::Pending,
                    },
                };
                RowView {
                    url: job.id.clone(),
                    status,
                    retry_count: job.retry_count,
                    record: self.session.record_for_url(&job.id).cloned(),
                }
            })
            .collect();

        PanelViewModel {
            running: self.running,
            synced: self.synced,
            complete: self.complete,
            rows,
            counts: self.session.jobs().counts(),
            last_collection: self.last_collection,
            dirty: self.dirty,
        }
    }
}
