use std::sync::Arc;
use std::time::Duration;

use crate::{KeyDeriver, RequestId, RetryPolicy, Session, SessionSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    /// How long to wait for the capture signal after dispatching a URL.
    pub capture_timeout: Duration,
    /// Run the enrichment collaborator before recording a result.
    pub enrich: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            capture_timeout: Duration::from_secs(10),
            enrich: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingCapture,
    Extracting,
    Enriching,
    /// Waiting out the backoff before re-navigating the same job.
    Retrying,
}

/// The job currently holding the processing lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub url: String,
    pub request_id: RequestId,
    /// 1-based dispatch attempt for this job.
    pub attempt: u32,
    /// Tab the navigation for this attempt landed in, once known.
    pub tab_id: Option<String>,
    pub has_processed_signal: bool,
}

#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub(super) config: OrchestratorConfig,
    pub(super) session: Session,
    pub(super) phase: Phase,
    pub(super) dispatch: Option<Dispatch>,
    pub(super) next_request_id: RequestId,
    pub(super) locked: bool,
    pub(super) keys: Arc<KeyDeriver>,
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new(OrchestratorConfig::default())
    }
}

impl OrchestratorState {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            session: Session::new(config.retry.max_retries),
            config,
            phase: Phase::Idle,
            dispatch: None,
            next_request_id: 1,
            locked: false,
            keys: Arc::new(KeyDeriver::standard()),
        }
    }

    /// Rebuild from a persisted snapshot after a restart. A snapshot taken
    /// mid-job leaves the machine locked; the next `process_url` clears it.
    pub fn restore(config: OrchestratorConfig, snapshot: &SessionSnapshot) -> Self {
        let mut state = Self::new(config);
        state.session.apply_snapshot(snapshot);
        if snapshot.is_processing {
            state.locked = true;
            state.session.set_active_job(snapshot.current_url.clone());
            if let Some(url) = snapshot.current_url.as_deref() {
                state.session.jobs_mut().mark_in_flight(url);
            }
        }
        state
    }

    pub fn with_key_deriver(mut self, keys: Arc<KeyDeriver>) -> Self {
        self.keys = keys;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn dispatch(&self) -> Option<&Dispatch> {
        self.dispatch.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_busy(&self) -> bool {
        self.dispatch.is_some()
    }

    /// Snapshot as seen by the panel. Only a live dispatch counts as
    /// processing; a job left over from a restored snapshot does not, so a
    /// resyncing panel dispatches again and force-unlocks the machine.
    pub fn snapshot(&self) -> SessionSnapshot {
        let mut snapshot = self.session.snapshot();
        snapshot.current_url = self.dispatch.as_ref().map(|dispatch| dispatch.url.clone());
        snapshot.is_processing = snapshot.current_url.is_some();
        snapshot
    }

    pub(super) fn mint_request_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    pub(super) fn is_current(&self, request_id: RequestId) -> bool {
        self.dispatch
            .as_ref()
            .is_some_and(|dispatch| dispatch.request_id == request_id)
    }
}
