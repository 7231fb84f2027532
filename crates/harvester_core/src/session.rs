use std::collections::BTreeMap;

use crate::job::{DedupeStats, JobQueue, JobStatus, DEFAULT_MAX_RETRIES};
use crate::snapshot::{merge, SessionSnapshot};
use crate::{PlaceId, PlaceRecord};

/// Shared session state, one copy per execution context.
///
/// `results_by_place_id` and `url_to_place_id` only grow during a session;
/// [`Session::reset`] is the single way to empty them, and it resets every
/// field together.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    jobs: JobQueue,
    results_by_place_id: BTreeMap<PlaceId, PlaceRecord>,
    url_to_place_id: BTreeMap<String, PlaceId>,
    active_job: Option<String>,
    session_complete: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl Session {
    pub fn new(max_retries: u32) -> Self {
        Self {
            jobs: JobQueue::new(max_retries),
            results_by_place_id: BTreeMap::new(),
            url_to_place_id: BTreeMap::new(),
            active_job: None,
            session_complete: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.jobs.max_retries());
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut JobQueue {
        &mut self.jobs
    }

    pub fn results(&self) -> &BTreeMap<PlaceId, PlaceRecord> {
        &self.results_by_place_id
    }

    pub fn url_to_place_id(&self) -> &BTreeMap<String, PlaceId> {
        &self.url_to_place_id
    }

    pub fn record_for_url(&self, url: &str) -> Option<&PlaceRecord> {
        self.url_to_place_id
            .get(url)
            .and_then(|place_id| self.results_by_place_id.get(place_id))
    }

    pub fn active_job(&self) -> Option<&str> {
        self.active_job.as_deref()
    }

    pub fn set_active_job(&mut self, url: Option<String>) {
        self.active_job = url;
    }

    pub fn is_complete(&self) -> bool {
        self.session_complete
    }

    pub fn set_complete(&mut self, complete: bool) {
        self.session_complete = complete;
    }

    /// Start a session over a freshly collected URL list. Results recorded
    /// earlier are kept and the matching jobs come back already completed.
    pub fn set_collected_urls(&mut self, urls: &[String]) -> DedupeStats {
        let stats = self.jobs.replace(urls);
        self.session_complete = false;
        self.sync_completed_jobs();
        stats
    }

    pub fn record_result(&mut self, url: &str, record: PlaceRecord) {
        let place_id = record.place_id.clone();
        self.jobs.push(url);
        self.jobs.mark_completed(url, &place_id);
        self.url_to_place_id.insert(url.to_string(), place_id.clone());
        self.results_by_place_id.insert(place_id, record);
    }

    pub fn is_processed(&self, url: &str) -> bool {
        self.url_to_place_id.contains_key(url) || self.jobs.is_processed(url)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            collected_urls: self.jobs.urls(),
            processed_data: self
                .results_by_place_id
                .iter()
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect(),
            url_to_place_id: self
                .url_to_place_id
                .iter()
                .map(|(url, id)| (url.clone(), id.clone()))
                .collect(),
            is_processing: self.active_job.is_some(),
            current_url: self.active_job.clone(),
        }
    }

    /// Fold a snapshot from the other context into this one. Job statuses,
    /// retry counts and the active job stay local.
    pub fn apply_snapshot(&mut self, incoming: &SessionSnapshot) {
        let merged = merge(&self.snapshot(), incoming);
        self.jobs.extend(&merged.collected_urls);
        self.results_by_place_id = merged.processed_data.into_iter().collect();
        self.url_to_place_id = merged.url_to_place_id.into_iter().collect();
        self.sync_completed_jobs();
    }

    fn sync_completed_jobs(&mut self) {
        let done: Vec<(String, PlaceId)> = self
            .jobs
            .iter()
            .filter(|job| job.status != JobStatus::Completed)
            .filter_map(|job| {
                let place_id = self.url_to_place_id.get(&job.id)?;
                self.results_by_place_id
                    .contains_key(place_id)
                    .then(|| (job.id.clone(), place_id.clone()))
            })
            .collect();
        for (url, place_id) in done {
            self.jobs.mark_completed(&url, &place_id);
        }
    }
}
