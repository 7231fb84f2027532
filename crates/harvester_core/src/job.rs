use std::collections::{BTreeMap, BTreeSet};

use url::Url;

use crate::PlaceId;

/// Retries allowed per job before it is marked failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Pending,
    InFlight,
    Completed,
    Failed,
}

/// One target URL to be visited and extracted. The URL string is the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub retry_count: u32,
    pub result_key: Option<PlaceId>,
}

impl Job {
    fn new(id: String) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            retry_count: 0,
            result_key: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DedupeStats {
    pub enqueued: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobCounts {
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Ordered, deduplicated job ledger.
///
/// Jobs keep the order in which they were collected; `next_pending` is plain
/// FIFO over that order so progress is deterministic and resumable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueue {
    jobs: Vec<Job>,
    positions: BTreeMap<String, usize>,
    history: BTreeSet<String>,
    max_retries: u32,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl JobQueue {
    pub fn new(max_retries: u32) -> Self {
        Self {
            jobs: Vec::new(),
            positions: BTreeMap::new(),
            history: BTreeSet::new(),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Replace the job list with a freshly collected one. Processing history
    /// survives; it belongs to the session, not to the list.
    pub fn replace<I, S>(&mut self, urls: I) -> DedupeStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.jobs.clear();
        self.positions.clear();
        self.extend(urls)
    }

    pub fn extend<I, S>(&mut self, urls: I) -> DedupeStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = DedupeStats::default();
        for url in urls {
            let url = url.as_ref().trim();
            if url.is_empty() {
                continue;
            }
            if self.push(url) {
                stats.enqueued += 1;
            } else {
                stats.skipped += 1;
            }
        }
        stats
    }

    /// Append a job unless an equivalent URL is already queued.
    pub fn push(&mut self, url: &str) -> bool {
        let key = normalize_url_for_dedupe(url);
        if key.is_empty() || self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key, self.jobs.len());
        self.jobs.push(Job::new(url.trim().to_string()));
        true
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.position(id).map(|idx| &self.jobs[idx])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Job> {
        self.position(id).map(|idx| &mut self.jobs[idx])
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(&normalize_url_for_dedupe(id)).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn urls(&self) -> Vec<String> {
        self.jobs.iter().map(|job| job.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// First job, in collection order, that is pending and still has retry budget.
    pub fn next_pending(&self) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|job| job.status == JobStatus::Pending && job.retry_count < self.max_retries)
    }

    pub fn mark_in_flight(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(job) if job.status != JobStatus::Completed => {
                job.status = JobStatus::InFlight;
                true
            }
            _ => false,
        }
    }

    /// Return an in-flight job to pending without spending retry budget.
    pub fn release(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(job) if job.status == JobStatus::InFlight => {
                job.status = JobStatus::Pending;
                true
            }
            _ => false,
        }
    }

    pub fn mark_completed(&mut self, id: &str, place_id: &str) -> bool {
        self.history.insert(normalize_url_for_dedupe(id));
        match self.get_mut(id) {
            Some(job) => {
                job.status = JobStatus::Completed;
                job.result_key = Some(place_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn mark_failed(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(job) if job.status != JobStatus::Completed => {
                job.status = JobStatus::Failed;
                true
            }
            _ => false,
        }
    }

    /// Count one more retry; the job goes back to pending. Returns the new count.
    pub fn increment_retry(&mut self, id: &str) -> Option<u32> {
        let job = self.get_mut(id)?;
        if job.status == JobStatus::Completed {
            return Some(job.retry_count);
        }
        job.retry_count += 1;
        job.status = JobStatus::Pending;
        Some(job.retry_count)
    }

    pub fn retry_count(&self, id: &str) -> u32 {
        self.get(id).map_or(0, |job| job.retry_count)
    }

    pub fn retries_exhausted(&self, id: &str) -> bool {
        match self.get(id) {
            Some(job) => job.status == JobStatus::Failed || job.retry_count >= self.max_retries,
            None => false,
        }
    }

    /// A result was recorded for this URL, either via the job itself or via
    /// the processing history (which also covers URLs no longer queued).
    pub fn is_processed(&self, id: &str) -> bool {
        self.get(id).is_some_and(|job| job.result_key.is_some())
            || self.history.contains(&normalize_url_for_dedupe(id))
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in &self.jobs {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::InFlight => counts.in_flight += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.positions.clear();
        self.history.clear();
    }
}

/// Canonical form used to detect duplicate URLs: trimmed, scheme and host
/// lowercased, trailing slash dropped. Path and query keep their case because
/// place identifiers inside them are case sensitive.
pub fn normalize_url_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    let normalized = match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    };
    normalized.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::normalize_url_for_dedupe;

    #[test]
    fn normalization_ignores_case_of_host_and_trailing_slash() {
        assert_eq!(
            normalize_url_for_dedupe(" HTTPS://Example.COM/ "),
            normalize_url_for_dedupe("https://example.com")
        );
    }

    #[test]
    fn normalization_keeps_path_case() {
        assert_ne!(
            normalize_url_for_dedupe("https://example.com/maps/place/A"),
            normalize_url_for_dedupe("https://example.com/maps/place/a")
        );
    }

    #[test]
    fn unparseable_input_is_trimmed() {
        assert_eq!(normalize_url_for_dedupe("  a.com/ "), "a.com");
    }
}
