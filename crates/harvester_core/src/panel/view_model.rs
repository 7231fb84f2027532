use crate::{DedupeStats, JobCounts, PlaceRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatus {
    Pending,
    Processing,
    Completed,
    /// Gave up on this job.
    Failed(String),
    /// Last attempt failed; the job will be tried again.
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub url: String,
    pub status: RowStatus,
    pub retry_count: u32,
    pub record: Option<PlaceRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PanelViewModel {
    pub running: bool,
    pub synced: bool,
    pub complete: bool,
    pub rows: Vec<RowView>,
    pub counts: JobCounts,
    pub last_collection: Option<DedupeStats>,
    pub dirty: bool,
}
