use thiserror::Error;

/// A browser tab as seen by the navigation controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: String,
    pub url: String,
    pub active: bool,
}

/// A network request that completed in the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCompletion {
    pub url: String,
    pub tab_id: Option<String>,
}

impl NetworkCompletion {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tab_id: None,
        }
    }
}

/// Outcome of an enrichment call. Never an error: failures are reported in
/// `error` with `processed` left false.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enrichment {
    pub processed: bool,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl Enrichment {
    pub fn summary(summary: impl Into<String>) -> Self {
        Self {
            processed: true,
            summary: Some(summary.into()),
            error: None,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            processed: false,
            summary: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("tab query failed: {0}")]
    Query(String),
    #[error("tab {tab_id} could not be updated: {message}")]
    Update { tab_id: String, message: String },
    #[error("tab could not be created: {0}")]
    Create(String),
    #[error("navigation cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no page to extract from")]
    NoPage,
    #[error("page content unavailable: {0}")]
    Page(String),
    #[error("extraction timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment not configured: {0}")]
    NotConfigured(&'static str),
    #[error("api error {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("orchestrator is not running")]
    Stopped,
    #[error("orchestrator dropped the reply")]
    ReplyDropped,
}
