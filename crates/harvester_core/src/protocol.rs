use serde::{Deserialize, Serialize};

use crate::{PlaceRecord, SessionSnapshot};

/// Panel -> orchestrator command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    GetState,
    SetCollectedUrls {
        urls: Vec<String>,
    },
    ProcessUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<SessionSnapshot>,
    },
    ClearCapturedData,
    ProcessingComplete,
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::GetState => "get_state",
            Command::SetCollectedUrls { .. } => "set_collected_urls",
            Command::ProcessUrl { .. } => "process_url",
            Command::ClearCapturedData => "clear_captured_data",
            Command::ProcessingComplete => "processing_complete",
        }
    }
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    /// Set when a `process_url` was refused because another job is in flight.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub busy: bool,
    /// Set when a `process_url` was refused because the job already used up
    /// its retry budget.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub exhausted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn with_state(state: SessionSnapshot) -> Self {
        Self {
            success: true,
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn busy(active_url: &str) -> Self {
        Self {
            success: false,
            busy: true,
            error: Some(format!("busy processing {active_url}")),
            ..Self::default()
        }
    }

    pub fn exhausted(url: &str) -> Self {
        Self {
            success: false,
            exhausted: true,
            error: Some(format!("retry budget exhausted for {url}")),
            ..Self::default()
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Orchestrator -> panel event channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    XhrCaptured {
        data: PlaceRecord,
        #[serde(rename = "currentState")]
        current_state: SessionSnapshot,
    },
    AuthFailed {
        url: String,
        error: String,
    },
    RetryProcessing {
        url: String,
    },
}

impl Event {
    pub fn url(&self) -> &str {
        match self {
            Event::XhrCaptured { data, current_state } => current_state
                .current_url
                .as_deref()
                .unwrap_or(data.url.as_str()),
            Event::AuthFailed { url, .. } | Event::RetryProcessing { url } => url,
        }
    }
}
