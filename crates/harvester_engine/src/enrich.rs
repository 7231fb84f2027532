use engine_logging::{engine_debug, engine_warn};
use harvester_core::PlaceRecord;
use serde::{Deserialize, Serialize};

use crate::settings::EnrichSettings;
use crate::types::{EnrichError, Enrichment};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes RV park descriptions. \
Extract key information about amenities, features, and unique selling points in a concise format.";

/// Optional text enrichment of a record. Implementations never fail; problems
/// are reported through [`Enrichment::error`].
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, record: &PlaceRecord) -> Enrichment;
}

/// Summarizer used when enrichment is switched off.
#[derive(Debug, Default)]
pub struct DisabledSummarizer;

#[async_trait::async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _record: &PlaceRecord) -> Enrichment {
        Enrichment::skipped("enrichment disabled")
    }
}

/// Summarizes the about text through an OpenAI compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiSummarizer {
    settings: EnrichSettings,
    client: reqwest::Client,
}

impl OpenAiSummarizer {
    pub fn new(settings: EnrichSettings) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| EnrichError::Transport(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub async fn request_summary(&self, text: &str) -> Result<String, EnrichError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(EnrichError::NotConfigured("API key not configured"))?;

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!(
                        "Please analyze this RV park description and provide a concise summary of key features and amenities: {text}"
                    ),
                },
            ],
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let body = serde_json::to_string(&request)
            .map_err(|err| EnrichError::InvalidResponse(err.to_string()))?;

        let url = format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| EnrichError::Transport(err.to_string()))?;

        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|err| EnrichError::Transport(err.to_string()))?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&raw_body)
                .ok()
                .and_then(|body| body.error)
                .map(|error| error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            return Err(EnrichError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&raw_body)
            .map_err(|err| EnrichError::InvalidResponse(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| EnrichError::InvalidResponse("no message content".to_string()))
    }
}

#[async_trait::async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, record: &PlaceRecord) -> Enrichment {
        let text = record.about_text.trim();
        if text.is_empty() {
            return Enrichment::skipped("No about text provided");
        }
        match self.request_summary(text).await {
            Ok(summary) => {
                engine_debug!("Summarized about text of {}", record.place_id);
                Enrichment::summary(summary)
            }
            Err(err) => {
                engine_warn!("Enrichment of {} failed: {}", record.place_id, err);
                Enrichment::skipped(err.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}
