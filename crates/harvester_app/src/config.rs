//! Optional `harvester.ron` config file, environment and command-line
//! overrides, folded into the engine's [`HarvestSettings`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use engine_logging::engine_info;
use harvester_core::CapturePatterns;
use harvester_engine::HarvestSettings;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "harvester.ron";

/// On-disk configuration. Durations are in milliseconds; every field is
/// optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub output_dir: PathBuf,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub capture_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub stall_timeout_ms: u64,
    pub result_cooldown_ms: u64,
    pub failure_cooldown_ms: u64,
    pub busy_retry_ms: u64,
    pub settle_delays_ms: Vec<u64>,
    pub extraction_timeout_ms: u64,
    pub capture_patterns: Vec<String>,
    pub enrich: bool,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for FileConfig {
    fn default() -> Self {
        let settings = HarvestSettings::default();
        let retry = settings.orchestrator.retry;
        Self {
            output_dir: PathBuf::from("output"),
            headless: false,
            chrome_executable: None,
            user_data_dir: None,
            log_file: None,
            capture_timeout_ms: millis(settings.orchestrator.capture_timeout),
            max_retries: retry.max_retries,
            retry_base_ms: millis(retry.base_delay),
            retry_max_ms: millis(retry.max_delay),
            stall_timeout_ms: millis(settings.panel.stall_timeout),
            result_cooldown_ms: millis(settings.panel.result_cooldown),
            failure_cooldown_ms: millis(settings.panel.failure_cooldown),
            busy_retry_ms: millis(settings.panel.busy_retry_delay),
            settle_delays_ms: settings.navigation.settle_delays.iter().map(|d| millis(*d)).collect(),
            extraction_timeout_ms: millis(settings.extraction_timeout),
            capture_patterns: settings.capture.patterns().to_vec(),
            enrich: settings.orchestrator.enrich,
            api_base: settings.enrich.api_base,
            model: settings.enrich.model,
            max_tokens: settings.enrich.max_tokens,
            temperature: settings.enrich.temperature,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl FileConfig {
    /// Read `path`, or `harvester.ron` in the working directory when no path
    /// is given. Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILENAME), false),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        let config = Self::parse(&text).with_context(|| format!("parsing {}", path.display()))?;
        engine_info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Engine settings from this file. `env` looks up environment
    /// variables; `OPENAI_API_KEY` and `OPENAI_MODEL` are honored.
    pub fn to_settings(&self, env: impl Fn(&str) -> Option<String>) -> HarvestSettings {
        let mut settings = HarvestSettings::default();

        let orchestrator = &mut settings.orchestrator;
        orchestrator.capture_timeout = Duration::from_millis(self.capture_timeout_ms);
        orchestrator.retry.max_retries = self.max_retries;
        orchestrator.retry.base_delay = Duration::from_millis(self.retry_base_ms);
        orchestrator.retry.max_delay = Duration::from_millis(self.retry_max_ms);
        orchestrator.enrich = self.enrich;

        let panel = &mut settings.panel;
        panel.stall_timeout = Duration::from_millis(self.stall_timeout_ms);
        panel.result_cooldown = Duration::from_millis(self.result_cooldown_ms);
        panel.failure_cooldown = Duration::from_millis(self.failure_cooldown_ms);
        panel.busy_retry_delay = Duration::from_millis(self.busy_retry_ms);
        panel.max_retries = self.max_retries;

        settings.navigation.settle_delays = self
            .settle_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect();
        settings.capture = CapturePatterns::new(self.capture_patterns.iter().cloned());
        settings.extraction_timeout = Duration::from_millis(self.extraction_timeout_ms);

        let enrich = &mut settings.enrich;
        enrich.api_base = self.api_base.clone();
        enrich.model = env("OPENAI_MODEL")
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| self.model.clone());
        enrich.api_key = env("OPENAI_API_KEY").filter(|key| !key.trim().is_empty());
        enrich.max_tokens = self.max_tokens;
        enrich.temperature = self.temperature;

        settings
    }
}
