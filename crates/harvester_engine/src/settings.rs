use std::time::Duration;

use harvester_core::orchestrator::OrchestratorConfig;
use harvester_core::panel::PanelConfig;
use harvester_core::CapturePatterns;

#[derive(Debug, Clone)]
pub struct NavigationSettings {
    /// Substring identifying a tab already on the target application.
    pub target_host_marker: String,
    /// Tabs whose URL contains this are never reused.
    pub exclude_marker: String,
    /// Waited out in order after the navigation was issued.
    pub settle_delays: Vec<Duration>,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            target_host_marker: "google.com/maps".to_string(),
            exclude_marker: "DevTools".to_string(),
            settle_delays: vec![Duration::from_secs(3), Duration::from_secs(5)],
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub orchestrator: OrchestratorConfig,
    pub panel: PanelConfig,
    pub navigation: NavigationSettings,
    pub capture: CapturePatterns,
    /// Upper bound on one extraction call before it counts as a failure.
    pub extraction_timeout: Duration,
    pub enrich: EnrichSettings,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            panel: PanelConfig::default(),
            navigation: NavigationSettings::default(),
            capture: CapturePatterns::default(),
            extraction_timeout: Duration::from_secs(15),
            enrich: EnrichSettings::default(),
        }
    }
}
