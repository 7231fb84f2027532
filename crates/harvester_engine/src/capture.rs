use engine_logging::{engine_debug, engine_trace};
use harvester_core::CapturePatterns;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::orchestrator::OrchestratorHandle;
use crate::types::NetworkCompletion;

/// Watches completed network requests and raises a capture signal for the
/// ones that carry place data.
#[derive(Debug, Clone, Default)]
pub struct CaptureListener {
    patterns: CapturePatterns,
}

impl CaptureListener {
    pub fn new(patterns: CapturePatterns) -> Self {
        Self { patterns }
    }

    pub fn is_capture(&self, completion: &NetworkCompletion) -> bool {
        !completion.url.is_empty() && self.patterns.matches(&completion.url)
    }

    /// Forward matching completions until the browser side closes the stream
    /// or the orchestrator stops.
    pub fn spawn(
        self,
        mut completions: mpsc::UnboundedReceiver<NetworkCompletion>,
        orchestrator: OrchestratorHandle,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(completion) = completions.recv().await {
                if !self.is_capture(&completion) {
                    engine_trace!("Ignoring completion {}", completion.url);
                    continue;
                }
                engine_debug!("Place data response observed: {}", completion.url);
                if orchestrator
                    .capture_signal(completion.url, completion.tab_id)
                    .is_err() {
                    break;
                }
            }
        })
    }
}
