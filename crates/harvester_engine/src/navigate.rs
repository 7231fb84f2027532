use std::sync::Arc;

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::settings::NavigationSettings;
use crate::types::{NavigationError, TabInfo};

/// Minimal tab control surface of the browser.
#[async_trait::async_trait]
pub trait BrowserTabs: Send + Sync {
    async fn tabs(&self) -> Result<Vec<TabInfo>, NavigationError>;
    /// Point an existing tab at `url` and focus it.
    async fn update(&self, tab_id: &str, url: &str) -> Result<(), NavigationError>;
    async fn create(&self, url: &str) -> Result<TabInfo, NavigationError>;
}

/// Drives the one tab used for harvesting.
pub struct NavigationController {
    tabs: Arc<dyn BrowserTabs>,
    settings: NavigationSettings,
}

impl NavigationController {
    pub fn new(tabs: Arc<dyn BrowserTabs>, settings: NavigationSettings) -> Self {
        Self { tabs, settings }
    }

    /// Navigate to `url` and wait out the settle delays. Returns the id of the
    /// tab that was used.
    pub async fn navigate(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, NavigationError> {
        let tab_id = self.open_tab(url, cancel).await?;
        self.settle(cancel).await?;
        engine_debug!("Tab {} settled on {}", tab_id, url);
        Ok(tab_id)
    }

    /// Point a tab at `url`, reusing one when possible.
    pub async fn open_tab(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, NavigationError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(NavigationError::Cancelled),
            opened = self.open(url) => opened,
        }
    }

    /// Sleep through the settle delays unless cancelled first.
    pub async fn settle(&self, cancel: &CancellationToken) -> Result<(), NavigationError> {
        for delay in &self.settings.settle_delays {
            tokio::select! {
                _ = cancel.cancelled() => return Err(NavigationError::Cancelled),
                _ = tokio::time::sleep(*delay) => {}
            }
        }
        Ok(())
    }

    async fn open(&self, url: &str) -> Result<String, NavigationError> {
        let tabs = match self.tabs.tabs().await {
            Ok(tabs) => tabs,
            Err(err) => {
                engine_warn!("Tab query failed, opening a new tab: {}", err);
                Vec::new()
            }
        };

        if let Some(tab) = self.pick_tab(&tabs) {
            match self.tabs.update(&tab.id, url).await {
                Ok(()) => return Ok(tab.id.clone()),
                Err(err) => engine_warn!("Reusing tab {} failed: {}", tab.id, err),
            }
        }

        let created = self.tabs.create(url).await?;
        engine_info!("Opened tab {} for {}", created.id, url);
        Ok(created.id)
    }

    /// Prefer the active tab on the target application, then any tab on it.
    pub fn pick_tab<'a>(&self, tabs: &'a [TabInfo]) -> Option<&'a TabInfo> {
        let eligible = |tab: &&TabInfo| {
            tab.url.contains(self.settings.target_host_marker.as_str())
                && !tab.url.contains(self.settings.exclude_marker.as_str())
        };
        tabs.iter()
            .filter(eligible)
            .find(|tab| tab.active)
            .or_else(|| tabs.iter().find(eligible))
    }
}
