use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::cdp::browser_protocol::network::EventResponseReceived;
use chromiumoxide::{Browser, BrowserConfig, Page};
use engine_logging::{engine_debug, engine_error, engine_info, engine_trace, engine_warn};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::extract::{PageSnapshot, PageSource};
use crate::navigate::BrowserTabs;
use crate::types::{ExtractError, NavigationError, NetworkCompletion, TabInfo};

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("invalid browser config: {0}")]
    Config(String),
    #[error("browser launch failed: {0}")]
    Launch(String),
}

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
}

/// Chromium driven over the DevTools protocol.
///
/// Every page the harvester touches gets a response listener that feeds the
/// capture stream; the page navigated last is the one extraction reads, and
/// only its responses are forwarded.
pub struct CdpBrowser {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    current: Mutex<Option<Page>>,
    watched: Mutex<HashSet<String>>,
    /// Page id the latest navigation targets. Set before `goto` so responses
    /// of the new load already pass the filter.
    target: watch::Sender<Option<String>>,
    completions: mpsc::UnboundedSender<NetworkCompletion>,
}

impl CdpBrowser {
    pub async fn launch(
        options: LaunchOptions,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<NetworkCompletion>), CdpError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-notifications");
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(dir) = options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let config = builder.build().map_err(CdpError::Config)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| CdpError::Launch(err.to_string()))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    let message = err.to_string();
                    // Unknown CDP messages are routine and harmless.
                    if !message.contains("did not match any variant") {
                        engine_error!("Browser handler error: {}", message);
                    }
                }
            }
        });
        engine_info!("Browser launched (headless: {})", options.headless);

        let (completions, rx) = mpsc::unbounded_channel();
        let browser = Arc::new(Self {
            browser: Mutex::new(browser),
            handler,
            current: Mutex::new(None),
            watched: Mutex::new(HashSet::new()),
            target: watch::Sender::new(None),
            completions,
        });
        Ok((browser, rx))
    }

    pub async fn close(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            engine_warn!("Browser did not close cleanly: {}", err);
        }
        self.handler.abort();
    }

    async fn watch(&self, page: &Page) {
        let id = page_id(page);
        if !self.watched.lock().await.insert(id.clone()) {
            return;
        }
        let mut responses = match page.event_listener::<EventResponseReceived>().await {
            Ok(stream) => stream,
            Err(err) => {
                engine_warn!("Could not observe responses of tab {}: {}", id, err);
                return;
            }
        };
        let completions = self.completions.clone();
        let target = self.target.subscribe();
        tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if target.borrow().as_deref() != Some(id.as_str()) {
                    engine_trace!("Dropping response of background tab {}", id);
                    continue;
                }
                let completion = NetworkCompletion {
                    url: event.response.url.clone(),
                    tab_id: Some(id.clone()),
                };
                if completions.send(completion).is_err() {
                    break;
                }
            }
        });
    }

    async fn pages(&self) -> Result<Vec<Page>, NavigationError> {
        self.browser
            .lock()
            .await
            .pages()
            .await
            .map_err(|err| NavigationError::Query(err.to_string()))
    }
}

fn page_id(page: &Page) -> String {
    page.target_id().inner().clone()
}

#[async_trait::async_trait]
impl BrowserTabs for CdpBrowser {
    async fn tabs(&self) -> Result<Vec<TabInfo>, NavigationError> {
        let current = self.current.lock().await.as_ref().map(page_id);
        let mut tabs = Vec::new();
        for page in self.pages().await? {
            let id = page_id(&page);
            let url = page.url().await.ok().flatten().unwrap_or_default();
            tabs.push(TabInfo {
                active: current.as_deref() == Some(id.as_str()),
                id,
                url,
            });
        }
        Ok(tabs)
    }

    async fn update(&self, tab_id: &str, url: &str) -> Result<(), NavigationError> {
        let page = self
            .pages()
            .await?
            .into_iter()
            .find(|page| page_id(page) == tab_id)
            .ok_or_else(|| NavigationError::Update {
                tab_id: tab_id.to_string(),
                message: "No tab with id".to_string(),
            })?;
        self.watch(&page).await;
        self.target.send_replace(Some(tab_id.to_string()));
        page.goto(url).await.map_err(|err| NavigationError::Update {
            tab_id: tab_id.to_string(),
            message: err.to_string(),
        })?;
        if let Err(err) = page.bring_to_front().await {
            engine_debug!("bring_to_front failed: {}", err);
        }
        *self.current.lock().await = Some(page);
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<TabInfo, NavigationError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|err| NavigationError::Create(err.to_string()))?;
        // Listen before navigating so the first place response is not missed.
        self.watch(&page).await;
        self.target.send_replace(Some(page_id(&page)));
        page.goto(url)
            .await
            .map_err(|err| NavigationError::Create(err.to_string()))?;
        let info = TabInfo {
            id: page_id(&page),
            url: url.to_string(),
            active: true,
        };
        *self.current.lock().await = Some(page);
        Ok(info)
    }
}

#[async_trait::async_trait]
impl PageSource for CdpBrowser {
    async fn snapshot(&self) -> Result<PageSnapshot, ExtractError> {
        let page = self
            .current
            .lock()
            .await
            .clone()
            .ok_or(ExtractError::NoPage)?;
        let url = page
            .url()
            .await
            .map_err(|err| ExtractError::Page(err.to_string()))?
            .unwrap_or_default();
        let html = page
            .content()
            .await
            .map_err(|err| ExtractError::Page(err.to_string()))?;
        Ok(PageSnapshot { url, html })
    }
}
