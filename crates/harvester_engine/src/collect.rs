use std::collections::HashSet;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info};
use scraper::{Html, Selector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::extract::PageSource;
use crate::navigate::NavigationController;
use crate::types::{ExtractError, NavigationError};

const PLACE_PATH: &str = "/maps/place/";

/// Anchors that lead to a place on a search-results page, tried in order.
const PLACE_LINK_SELECTORS: [&str; 4] = [
    r#"a[href*="/maps/place/"]"#,
    "div.Nv2PK a.hfpxzc",
    r#"a.hfpxzc[href*="/maps/place/"]"#,
    r#"div[jsaction*="navigationCard"] a[href*="/maps/place/"]"#,
];

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Page(#[from] ExtractError),
}

/// Place links on a rendered search-results page, absolute and in the order
/// first seen.
pub fn collect_place_urls(html: &str, page_url: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for selector in PLACE_LINK_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
    {
        for href in doc.select(&selector).filter_map(|a| a.value().attr("href")) {
            let Some(url) = absolute(href.trim(), base.as_ref()) else {
                continue;
            };
            if url.contains(PLACE_PATH) && seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    }
    urls
}

fn absolute(href: &str, base: Option<&Url>) -> Option<String> {
    if href.is_empty() {
        return None;
    }
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Url::parse(href).ok().map(String::from),
    }
}

/// Loads a search-results page in the harvesting tab and reads its place
/// links.
pub struct UrlCollector {
    navigator: Arc<NavigationController>,
    source: Arc<dyn PageSource>,
}

impl UrlCollector {
    pub fn new(navigator: Arc<NavigationController>, source: Arc<dyn PageSource>) -> Self {
        Self { navigator, source }
    }

    pub async fn collect(&self, search_url: &str) -> Result<Vec<String>, CollectError> {
        engine_info!("Collecting place links from {}", search_url);
        self.navigator
            .navigate(search_url, &CancellationToken::new())
            .await?;
        let page = self.source.snapshot().await?;
        let urls = collect_place_urls(&page.html, &page.url);
        engine_debug!("Found {} place links on {}", urls.len(), page.url);
        Ok(urls)
    }
}
