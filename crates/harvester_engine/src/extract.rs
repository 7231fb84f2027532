use std::sync::Arc;

use harvester_core::{Coordinates, KeyDeriver, PlaceRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::ExtractError;

/// Rendered state of the page being harvested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Address bar URL, which may differ from the URL navigated to.
    pub url: String,
    pub html: String,
}

#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot, ExtractError>;
}

/// Produces a record from the loaded page, or `None` when the page holds no
/// recognisable listing.
#[async_trait::async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, requested_url: &str) -> Result<Option<PlaceRecord>, ExtractError>;
}

/// Reads the listing out of the rendered DOM of the current page.
pub struct DomPlaceExtractor {
    source: Arc<dyn PageSource>,
    keys: Arc<KeyDeriver>,
}

impl DomPlaceExtractor {
    pub fn new(source: Arc<dyn PageSource>, keys: Arc<KeyDeriver>) -> Self {
        Self { source, keys }
    }
}

#[async_trait::async_trait]
impl PageExtractor for DomPlaceExtractor {
    async fn extract(&self, _requested_url: &str) -> Result<Option<PlaceRecord>, ExtractError> {
        let page = self.source.snapshot().await?;
        Ok(parse_place_html(&page.html, &page.url, &self.keys))
    }
}

/// Best-effort parse of a place panel. Missing fields stay empty; only a
/// missing main panel yields `None`.
pub fn parse_place_html(html: &str, page_url: &str, keys: &KeyDeriver) -> Option<PlaceRecord> {
    let doc = Html::parse_document(html);
    let main_sel = Selector::parse(r#"div[role="main"]"#).ok()?;
    let main = doc.select(&main_sel).next()?;

    let name = first(main, "h1").map(text_of).unwrap_or_default();
    let address = first(main, r#"button[data-item-id="address"]"#)
        .map(text_of)
        .map(|text| strip_pin(&text).to_string())
        .unwrap_or_default();
    let business_type = first(main, r#"button[jsaction="pane.rating.category"]"#)
        .map(text_of)
        .unwrap_or_default();
    let phone = first(main, r#"button[data-item-id="phone:tel"]"#)
        .map(text_of)
        .unwrap_or_default();
    let website = first(main, r#"a[data-item-id="authority"]"#)
        .and_then(|el| el.value().attr("href"))
        .unwrap_or_default()
        .to_string();
    let rating = first(main, r#"div[role="img"][aria-label*="stars"]"#)
        .and_then(|el| el.value().attr("aria-label"))
        .and_then(leading_float);
    let review_count = first(main, r#"button[jsaction="pane.rating.moreReviews"]"#)
        .map(text_of)
        .and_then(|text| {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
        .unwrap_or(0);

    let about = first(main, r#"div[aria-label^="About"]"#);
    let about_text = about.map(text_of).unwrap_or_default();
    let amenity_details = about
        .map(|about| {
            select_all(about, "li span[aria-label]")
                .filter_map(|el| el.value().attr("aria-label"))
                .map(|label| label.trim().to_string())
                .filter(|label| !label.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let mut image_urls: Vec<String> = Vec::new();
    for src in select_all(main, r#"img[src*="googleusercontent.com"]"#)
        .filter_map(|el| el.value().attr("src"))
    {
        if !image_urls.iter().any(|seen| seen == src) {
            image_urls.push(src.to_string());
        }
    }

    Some(PlaceRecord {
        place_id: place_id_from_url(page_url, keys),
        name,
        address,
        coordinates: coordinates_from_url(page_url),
        business_type,
        phone,
        website,
        rating,
        review_count,
        amenity_details,
        about_text,
        image_urls,
        summary: None,
        url: page_url.to_string(),
    })
}

/// `@lat,lng` as it appears in place URLs.
pub fn coordinates_from_url(url: &str) -> Coordinates {
    let Ok(pattern) = Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)") else {
        return Coordinates::default();
    };
    match pattern.captures(url) {
        Some(caps) => Coordinates {
            lat: caps[1].parse().ok(),
            lng: caps[2].parse().ok(),
        },
        None => Coordinates::default(),
    }
}

fn place_id_from_url(url: &str, keys: &KeyDeriver) -> String {
    if let Some(derived) = keys.derive(url) {
        return derived.key;
    }
    // Fall back to the name segment, which at least identifies the page.
    url.split_once("place/")
        .map(|(_, rest)| rest.split('/').next().unwrap_or_default().to_string())
        .unwrap_or_default()
}

fn first<'a>(scope: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let found = scope.select(&selector).next();
    found
}

fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> impl Iterator<Item = ElementRef<'a>> {
    let matches: Vec<ElementRef<'a>> = match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).collect(),
        Err(_) => Vec::new(),
    };
    matches.into_iter()
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_pin(address: &str) -> &str {
    address.trim_start_matches('\u{1F4CD}').trim_start()
}

/// Mirrors `parseFloat`: the longest numeric prefix.
fn leading_float(label: &str) -> Option<f64> {
    let label = label.trim();
    let end = label
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map_or(label.len(), |(idx, _)| idx);
    label[..end].parse().ok()
}
