use std::sync::Arc;

use harvester_core::{Coordinates, KeyDeriver};
use harvester_engine::{
    collect_place_urls, coordinates_from_url, parse_place_html, BrowserTabs, DomPlaceExtractor,
    ExtractError, NavigationController, NavigationError, NavigationSettings, PageExtractor,
    PageSnapshot, PageSource, TabInfo, UrlCollector,
};
use pretty_assertions::assert_eq;

const PAGE_URL: &str = "https://www.google.com/maps/place/Pine+Park+RV/@44.0521,-123.0868,17z/data=!4m6!3m5!1s0x54c11e:0x9f3a!8m2";

const PLACE_HTML: &str = r#"
<html><body>
<div role="main">
  <h1> Pine Park RV
     Resort </h1>
  <div role="img" aria-label="4.6 stars "></div>
  <button jsaction="pane.rating.moreReviews">(1,234)</button>
  <button jsaction="pane.rating.category">RV park</button>
  <button data-item-id="address">📍 100 River Rd, Eugene, OR</button>
  <button data-item-id="phone:tel">(541) 555-0100</button>
  <a data-item-id="authority" href="https://pinepark.example.com/">pinepark.example.com</a>
  <img src="https://lh5.googleusercontent.com/p/photo1">
  <img src="https://lh5.googleusercontent.com/p/photo1">
  <img src="https://maps.gstatic.com/icon.png">
  <div aria-label="About Pine Park RV">
    <p>Riverside sites with full hookups.</p>
    <ul>
      <li><span aria-label="Has Wi-Fi">Wi-Fi</span></li>
      <li><span aria-label="Pets allowed">Pets</span></li>
    </ul>
  </div>
</div>
</body></html>
"#;

#[test]
fn parses_place_panel() {
    let record = parse_place_html(PLACE_HTML, PAGE_URL, &KeyDeriver::standard()).expect("record");

    assert_eq!(record.place_id, "0x54c11e:0x9f3a");
    assert_eq!(record.name, "Pine Park RV Resort");
    assert_eq!(record.address, "100 River Rd, Eugene, OR");
    assert_eq!(record.business_type, "RV park");
    assert_eq!(record.phone, "(541) 555-0100");
    assert_eq!(record.website, "https://pinepark.example.com/");
    assert_eq!(record.rating, Some(4.6));
    assert_eq!(record.review_count, 1234);
    assert_eq!(
        record.coordinates,
        Coordinates {
            lat: Some(44.0521),
            lng: Some(-123.0868),
        }
    );
    assert_eq!(record.amenity_details, vec!["Has Wi-Fi", "Pets allowed"]);
    assert!(record.about_text.contains("Riverside sites with full hookups."));
    assert_eq!(
        record.image_urls,
        vec!["https://lh5.googleusercontent.com/p/photo1".to_string()]
    );
    assert_eq!(record.url, PAGE_URL);
    assert_eq!(record.summary, None);
}

#[test]
fn missing_main_panel_yields_none() {
    let html = "<html><body><div>loading</div></body></html>";
    assert_eq!(parse_place_html(html, PAGE_URL, &KeyDeriver::standard()), None);
}

#[test]
fn sparse_panel_keeps_defaults() {
    let html = r#"<div role="main"><h1>Only A Name</h1></div>"#;
    let record = parse_place_html(
        html,
        "https://www.google.com/maps/place/Only+A+Name",
        &KeyDeriver::standard(),
    )
    .expect("record");

    assert_eq!(record.name, "Only A Name");
    assert_eq!(record.place_id, "Only+A+Name");
    assert_eq!(record.rating, None);
    assert_eq!(record.review_count, 0);
    assert_eq!(record.coordinates, Coordinates::default());
}

#[test]
fn coordinates_need_decimal_pair() {
    assert_eq!(
        coordinates_from_url("https://x/@-33.86,151.2,12z"),
        Coordinates {
            lat: Some(-33.86),
            lng: Some(151.2),
        }
    );
    assert_eq!(coordinates_from_url("https://x/@33,151"), Coordinates::default());
}

struct StaticPage(Option<PageSnapshot>);

#[async_trait::async_trait]
impl PageSource for StaticPage {
    async fn snapshot(&self) -> Result<PageSnapshot, ExtractError> {
        self.0.clone().ok_or(ExtractError::NoPage)
    }
}

#[tokio::test]
async fn dom_extractor_reads_current_page() {
    let source = StaticPage(Some(PageSnapshot {
        url: PAGE_URL.to_string(),
        html: PLACE_HTML.to_string(),
    }));
    let extractor = DomPlaceExtractor::new(Arc::new(source), Arc::new(KeyDeriver::standard()));

    let record = extractor.extract(PAGE_URL).await.expect("extract");
    assert_eq!(record.map(|r| r.place_id), Some("0x54c11e:0x9f3a".to_string()));

    let empty = DomPlaceExtractor::new(Arc::new(StaticPage(None)), Arc::new(KeyDeriver::standard()));
    assert!(matches!(empty.extract(PAGE_URL).await, Err(ExtractError::NoPage)));
}

const SEARCH_URL: &str = "https://www.google.com/maps/search/rv+parks+near+eugene/";

const RESULTS_HTML: &str = r#"
<html><body>
<div role="feed">
  <div class="Nv2PK">
    <a class="hfpxzc" href="https://www.google.com/maps/place/Pine+Park+RV/data=!4m2!3m1!1s0x1:0xa1"></a>
    <a data-tooltip="Open website" href="https://pinepark.example.com/">Website</a>
  </div>
  <div class="Nv2PK">
    <a class="hfpxzc" href="/maps/place/River+Bend/data=!4m2!3m1!1s0x1:0xb2"></a>
  </div>
  <div jsaction="mouseover:pane.navigationCard">
    <a href="https://www.google.com/maps/place/Pine+Park+RV/data=!4m2!3m1!1s0x1:0xa1"></a>
    <a href="https://www.google.com/maps/place/Oak+Grove/data=!4m2!3m1!1s0x1:0xc3"></a>
  </div>
  <div class="Nv2PK">
    <a class="hfpxzc" href="https://www.google.com/maps/dir/somewhere"></a>
  </div>
  <a href="https://www.google.com/maps/search/more+results">More</a>
  <a href="">empty</a>
</div>
</body></html>
"#;

#[test]
fn collects_place_links_from_search_results() {
    let urls = collect_place_urls(RESULTS_HTML, SEARCH_URL);

    assert_eq!(
        urls,
        vec![
            "https://www.google.com/maps/place/Pine+Park+RV/data=!4m2!3m1!1s0x1:0xa1".to_string(),
            "https://www.google.com/maps/place/River+Bend/data=!4m2!3m1!1s0x1:0xb2".to_string(),
            "https://www.google.com/maps/place/Oak+Grove/data=!4m2!3m1!1s0x1:0xc3".to_string(),
        ]
    );
}

#[test]
fn page_without_place_links_collects_nothing() {
    let html = r#"<div class="Nv2PK"><a class="hfpxzc" href="/maps/dir/x"></a></div>"#;

    assert!(collect_place_urls(html, SEARCH_URL).is_empty());
    assert!(collect_place_urls("", SEARCH_URL).is_empty());
}

struct OneTab;

#[async_trait::async_trait]
impl BrowserTabs for OneTab {
    async fn tabs(&self) -> Result<Vec<TabInfo>, NavigationError> {
        Ok(Vec::new())
    }

    async fn update(&self, tab_id: &str, _url: &str) -> Result<(), NavigationError> {
        Err(NavigationError::Update {
            tab_id: tab_id.to_string(),
            message: "no tabs".into(),
        })
    }

    async fn create(&self, url: &str) -> Result<TabInfo, NavigationError> {
        Ok(TabInfo {
            id: "tab-1".into(),
            url: url.to_string(),
            active: true,
        })
    }
}

#[tokio::test(start_paused = true)]
async fn collector_reads_links_of_the_loaded_results_page() {
    engine_logging::initialize_for_tests();
    let navigator = Arc::new(NavigationController::new(
        Arc::new(OneTab),
        NavigationSettings::default(),
    ));
    let source = StaticPage(Some(PageSnapshot {
        url: SEARCH_URL.to_string(),
        html: RESULTS_HTML.to_string(),
    }));
    let collector = UrlCollector::new(navigator.clone(), Arc::new(source));

    let urls = collector.collect(SEARCH_URL).await.expect("collect");
    assert_eq!(urls.len(), 3);
    assert!(urls.iter().all(|url| url.contains("/maps/place/")));

    let blank = UrlCollector::new(navigator, Arc::new(StaticPage(None)));
    assert!(blank.collect(SEARCH_URL).await.is_err());
}
