use std::sync::{Arc, Mutex};

use harvester_engine::{BrowserTabs, NavigationController, NavigationError, NavigationSettings, TabInfo};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeTabs {
    tabs: Vec<TabInfo>,
    fail_update: bool,
    fail_create: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeTabs {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl BrowserTabs for FakeTabs {
    async fn tabs(&self) -> Result<Vec<TabInfo>, NavigationError> {
        Ok(self.tabs.clone())
    }

    async fn update(&self, tab_id: &str, url: &str) -> Result<(), NavigationError> {
        self.calls.lock().unwrap().push(format!("update {tab_id} {url}"));
        if self.fail_update {
            return Err(NavigationError::Update {
                tab_id: tab_id.to_string(),
                message: "No tab with id".into(),
            });
        }
        Ok(())
    }

    async fn create(&self, url: &str) -> Result<TabInfo, NavigationError> {
        self.calls.lock().unwrap().push(format!("create {url}"));
        if self.fail_create {
            return Err(NavigationError::Create("refused".into()));
        }
        Ok(TabInfo {
            id: "new".into(),
            url: url.to_string(),
            active: true,
        })
    }
}

fn tab(id: &str, url: &str, active: bool) -> TabInfo {
    TabInfo {
        id: id.into(),
        url: url.into(),
        active,
    }
}

fn controller(tabs: Arc<FakeTabs>) -> NavigationController {
    NavigationController::new(tabs, NavigationSettings::default())
}

#[test]
fn prefers_active_maps_tab_and_skips_devtools() {
    let tabs = vec![
        tab("1", "https://www.google.com/maps/place/A", false),
        tab("2", "devtools://DevTools/google.com/maps", true),
        tab("3", "https://www.google.com/maps/search/x", true),
    ];
    let nav = controller(Arc::new(FakeTabs::default()));

    assert_eq!(nav.pick_tab(&tabs).map(|t| t.id.as_str()), Some("3"));
    assert_eq!(nav.pick_tab(&tabs[..2]).map(|t| t.id.as_str()), Some("1"));
    assert_eq!(nav.pick_tab(&[tab("4", "https://example.com", true)]), None);
}

#[tokio::test(start_paused = true)]
async fn reuses_existing_tab() {
    engine_logging::initialize_for_tests();
    let fake = Arc::new(FakeTabs {
        tabs: vec![tab("7", "https://www.google.com/maps", true)],
        ..FakeTabs::default()
    });
    let nav = controller(fake.clone());

    let used = nav
        .navigate("https://www.google.com/maps/place/B", &CancellationToken::new())
        .await
        .expect("navigate");
    assert_eq!(used, "7");
    assert_eq!(fake.calls(), vec!["update 7 https://www.google.com/maps/place/B"]);
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_new_tab_when_update_fails() {
    engine_logging::initialize_for_tests();
    let fake = Arc::new(FakeTabs {
        tabs: vec![tab("7", "https://www.google.com/maps", true)],
        fail_update: true,
        ..FakeTabs::default()
    });
    let nav = controller(fake.clone());

    let used = nav
        .navigate("https://www.google.com/maps/place/B", &CancellationToken::new())
        .await
        .expect("navigate");
    assert_eq!(used, "new");
    assert_eq!(
        fake.calls(),
        vec![
            "update 7 https://www.google.com/maps/place/B",
            "create https://www.google.com/maps/place/B",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn fails_only_when_update_and_create_fail() {
    engine_logging::initialize_for_tests();
    let fake = Arc::new(FakeTabs {
        tabs: vec![tab("7", "https://www.google.com/maps", true)],
        fail_update: true,
        fail_create: true,
        ..FakeTabs::default()
    });
    let nav = controller(fake);

    let result = nav
        .navigate("https://www.google.com/maps/place/B", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(NavigationError::Create(_))));
}

#[tokio::test(start_paused = true)]
async fn waits_out_settle_delays() {
    engine_logging::initialize_for_tests();
    let nav = controller(Arc::new(FakeTabs::default()));
    let started = tokio::time::Instant::now();

    nav.navigate("https://www.google.com/maps/place/B", &CancellationToken::new())
        .await
        .expect("navigate");
    assert_eq!(started.elapsed(), std::time::Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_settling() {
    engine_logging::initialize_for_tests();
    let nav = controller(Arc::new(FakeTabs::default()));
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let result = nav.navigate("https://www.google.com/maps/place/B", &token).await;
    assert!(matches!(result, Err(NavigationError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn open_tab_reports_the_tab_before_settling() {
    engine_logging::initialize_for_tests();
    let nav = controller(Arc::new(FakeTabs::default()));
    let token = CancellationToken::new();
    let started = tokio::time::Instant::now();

    let tab_id = nav
        .open_tab("https://www.google.com/maps/place/B", &token)
        .await
        .expect("open");
    assert_eq!(tab_id, "new");
    assert_eq!(started.elapsed(), std::time::Duration::ZERO);

    nav.settle(&token).await.expect("settle");
    assert_eq!(started.elapsed(), std::time::Duration::from_secs(8));
}
