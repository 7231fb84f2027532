//! Harvester engine: async runtime executing the core's effects.
mod capture;
mod cdp;
mod collect;
mod enrich;
mod export;
mod extract;
mod navigate;
mod orchestrator;
mod panel;
mod persist;
mod settings;
mod types;

pub use capture::CaptureListener;
pub use cdp::{CdpBrowser, CdpError, LaunchOptions};
pub use collect::{collect_place_urls, CollectError, UrlCollector};
pub use enrich::{DisabledSummarizer, OpenAiSummarizer, Summarizer};
pub use export::{
    export_csv, export_filename, records_in_order, render_csv, ExportError, ExportSummary,
    CSV_HEADERS,
};
pub use extract::{
    coordinates_from_url, parse_place_html, DomPlaceExtractor, PageExtractor, PageSnapshot,
    PageSource,
};
pub use navigate::{BrowserTabs, NavigationController};
pub use orchestrator::{Collaborators, OrchestratorHandle};
pub use panel::{PanelHandle, PanelView, SessionSummary};
pub use persist::{
    ensure_output_dir, AtomicFileWriter, NullSnapshotStore, PersistError, SnapshotStore,
    SnapshotStoreError,
};
pub use settings::{EnrichSettings, HarvestSettings, NavigationSettings};
pub use types::{
    ChannelError, EnrichError, Enrichment, ExtractError, NavigationError, NetworkCompletion,
    TabInfo,
};
