use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use harvester_core::orchestrator::OrchestratorState;
use harvester_core::panel::{Msg as PanelMsg, PanelState};
use harvester_core::{Command, KeyDeriver, SessionSnapshot};
use harvester_engine::{
    export_csv, AtomicFileWriter, CaptureListener, CdpBrowser, Collaborators, DomPlaceExtractor,
    ExportError, HarvestSettings, LaunchOptions, NavigationController, NetworkCompletion,
    OpenAiSummarizer, OrchestratorHandle, PanelHandle, SnapshotStore, UrlCollector,
};
use tokio::sync::mpsc;

use crate::config::FileConfig;
use crate::persistence::RonSnapshotStore;
use crate::render::TerminalView;
use crate::{BrowserArgs, Cli, CliCommand, CollectArgs, OutputArgs};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = FileConfig::load(cli.config.as_deref())?;
    match cli.command {
        CliCommand::Run(args) => {
            let urls = load_url_list(&args.urls)?;
            harvest(config, Targets::Listed(urls), &args.browser, &args.output).await
        }
        CliCommand::Collect(args) => match args.save.clone() {
            Some(path) => collect_to_file(config, &args, &path).await,
            None => {
                let targets = Targets::Search(args.search_url.clone());
                harvest(config, targets, &args.browser, &args.output).await
            }
        },
        CliCommand::Export(args) => {
            let dir = output_dir(&config, &args);
            let snapshot = RonSnapshotStore::new(dir.clone()).load()?.unwrap_or_default();
            export(&snapshot, dir)
        }
        CliCommand::Clear(args) => {
            let store = RonSnapshotStore::new(output_dir(&config, &args));
            store.save(&SessionSnapshot::default())?;
            engine_info!("Cleared saved session at {}", store.path().display());
            Ok(())
        }
    }
}

fn output_dir(config: &FileConfig, args: &OutputArgs) -> PathBuf {
    args.out.clone().unwrap_or_else(|| config.output_dir.clone())
}

/// URLs listed one per line; blank lines and `#` comments are skipped.
pub fn read_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn load_url_list(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading URL list {}", path.display()))?;
    let urls = read_url_list(&text);
    if urls.is_empty() {
        bail!("no URLs in {}", path.display());
    }
    Ok(urls)
}

/// Where the URLs of a harvest come from.
enum Targets {
    Listed(Vec<String>),
    /// Collected from a search-results page once the browser is up.
    Search(String),
}

fn restore_state(settings: &HarvestSettings, store: &dyn SnapshotStore) -> OrchestratorState {
    match store.load() {
        Ok(Some(snapshot)) => {
            engine_info!(
                "Resuming saved session: {} records, {} collected URLs",
                snapshot.processed_data.len(),
                snapshot.collected_urls.len()
            );
            OrchestratorState::restore(settings.orchestrator.clone(), &snapshot)
        }
        Ok(None) => OrchestratorState::new(settings.orchestrator.clone()),
        Err(err) => {
            engine_warn!("Ignoring unreadable saved session: {}", err);
            OrchestratorState::new(settings.orchestrator.clone())
        }
    }
}

fn apply_browser_args(config: &mut FileConfig, args: &BrowserArgs) {
    if args.headless {
        config.headless = true;
    }
    if args.chrome.is_some() {
        config.chrome_executable = args.chrome.clone();
    }
}

async fn launch_browser(
    config: &FileConfig,
) -> anyhow::Result<(Arc<CdpBrowser>, mpsc::UnboundedReceiver<NetworkCompletion>)> {
    let launched = CdpBrowser::launch(LaunchOptions {
        headless: config.headless,
        chrome_executable: config.chrome_executable.clone(),
        user_data_dir: config.user_data_dir.clone(),
    })
    .await?;
    Ok(launched)
}

/// Load `search_url` and read its place links. Responses seen while the
/// results page loaded are discarded so they never reach the orchestrator.
async fn collect_links(
    browser: &Arc<CdpBrowser>,
    settings: &HarvestSettings,
    completions: &mut mpsc::UnboundedReceiver<NetworkCompletion>,
    search_url: &str,
) -> anyhow::Result<Vec<String>> {
    let navigator = Arc::new(NavigationController::new(
        browser.clone(),
        settings.navigation.clone(),
    ));
    let collected = UrlCollector::new(navigator, browser.clone())
        .collect(search_url)
        .await;
    while completions.try_recv().is_ok() {}
    let urls = collected?;
    engine_info!("Collected {} place URLs from {}", urls.len(), search_url);
    Ok(urls)
}

async fn collect_to_file(
    mut config: FileConfig,
    args: &CollectArgs,
    path: &Path,
) -> anyhow::Result<()> {
    apply_browser_args(&mut config, &args.browser);
    let settings = config.to_settings(|name| std::env::var(name).ok());
    let (browser, mut completions) = launch_browser(&config).await?;
    let collected = collect_links(&browser, &settings, &mut completions, &args.search_url).await;
    browser.close().await;
    let urls = collected?;
    if urls.is_empty() {
        bail!("no place links found on {}", args.search_url);
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid URL list path {}", path.display()))?;
    let mut text = urls.join("\n");
    text.push('\n');
    let written = AtomicFileWriter::new(dir).write(filename, text.as_bytes())?;
    engine_info!("Wrote {} URLs to {}", urls.len(), written.display());
    Ok(())
}

async fn harvest(
    mut config: FileConfig,
    targets: Targets,
    browser_args: &BrowserArgs,
    output: &OutputArgs,
) -> anyhow::Result<()> {
    apply_browser_args(&mut config, browser_args);
    let out_dir = output_dir(&config, output);

    let settings = config.to_settings(|name| std::env::var(name).ok());
    if config.enrich && settings.enrich.api_key.is_none() {
        engine_warn!("OPENAI_API_KEY not set; summaries will be skipped");
    }
    let store = Arc::new(RonSnapshotStore::new(out_dir.clone()));
    let keys = Arc::new(KeyDeriver::standard());
    let state = restore_state(&settings, store.as_ref()).with_key_deriver(keys.clone());

    let (browser, mut completions) = launch_browser(&config).await?;
    let urls = match targets {
        Targets::Listed(urls) => urls,
        Targets::Search(search_url) => {
            let collected = collect_links(&browser, &settings, &mut completions, &search_url).await;
            match collected {
                Ok(urls) if !urls.is_empty() => urls,
                Ok(_) => {
                    browser.close().await;
                    bail!("no place links found on {search_url}");
                }
                Err(err) => {
                    browser.close().await;
                    return Err(err);
                }
            }
        }
    };

    let collaborators = Collaborators {
        navigator: NavigationController::new(browser.clone(), settings.navigation.clone()),
        extractor: Arc::new(DomPlaceExtractor::new(browser.clone(), keys.clone())),
        summarizer: Arc::new(OpenAiSummarizer::new(settings.enrich.clone())?),
        store: store.clone(),
        extraction_timeout: settings.extraction_timeout,
    };
    let (orchestrator, orchestrator_task) = OrchestratorHandle::spawn(state, collaborators);
    let capture_task =
        CaptureListener::new(settings.capture.clone()).spawn(completions, orchestrator.clone());

    let panel_state = PanelState::new(settings.panel.clone()).with_key_deriver(keys);
    let (mut panel, panel_task) = PanelHandle::spawn(
        orchestrator.clone(),
        panel_state,
        Box::new(TerminalView::new()),
    )?;
    panel.dispatch(PanelMsg::UrlsCollected(urls))?;
    panel.dispatch(PanelMsg::StartClicked)?;

    let finished = tokio::select! {
        summary = panel.completed() => summary.is_some(),
        _ = tokio::signal::ctrl_c() => {
            engine_warn!("Interrupted; the next run resumes where this one stopped");
            false
        }
    };

    let snapshot = orchestrator
        .send(Command::GetState)
        .await?
        .state
        .unwrap_or_default();

    drop(panel);
    let _ = panel_task.await;
    capture_task.abort();
    drop(orchestrator);
    let _ = orchestrator_task.await;
    browser.close().await;

    if finished {
        export(&snapshot, out_dir)?;
    }
    Ok(())
}

fn export(snapshot: &SessionSnapshot, out_dir: PathBuf) -> anyhow::Result<()> {
    let writer = AtomicFileWriter::new(out_dir);
    let stamp = chrono::Local::now().naive_local();
    match export_csv(snapshot, &writer, &stamp) {
        Ok(summary) => {
            engine_info!("Exported {} records to {}", summary.rows, summary.path.display());
            Ok(())
        }
        Err(ExportError::Empty) => {
            engine_warn!("No records to export");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
