mod app;
mod config;
mod persistence;
mod render;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use engine_logging::LogDestination;
use log::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "harvester", version, about = "Harvest place listings from map pages")]
pub struct Cli {
    /// RON config file; defaults to ./harvester.ron when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Also write the log to this file.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Visit every URL in a list and extract its place record.
    Run(RunArgs),
    /// Gather place links from a search-results page, then harvest them.
    Collect(CollectArgs),
    /// Write the saved session's records to CSV without visiting anything.
    Export(OutputArgs),
    /// Forget the saved session.
    Clear(OutputArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// File with one place URL per line. Blank lines and `#` comments are skipped.
    pub urls: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Maps search-results URL to read place links from.
    pub search_url: String,

    /// Write the collected URLs to this file and stop instead of harvesting.
    #[arg(long)]
    pub save: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,

    #[command(flatten)]
    pub browser: BrowserArgs,
}

#[derive(Debug, Args)]
pub struct BrowserArgs {
    #[arg(long)]
    pub headless: bool,

    /// Chrome or Chromium executable to launch.
    #[arg(long)]
    pub chrome: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Directory for the session state and CSV exports.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    engine_logging::initialize(destination, level);

    app::run(cli).await
}
