//! Sitegraph main entry point
//!
//! This is the command-line interface for the sitegraph site mapper.

use anyhow::Context;
use clap::Parser;
use sitegraph::config::{load_config, Config, RobotsPolicy, ScanDepth};
use sitegraph::crawler::Coordinator;
use sitegraph::output::{print_report, write_graph_json, write_markdown_report, CrawlEvent};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Sitegraph: a domain-scoped site mapper
///
/// Crawls a single site from a seed URL, following links on the seed's host
/// up to a bounded depth, and reports every resource it found.
#[derive(Parser, Debug)]
#[command(name = "sitegraph")]
#[command(version)]
#[command(about = "A domain-scoped site mapper", long_about = None)]
struct Cli {
    /// Absolute http(s) URL to start from
    #[arg(value_name = "URL")]
    url: String,

    /// Scan depth: quick, full, deep (or 1, 2, 3)
    #[arg(long, value_name = "DEPTH", default_value = "full")]
    scan: ScanDepth,

    /// Path to TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of concurrent fetch workers (overrides the config file)
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Fetch URLs even when robots.txt disallows them
    #[arg(long)]
    ignore_robots: bool,

    /// Write the link graph as JSON
    #[arg(long, value_name = "FILE")]
    graph_out: Option<PathBuf>,

    /// Write the report as markdown
    #[arg(long, value_name = "FILE")]
    report_out: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let coordinator = Coordinator::new(config, &cli.url, cli.scan)
        .with_context(|| format!("Cannot start crawl of {}", cli.url))?
        .with_events(events_tx);

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight requests");
            cancel.cancel();
        }
    });

    let progress = tokio::spawn(log_progress(events_rx));

    let outcome = match coordinator.run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };
    // The sender was dropped with the coordinator, so this ends promptly
    progress.await?;

    if !cli.quiet {
        print_report(&outcome.report);
    }

    if let Some(path) = &cli.graph_out {
        write_graph_json(&outcome.graph, path)
            .with_context(|| format!("Failed to write graph to {}", path.display()))?;
    }
    if let Some(path) = &cli.report_out {
        write_markdown_report(&outcome.report, &outcome.graph, path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sitegraph=info,warn"),
            1 => EnvFilter::new("sitegraph=debug,info"),
            2 => EnvFilter::new("sitegraph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file if given and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if cli.ignore_robots {
        config.robots.policy = RobotsPolicy::Ignore;
    }

    Ok(config)
}

/// Logs crawl events until the coordinator drops its sender
async fn log_progress(mut events: mpsc::UnboundedReceiver<CrawlEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::FetchStarted { url } => tracing::trace!("Fetching {}", url),
            CrawlEvent::Settled { url, status } => tracing::debug!("Settled {}: {:?}", url, status),
            CrawlEvent::Errored { url, kind } => tracing::debug!("Errored {}: {}", url, kind),
            CrawlEvent::Progress {
                discovered,
                settled,
                errored,
                queued,
                in_flight,
            } => {
                let done = settled + errored;
                if done % 10 == 0 || (queued == 0 && in_flight == 0) {
                    tracing::info!(
                        "Progress: {} discovered, {} settled, {} errored, {} queued, {} in flight",
                        discovered,
                        settled,
                        errored,
                        queued,
                        in_flight
                    );
                }
            }
        }
    }
}
