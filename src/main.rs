//! Pagevault main entry point
//!
//! Command-line interface for capturing web pages into self-contained
//! local snapshots.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pagevault::capture::{Archiver, CaptureRequest, ProgressCallback, ProgressUpdate};
use pagevault::catalog::{Catalog, ListFilter, SqliteCatalog};
use pagevault::config::{load_or_default, validate};
use pagevault::fetch::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pagevault: a self-contained web page archiver
///
/// Pagevault captures live web pages into replayable local snapshots,
/// downloading every referenced stylesheet, script, image, and font and
/// rewriting the page to use the local copies.
#[derive(Parser, Debug)]
#[command(name = "pagevault")]
#[command(version = "2.0.0")]
#[command(about = "A self-contained web page archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", default_value = "pagevault.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture one page into a snapshot bundle
    Capture {
        /// Page URL to capture
        url: String,

        /// Fetch engine to use for this capture
        #[arg(long, value_enum)]
        engine: Option<Engine>,

        /// Strip scripts and active content from the capture
        #[arg(long)]
        sanitize: bool,

        /// Skip the robots.txt check
        #[arg(long)]
        ignore_robots: bool,
    },

    /// Capture several pages sequentially
    Batch {
        /// Page URLs to capture
        #[arg(required = true)]
        urls: Vec<String>,

        /// Fetch engine to use for every capture
        #[arg(long, value_enum)]
        engine: Option<Engine>,

        /// Strip scripts and active content from the captures
        #[arg(long)]
        sanitize: bool,
    },

    /// Clone an existing snapshot into a new editable version
    Fork {
        /// Directory of the snapshot to clone
        directory: PathBuf,

        /// Title for the new version
        #[arg(long)]
        title: Option<String>,
    },

    /// List catalogued snapshots
    List {
        /// Substring matched against title, URL, and domain
        #[arg(long)]
        search: Option<String>,

        /// Restrict to snapshots carrying this tag
        #[arg(long)]
        tag: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_or_default(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    validate(&config)?;

    let catalog = SqliteCatalog::new(std::path::Path::new(&config.catalog.database_path))
        .context("failed to open catalog database")?;
    let archiver = Archiver::new(config, catalog)?;

    match cli.command {
        Command::Capture {
            url,
            engine,
            sanitize,
            ignore_robots,
        } => {
            let request = CaptureRequest {
                url,
                engine,
                sanitize: sanitize.then_some(true),
                ignore_robots,
            };
            let result = archiver.capture(&request, Some(progress_printer(cli.quiet))).await;
            archiver.shutdown().await;

            let capture_report = result?;
            println!("Saved: {}", capture_report.metadata.directory);
            for error in &capture_report.resource_errors {
                println!("  resource failed: {} ({})", error.url, error.reason);
            }
        }

        Command::Batch {
            urls,
            engine,
            sanitize,
        } => {
            let requests: Vec<CaptureRequest> = urls
                .into_iter()
                .map(|url| CaptureRequest {
                    url,
                    engine,
                    sanitize: sanitize.then_some(true),
                    ignore_robots: false,
                })
                .collect();

            let report = archiver.batch(&requests).await;
            println!(
                "Batch complete: {} of {} captured",
                report.succeeded.len(),
                report.attempted
            );
            for failure in &report.failed {
                println!("  failed: {} ({})", failure.url, failure.reason);
            }
        }

        Command::Fork { directory, title } => {
            let metadata = archiver.fork(&directory, title.as_deref())?;
            println!("Forked into: {}", metadata.directory);
        }

        Command::List { search, tag } => {
            let filter = ListFilter { search, tag };
            let entries = archiver.catalog().list_entries(&filter)?;
            if entries.is_empty() {
                println!("No snapshots found");
            }
            for entry in entries {
                println!(
                    "[{}] {} - {} ({})",
                    entry.id, entry.title, entry.url, entry.date_saved
                );
            }
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagevault=info,warn"),
            1 => EnvFilter::new("pagevault=debug,info"),
            2 => EnvFilter::new("pagevault=trace,debug"),
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

/// Prints capture progress to stdout
fn progress_printer(quiet: bool) -> ProgressCallback {
    Arc::new(move |update: ProgressUpdate| {
        if !quiet {
            println!("[{:3}%] {}", update.percent, update.message);
        }
    })
}
