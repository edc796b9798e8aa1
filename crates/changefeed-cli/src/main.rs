//! Change feed CLI (feedctl)
//!
//! Command-line tool for reading a change feed laid out in a local directory.
//!
//! ## Overview
//!
//! `feedctl` wraps the `changefeed-storage` reader:
//! - **read**: Print events as JSON lines, optionally resuming from a cursor file
//! - **segments**: List the segments that a read would visit
//! - **cursor**: Validate and pretty-print a saved cursor
//!
//! ## Quick Start
//!
//! ```bash
//! export FEEDCTL_ROOT=/data/account/changefeed
//!
//! # Everything published so far
//! feedctl read
//!
//! # Resumable: the cursor file is read on start and rewritten after every page
//! feedctl read --cursor-file feed.cursor --page-size 500
//!
//! # One afternoon
//! feedctl read --start 2024-05-01T12:00:00Z --end 2024-05-01T18:00:00Z
//! ```
//!
//! ## Configuration
//!
//! - `FEEDCTL_ROOT`: Feed directory (or `root` in the config file)
//! - `FEEDCTL_CONFIG`: Config file (default: ~/.changefeed/config.toml)
//! - `RUST_LOG`: Log filter such as `warn` or `changefeed_storage=debug` (default: info);
//!   logs go to stderr
//!
//! Ctrl-C cancels the read in flight. The cursor file keeps the last completed page.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use changefeed_storage::{
    ChangeFeed, ChangeFeedCursor, Error as FeedError, FeedConfig, FeedOptions, LogStore,
    ObjectStoreLog,
};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "feedctl")]
#[command(about = "Change feed command-line reader", long_about = None)]
struct Cli {
    /// Directory holding the change feed
    #[arg(short, long, env = "FEEDCTL_ROOT")]
    root: Option<PathBuf>,

    /// Config file
    #[arg(long, env = "FEEDCTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print events as JSON lines
    Read {
        /// Events per page
        #[arg(short, long)]
        page_size: Option<usize>,

        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,

        /// Earliest segment hour (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Latest segment hour (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        /// Resume from and save progress to this file
        #[arg(long)]
        cursor_file: Option<PathBuf>,
    },

    /// List the segments a read would visit
    Segments {
        /// Earliest segment hour (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Latest segment hour (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Validate and pretty-print a cursor file
    Cursor {
        /// Cursor file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Cursor { path } => show_cursor(&path),
        Commands::Read {
            page_size,
            max_pages,
            start,
            end,
            cursor_file,
        } => {
            let store = open_store(cli.root.as_deref(), &config)?;
            let page_size = page_size.unwrap_or(config.page_size);
            let options = window(start, end);
            read(store, config.feed, options, page_size, max_pages, cursor_file).await
        }
        Commands::Segments { start, end } => {
            let store = open_store(cli.root.as_deref(), &config)?;
            segments(store, config.feed, window(start, end)).await
        }
    }
}

fn open_store(root: Option<&Path>, config: &Config) -> Result<Arc<dyn LogStore>> {
    let root = root
        .or(config.root.as_deref())
        .context("no feed directory: pass --root, set FEEDCTL_ROOT, or set root in the config file")?;
    let store = ObjectStoreLog::local(root)
        .with_context(|| format!("failed to open feed directory {}", root.display()))?;
    Ok(Arc::new(store))
}

fn window(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> FeedOptions {
    let mut options = FeedOptions::default();
    if let Some(start) = start {
        options = options.with_start_time(start);
    }
    if let Some(end) = end {
        options = options.with_end_time(end);
    }
    options
}

async fn read(
    store: Arc<dyn LogStore>,
    feed_config: FeedConfig,
    mut options: FeedOptions,
    page_size: usize,
    max_pages: Option<usize>,
    cursor_file: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = cursor_file.as_deref().filter(|path| path.exists()) {
        let cursor = load_cursor(path)?;
        info!(path = %path.display(), "Resuming from cursor");
        options = options.with_cursor(cursor);
    }

    let token = CancellationToken::new();
    options = options.with_cancellation(token.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut feed = ChangeFeed::open_with_config(store, feed_config, options)
        .await
        .context("failed to open change feed")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut pages = 0;
    let mut events = 0;

    while max_pages.map_or(true, |max| pages < max) {
        let page = match feed.get_page(page_size).await {
            Ok(Some(page)) => page,
            Ok(None) => break,
            Err(FeedError::Cancelled) => {
                warn!(pages, events, "Interrupted");
                return Ok(());
            }
            Err(e) => return Err(e).context("failed to read page"),
        };

        for event in &page.events {
            serde_json::to_writer(&mut out, event)?;
            writeln!(out)?;
        }
        out.flush()?;

        if let Some(path) = &cursor_file {
            save_cursor(path, &page.cursor)?;
        }
        pages += 1;
        events += page.events.len();
    }

    // An empty read still leaves a cursor to resume from
    if let Some(path) = &cursor_file {
        save_cursor(path, &feed.cursor())?;
    }

    info!(pages, events, "Read complete");
    Ok(())
}

async fn segments(
    store: Arc<dyn LogStore>,
    feed_config: FeedConfig,
    options: FeedOptions,
) -> Result<()> {
    let feed = ChangeFeed::open_with_config(store, feed_config, options)
        .await
        .context("failed to open change feed")?;

    println!("lastConsumable\t{}", feed.last_consumable().to_rfc3339());
    for segment in feed.segments() {
        println!("{}\t{}", segment.time().to_rfc3339(), segment.path());
    }
    Ok(())
}

fn show_cursor(path: &Path) -> Result<()> {
    let cursor = load_cursor(path)?;
    println!("{}", serde_json::to_string_pretty(&cursor)?);
    Ok(())
}

fn load_cursor(path: &Path) -> Result<ChangeFeedCursor> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read cursor file {}", path.display()))?;
    if json.trim().is_empty() {
        bail!("cursor file {} is empty", path.display());
    }
    ChangeFeedCursor::from_json(&json)
        .with_context(|| format!("invalid cursor file {}", path.display()))
}

fn save_cursor(path: &Path, cursor: &ChangeFeedCursor) -> Result<()> {
    let json = cursor.to_json()?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write cursor file {}", path.display()))
}
