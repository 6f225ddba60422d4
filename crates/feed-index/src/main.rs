//! # Feed Index CLI (`fidx`)
//!
//! The `fidx` binary manages the local feed database: schema setup,
//! file-based ingestion, search, and per-source maintenance.
//!
//! ## Usage
//!
//! ```bash
//! fidx --config ./config/fidx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fidx init` | Create the SQLite database and run schema migrations |
//! | `fidx ingest <file>` | Store a JSON ingest request (`handle`, `items`, ...) |
//! | `fidx import-timeline <file> --handle <h>` | Decode and store a raw timeline payload |
//! | `fidx search "<query>"` | Ranked keyword search over stored items |
//! | `fidx sources [--handle <h>]` | List sources, or show one source in detail |
//! | `fidx stats` | Item/source counts and database size |
//! | `fidx status <handle> <status>` | Set a source's sync status |
//! | `fidx purge <handle>` | Delete a source and all its items |
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

use feed_index::search::{SearchArgs, SortMode};
use feed_index::{config, ingest, migrate, search, sources, stats, SyncStatus};

/// Feed Index CLI: capture, deduplicate, and search social feeds locally.
#[derive(Parser)]
#[command(
    name = "fidx",
    about = "Feed Index — local storage and ranked search for captured feed items",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/fidx.toml`. Only `[db].path` is required.
    #[arg(long, global = true, default_value = "./config/fidx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Ingest a JSON batch of items for one handle.
    ///
    /// The file holds `{"handle": ..., "items": [...], "displayName": ...,
    /// "avatarUrl": ...}`. Items already stored are skipped.
    Ingest {
        /// Path to the ingest request JSON.
        file: PathBuf,
    },

    /// Decode a raw timeline payload and ingest its items.
    ImportTimeline {
        /// Path to the timeline JSON.
        file: PathBuf,

        /// Handle the items are attributed to.
        #[arg(long)]
        handle: String,

        /// Display name recorded in the source summary.
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Search stored items.
    Search {
        /// Free-text query; every whitespace-separated token must match.
        query: String,

        /// Restrict to one source handle.
        #[arg(long)]
        source: Option<String>,

        /// Earliest day to include (YYYY-MM-DD, UTC).
        #[arg(long)]
        from: Option<String>,

        /// Latest day to include (YYYY-MM-DD, UTC).
        #[arg(long)]
        to: Option<String>,

        /// Only items with attached media.
        #[arg(long)]
        media_only: bool,

        /// Minimum like count.
        #[arg(long)]
        min_likes: Option<u64>,

        /// Result ordering: `relevance`, `newest`, or `oldest`.
        #[arg(long, default_value = "relevance")]
        sort: String,

        /// Maximum number of results (defaults to `[search].default_limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List indexed sources, or show one in detail.
    Sources {
        #[arg(long)]
        handle: Option<String>,
    },

    /// Show database statistics.
    Stats,

    /// Set the sync status of a source.
    Status {
        handle: String,

        /// One of `idle`, `indexing`, `paused`, `complete`.
        status: String,
    },

    /// Delete a source and every item captured for it.
    Purge { handle: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { file } => {
            ingest::run_ingest(&cfg, &file).await?;
        }
        Commands::ImportTimeline {
            file,
            handle,
            display_name,
        } => {
            ingest::run_import_timeline(&cfg, &file, &handle, display_name).await?;
        }
        Commands::Search {
            query,
            source,
            from,
            to,
            media_only,
            min_likes,
            sort,
            limit,
        } => {
            let args = SearchArgs {
                source,
                from,
                to,
                media_only,
                min_likes,
                sort: sort.parse::<SortMode>()?,
                limit,
            };
            search::run_search(&cfg, &query, args).await?;
        }
        Commands::Sources { handle } => match handle {
            Some(handle) => sources::run_profile(&cfg, &handle).await?,
            None => sources::run_sources(&cfg).await?,
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Status { handle, status } => {
            let status = status.parse::<SyncStatus>()?;
            sources::run_set_status(&cfg, &handle, status).await?;
        }
        Commands::Purge { handle } => {
            sources::run_purge(&cfg, &handle).await?;
        }
    }

    Ok(())
}
