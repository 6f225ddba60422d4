//! # Feed Index
//!
//! **A local-first acquisition, deduplication, and search layer for
//! infinite-scroll social feeds.**
//!
//! Feed Index drives a paced scroll over a feed view, hands every newly
//! rendered batch to an extractor, stores the items in SQLite keyed by
//! their id, and answers ranked keyword searches over everything captured.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │ Acquisition │──▶│ Coordinator │──▶│  SQLite   │
//! │ scroll loop │   │ extract+dedup│  │ items/src │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │
//!                                          ▼
//!                                    ┌──────────┐
//!                                    │   CLI    │
//!                                    │  (fidx)  │
//!                                    └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. A [`acquisition::ScrollSession`] advances the view by a fixed
//!    distance after a randomized delay, reporting `ItemsInView` after
//!    every step and `complete` once the feed stops growing.
//! 2. The [`coordinator::Coordinator`] extracts the visible items, drops
//!    the ones it already handled this session, and calls
//!    [`coordinator::handle_ingest`].
//! 3. The store inserts only unseen ids and recomputes the source
//!    summary (count, time range, sync status).
//! 4. Search ([`feed_index_core::search`]) ranks stored items by token
//!    frequency plus engagement and highlights the matched tokens.
//!
//! ## Quick Start
//!
//! ```bash
//! fidx init                                   # create database
//! fidx import-timeline page.json --handle alice
//! fidx search "rust async" --source alice --sort newest
//! fidx sources
//! fidx stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`acquisition`] | Paced scroll loop with stall detection and pause/resume/stop |
//! | [`coordinator`] | Control commands, extraction, per-session dedup, status broadcast |
//! | [`sqlite_store`] | SQLite implementation of the `Store` trait |
//! | [`ingest`] | File-based ingestion (`fidx ingest`, `fidx import-timeline`) |
//! | [`search`] | Search CLI wrapper: date filters and result formatting |
//! | [`sources`] | Source listing, sync-status updates, purge |
//! | [`stats`] | Database statistics |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//!
//! Storage-independent types and algorithms (items, summaries, the
//! `Store` trait, ranking, timeline decoding) live in `feed-index-core`.

pub mod acquisition;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod ingest;
pub mod migrate;
pub mod search;
pub mod sources;
pub mod sqlite_store;
pub mod stats;

pub use feed_index_core::models::{Item, SourceSummary, StorageStats, SyncStatus};
pub use feed_index_core::store;
pub use sqlite_store::SqliteStore;
