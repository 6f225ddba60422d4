//! Storage abstraction for Feed Index.
//!
//! The [`Store`] trait defines every storage operation needed by ingestion
//! and search, enabling pluggable backends (SQLite in the `feed-index`
//! crate, [`memory::InMemoryStore`] here).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//!
//! # Atomicity
//!
//! [`Store::ingest`] must treat "find the ids that already exist" and
//! "insert the rest" as one unit: two concurrent calls carrying the same
//! id may never both insert it. [`Store::purge`] must remove a handle's
//! items and summary together, so readers see either all of them or none.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Item, SourceSummary, StorageStats, SyncStatus};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ingest`](Store::ingest) | Insert items whose ids are not yet stored |
/// | [`recompute_summary`](Store::recompute_summary) | Rebuild a handle's rollup from its items |
/// | [`set_sync_status`](Store::set_sync_status) | Update only a summary's status |
/// | [`purge`](Store::purge) | Delete a handle's items and summary |
/// | [`stats`](Store::stats) | Item/source counts and size estimate |
/// | [`items`](Store::items) | Items in discovery order, optionally per handle |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert every item whose id is not already present.
    ///
    /// Returns the number of items actually inserted. Re-ingesting a batch
    /// is a no-op for ids already seen; duplicates inside one batch count
    /// once.
    async fn ingest(&self, items: &[Item]) -> Result<usize>;

    /// Rebuild the summary for `handle` from its full item set.
    ///
    /// Leaves everything untouched when the handle has no items. The
    /// existing sync status is preserved.
    async fn recompute_summary(
        &self,
        handle: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()>;

    /// Set the sync status of an existing summary. No-op if none exists.
    async fn set_sync_status(&self, handle: &str, status: SyncStatus) -> Result<()>;

    /// Delete all items for `handle` and its summary.
    async fn purge(&self, handle: &str) -> Result<()>;

    /// Store-wide counts and a best-effort size estimate.
    async fn stats(&self) -> Result<StorageStats>;

    /// All items (or those of one handle) in discovery order.
    async fn items(&self, handle: Option<&str>) -> Result<Vec<Item>>;

    /// Number of items stored for `handle`.
    async fn indexed_count(&self, handle: &str) -> Result<u64>;

    /// Whether an item with this id has been stored.
    async fn contains(&self, id: &str) -> Result<bool>;

    async fn get_summary(&self, handle: &str) -> Result<Option<SourceSummary>>;

    /// All summaries, most recently synced first.
    async fn list_summaries(&self) -> Result<Vec<SourceSummary>>;
}

/// Count and timestamp bounds of one handle's item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollup {
    pub count: u64,
    pub oldest: i64,
    pub newest: i64,
}

impl Rollup {
    /// Rollup of `items` ordered by timestamp ascending; `None` when empty.
    pub fn from_sorted(items_by_time: &[Item]) -> Option<Self> {
        let first = items_by_time.first()?;
        let last = items_by_time.last()?;
        Some(Self {
            count: items_by_time.len() as u64,
            oldest: first.timestamp,
            newest: last.timestamp,
        })
    }
}

/// Build the summary that [`Store::recompute_summary`] writes.
///
/// Display metadata falls back to the previous summary, then to the
/// handle itself (display name) or empty (avatar). The sync status is
/// carried over unchanged.
pub fn derive_summary(
    handle: &str,
    rollup: Rollup,
    previous: Option<&SourceSummary>,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
    now: i64,
) -> SourceSummary {
    SourceSummary {
        handle: handle.to_string(),
        display_name: display_name
            .map(str::to_string)
            .or_else(|| previous.map(|p| p.display_name.clone()))
            .unwrap_or_else(|| handle.to_string()),
        avatar_url: avatar_url
            .map(str::to_string)
            .or_else(|| previous.map(|p| p.avatar_url.clone()))
            .unwrap_or_default(),
        total_indexed: rollup.count,
        oldest_timestamp: rollup.oldest,
        newest_timestamp: rollup.newest,
        last_sync_at: now,
        sync_status: previous.map(|p| p.sync_status).unwrap_or_default(),
    }
}
