//! Source listing and per-source maintenance.
//!
//! Backs `fidx sources`, `fidx status`, and `fidx purge`. A source exists
//! once at least one of its items has been ingested and its summary
//! recomputed.

use anyhow::{bail, Result};

use feed_index_core::models::SyncStatus;
use feed_index_core::search::{list_sources, profile_stats};
use feed_index_core::store::Store;

use crate::config::Config;
use crate::search::format_millis;
use crate::sqlite_store::SqliteStore;
use crate::stats::format_ts_relative;

/// List every source, most recently synced first.
pub async fn run_sources(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let summaries = list_sources(&store).await?;
    store.close().await;

    if summaries.is_empty() {
        println!("No sources indexed.");
        return Ok(());
    }

    println!(
        "{:<20} {:<24} {:>8} {:<10} {:<17} {:<17} LAST SYNC",
        "HANDLE", "NAME", "ITEMS", "STATUS", "OLDEST", "NEWEST"
    );
    for s in &summaries {
        println!(
            "{:<20} {:<24} {:>8} {:<10} {:<17} {:<17} {}",
            s.handle,
            truncate(&s.display_name, 24),
            s.total_indexed,
            s.sync_status,
            format_millis(s.oldest_timestamp),
            format_millis(s.newest_timestamp),
            format_ts_relative(s.last_sync_at / 1000),
        );
    }

    Ok(())
}

/// Print the item count and summary for one handle.
pub async fn run_profile(config: &Config, handle: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let stats = profile_stats(&store, handle).await?;
    store.close().await;

    println!("@{}", handle);
    println!("  items:   {}", stats.count);
    match stats.summary {
        Some(s) => {
            println!("  name:    {}", s.display_name);
            if !s.avatar_url.is_empty() {
                println!("  avatar:  {}", s.avatar_url);
            }
            println!("  status:  {}", s.sync_status);
            println!(
                "  range:   {} .. {}",
                format_millis(s.oldest_timestamp),
                format_millis(s.newest_timestamp)
            );
            println!("  synced:  {}", format_ts_relative(s.last_sync_at / 1000));
        }
        None => println!("  (no summary)"),
    }

    Ok(())
}

/// Set the sync status of an existing source.
pub async fn run_set_status(config: &Config, handle: &str, status: SyncStatus) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let exists = store.get_summary(handle).await?.is_some();
    if !exists {
        store.close().await;
        bail!("Unknown source: '{}'", handle);
    }
    store.set_sync_status(handle, status).await?;
    store.close().await;

    println!("@{} -> {}", handle, status);
    Ok(())
}

/// Delete every item and the summary of `handle`.
pub async fn run_purge(config: &Config, handle: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let removed = store.indexed_count(handle).await?;
    store.purge(handle).await?;
    store.close().await;

    println!("purged @{} ({} items)", handle, removed);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 24), "short");
        assert_eq!(truncate("ünïcødé name", 5), "ünïc…");
    }
}
