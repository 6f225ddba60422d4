//! Database statistics.
//!
//! `fidx stats` reports what is stored: item and source counts, the
//! database footprint, and a per-source breakdown with sync state.

use anyhow::Result;

use feed_index_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let stats = store.stats().await?;
    let summaries = store.list_summaries().await?;
    store.close().await;

    println!("Feed Index — Database Stats");
    println!("===========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(stats.estimated_bytes));
    println!();
    println!("  Items:       {}", stats.item_count);
    println!("  Sources:     {}", stats.source_count);

    if !summaries.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<24} {:>8} {:<10}   {}",
            "SOURCE", "ITEMS", "STATUS", "LAST SYNC"
        );
        println!("  {}", "-".repeat(60));

        for s in &summaries {
            println!(
                "  {:<24} {:>8} {:<10}   {}",
                s.handle,
                s.total_indexed,
                s.sync_status,
                format_ts_relative(s.last_sync_at / 1000)
            );
        }
    }

    println!();
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp (seconds) relative to now, e.g. "3 hours ago".
pub fn format_ts_relative(ts: i64) -> String {
    relative_to(chrono::Utc::now().timestamp(), ts)
}

fn relative_to(now: i64, ts: i64) -> String {
    let delta = now - ts;
    if delta < 0 {
        return format_ts_iso(ts);
    }

    let (n, unit) = match delta {
        d if d < 60 => return "just now".to_string(),
        d if d < 3600 => (d / 60, "min"),
        d if d < 86400 => (d / 3600, "hour"),
        d if d < 86400 * 30 => (d / 86400, "day"),
        _ => return format_ts_iso(ts),
    };
    format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" })
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = 1_700_000_000;
        assert_eq!(relative_to(now, now - 5), "just now");
        assert_eq!(relative_to(now, now - 60), "1 min ago");
        assert_eq!(relative_to(now, now - 7200), "2 hours ago");
        assert_eq!(relative_to(now, now - 86400 * 3), "3 days ago");
        assert_eq!(relative_to(now, now + 10), "2023-11-14 22:13");
    }
}
