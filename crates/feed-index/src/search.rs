//! Search entry points for the CLI.
//!
//! The ranking algorithm lives in `feed_index_core::search` and runs
//! through the [`Store`](feed_index_core::store::Store) trait. This wrapper
//! handles date parsing, database connection, and output formatting.

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub use feed_index_core::search::{SearchQuery, SearchResult, SortMode};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Filters accepted by `fidx search`, before date parsing.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub source: Option<String>,
    /// `YYYY-MM-DD`, inclusive from the start of the day (UTC).
    pub from: Option<String>,
    /// `YYYY-MM-DD`, inclusive through the end of the day (UTC).
    pub to: Option<String>,
    pub media_only: bool,
    pub min_likes: Option<u64>,
    pub sort: SortMode,
    pub limit: Option<usize>,
}

/// Build a [`SearchQuery`] from CLI arguments.
pub fn build_query(config: &Config, text: &str, args: &SearchArgs) -> Result<SearchQuery> {
    Ok(SearchQuery {
        text: text.to_string(),
        source_handle: args.source.clone(),
        date_from: args.from.as_deref().map(day_start_millis).transpose()?,
        date_to: args.to.as_deref().map(day_end_millis).transpose()?,
        media_only: args.media_only,
        min_likes: args.min_likes,
        sort_by: args.sort,
        limit: Some(args.limit.unwrap_or(config.search.default_limit)),
    })
}

fn parse_day(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", day))
}

/// Epoch milliseconds at 00:00:00.000 UTC of `day`.
pub fn day_start_millis(day: &str) -> Result<i64> {
    let date = parse_day(day)?;
    let start = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("Invalid date '{}'", day))?;
    Ok(start.and_utc().timestamp_millis())
}

/// Epoch milliseconds at 23:59:59.999 UTC of `day`.
pub fn day_end_millis(day: &str) -> Result<i64> {
    let date = parse_day(day)?;
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .with_context(|| format!("Invalid date '{}'", day))?;
    Ok(end.and_utc().timestamp_millis())
}

/// Run a query against the configured database.
pub async fn search_items(config: &Config, query: &SearchQuery) -> Result<Vec<SearchResult>> {
    let store = SqliteStore::open(config).await?;
    let results = feed_index_core::search::search(&store, query).await;
    store.close().await;
    results
}

/// CLI entry point: runs the search and prints results to stdout.
pub async fn run_search(config: &Config, text: &str, args: SearchArgs) -> Result<()> {
    let query = build_query(config, text, &args)?;
    let results = search_items(config, &query).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let item = &result.item;
        println!(
            "{}. [{:.2}] @{} / {}",
            i + 1,
            result.score,
            item.source_handle,
            item.id
        );
        println!("    posted: {}", format_millis(item.timestamp));
        println!(
            "    likes: {}  reposts: {}  replies: {}  views: {}",
            item.likes, item.reposts, item.replies, item.views
        );
        if item.has_media {
            println!("    media: {}", item.media_urls.join(", "));
        }
        println!(
            "    text: \"{}\"",
            result.highlighted_text.replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

/// Format epoch milliseconds as `YYYY-MM-DD HH:MM` (UTC).
pub fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}
