//! Core data models shared by the store, the search engine, and the
//! acquisition pipeline.
//!
//! Items and summaries serialize with camelCase field names so that
//! ingestion payloads keep the shape produced by external extractors.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// A single captured content unit from a feed.
///
/// `id` is source-assigned and globally unique across all handles. Once
/// stored, an item is never updated; re-ingesting the same id is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub source_handle: String,
    #[serde(default)]
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub reposts: u64,
    #[serde(default)]
    pub replies: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub has_media: bool,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub is_repost: bool,
    #[serde(default)]
    pub is_quote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_item_id: Option<String>,
}

impl Item {
    /// Minimal item with zeroed engagement, handy for tests and fixtures.
    pub fn new(id: &str, source_handle: &str, text: &str, timestamp: i64) -> Self {
        Self {
            id: id.to_string(),
            source_handle: source_handle.to_string(),
            text: text.to_string(),
            timestamp,
            likes: 0,
            reposts: 0,
            replies: 0,
            views: 0,
            has_media: false,
            media_urls: Vec::new(),
            is_repost: false,
            is_quote: false,
            quoted_item_id: None,
        }
    }
}

/// Indexing state of a source, as shown to the control surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Indexing,
    Paused,
    Complete,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Indexing => "indexing",
            SyncStatus::Paused => "paused",
            SyncStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "idle" => Ok(SyncStatus::Idle),
            "indexing" => Ok(SyncStatus::Indexing),
            "paused" => Ok(SyncStatus::Paused),
            "complete" => Ok(SyncStatus::Complete),
            other => bail!(
                "Unknown sync status: '{}'. Use idle, indexing, paused, or complete.",
                other
            ),
        }
    }
}

/// Derived rollup statistics for one source handle.
///
/// `total_indexed`, `oldest_timestamp` and `newest_timestamp` are a
/// materialized view over the handle's items and are only ever written by
/// [`Store::recompute_summary`](crate::store::Store::recompute_summary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub handle: String,
    pub display_name: String,
    pub avatar_url: String,
    pub total_indexed: u64,
    pub oldest_timestamp: i64,
    pub newest_timestamp: i64,
    /// Epoch milliseconds of the last recompute.
    pub last_sync_at: i64,
    pub sync_status: SyncStatus,
}

/// Store-wide counters returned by [`Store::stats`](crate::store::Store::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub item_count: u64,
    pub source_count: u64,
    /// Best-effort size estimate; zero when the backend cannot tell.
    pub estimated_bytes: u64,
}

/// Per-handle projection returned by [`profile_stats`](crate::search::profile_stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub count: u64,
    pub summary: Option<SourceSummary>,
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_round_trips_through_strings() {
        for status in [
            SyncStatus::Idle,
            SyncStatus::Indexing,
            SyncStatus::Paused,
            SyncStatus::Complete,
        ] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("running".parse::<SyncStatus>().is_err());
    }

    #[test]
    fn item_deserializes_with_defaults() {
        let item: Item = serde_json::from_str(
            r#"{"id":"42","sourceHandle":"alice","text":"hi","timestamp":1000}"#,
        )
        .unwrap();
        assert_eq!(item.likes, 0);
        assert!(item.media_urls.is_empty());
        assert!(item.quoted_item_id.is_none());
    }
}
