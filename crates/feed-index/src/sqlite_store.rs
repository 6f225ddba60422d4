//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the `items` / `sources` schema
//! created by [`migrate`](crate::migrate). Every write runs inside one
//! `BEGIN IMMEDIATE` transaction, which takes the write lock up front: a
//! concurrent writer waits on the busy timeout instead of failing on a
//! read-to-write upgrade. Inserts use `ON CONFLICT(id) DO NOTHING`, so the
//! existing-id check and the insert are a single atomic step per row and a
//! concurrent ingest can never store an id twice.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use feed_index_core::models::{now_millis, Item, SourceSummary, StorageStats, SyncStatus};
use feed_index_core::store::{derive_summary, Rollup, Store};

use crate::config::Config;
use crate::{db, migrate};

const ITEM_COLUMNS: &str = "id, source_handle, text, timestamp, likes, reposts, replies, views, \
     has_media, media_urls_json, is_repost, is_quote, quoted_item_id";

const SUMMARY_COLUMNS: &str = "handle, display_name, avatar_url, total_indexed, oldest_timestamp, \
     newest_timestamp, last_sync_at, sync_status";

/// SQLite implementation of the [`Store`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }
}

fn row_to_item(row: &SqliteRow) -> Item {
    let media_json: String = row.get("media_urls_json");
    Item {
        id: row.get("id"),
        source_handle: row.get("source_handle"),
        text: row.get("text"),
        timestamp: row.get("timestamp"),
        likes: row.get::<i64, _>("likes").max(0) as u64,
        reposts: row.get::<i64, _>("reposts").max(0) as u64,
        replies: row.get::<i64, _>("replies").max(0) as u64,
        views: row.get::<i64, _>("views").max(0) as u64,
        has_media: row.get("has_media"),
        media_urls: serde_json::from_str(&media_json).unwrap_or_default(),
        is_repost: row.get("is_repost"),
        is_quote: row.get("is_quote"),
        quoted_item_id: row.get("quoted_item_id"),
    }
}

fn row_to_summary(row: &SqliteRow) -> Result<SourceSummary> {
    let status: String = row.get("sync_status");
    Ok(SourceSummary {
        handle: row.get("handle"),
        display_name: row.get("display_name"),
        avatar_url: row.get("avatar_url"),
        total_indexed: row.get::<i64, _>("total_indexed").max(0) as u64,
        oldest_timestamp: row.get("oldest_timestamp"),
        newest_timestamp: row.get("newest_timestamp"),
        last_sync_at: row.get("last_sync_at"),
        sync_status: status
            .parse::<SyncStatus>()
            .with_context(|| format!("Unknown sync_status value '{}' in sources table", status))?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn ingest(&self, items: &[Item]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut tx = self.begin_write().await?;
        let mut inserted = 0usize;

        for item in items {
            let media_json = serde_json::to_string(&item.media_urls)?;
            let result = sqlx::query(&format!(
                "INSERT INTO items ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(id) DO NOTHING",
                ITEM_COLUMNS
            ))
            .bind(&item.id)
            .bind(&item.source_handle)
            .bind(&item.text)
            .bind(item.timestamp)
            .bind(item.likes as i64)
            .bind(item.reposts as i64)
            .bind(item.replies as i64)
            .bind(item.views as i64)
            .bind(item.has_media)
            .bind(&media_json)
            .bind(item.is_repost)
            .bind(item.is_quote)
            .bind(&item.quoted_item_id)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn recompute_summary(
        &self,
        handle: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.begin_write().await?;

        let row = sqlx::query(
            "SELECT COUNT(*) AS n, MIN(timestamp) AS oldest, MAX(timestamp) AS newest \
             FROM items WHERE source_handle = ?",
        )
        .bind(handle)
        .fetch_one(&mut *tx)
        .await?;

        let count: i64 = row.get("n");
        if count == 0 {
            return Ok(());
        }
        let rollup = Rollup {
            count: count as u64,
            oldest: row.get("oldest"),
            newest: row.get("newest"),
        };

        let previous = sqlx::query(&format!(
            "SELECT {} FROM sources WHERE handle = ?",
            SUMMARY_COLUMNS
        ))
        .bind(handle)
        .fetch_optional(&mut *tx)
        .await?
        .map(|r| row_to_summary(&r))
        .transpose()?;

        let summary = derive_summary(
            handle,
            rollup,
            previous.as_ref(),
            display_name,
            avatar_url,
            now_millis(),
        );

        sqlx::query(
            r#"
            INSERT INTO sources (handle, display_name, avatar_url, total_indexed,
                                 oldest_timestamp, newest_timestamp, last_sync_at, sync_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(handle) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                total_indexed = excluded.total_indexed,
                oldest_timestamp = excluded.oldest_timestamp,
                newest_timestamp = excluded.newest_timestamp,
                last_sync_at = excluded.last_sync_at,
                sync_status = excluded.sync_status
            "#,
        )
        .bind(&summary.handle)
        .bind(&summary.display_name)
        .bind(&summary.avatar_url)
        .bind(summary.total_indexed as i64)
        .bind(summary.oldest_timestamp)
        .bind(summary.newest_timestamp)
        .bind(summary.last_sync_at)
        .bind(summary.sync_status.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_sync_status(&self, handle: &str, status: SyncStatus) -> Result<()> {
        sqlx::query("UPDATE sources SET sync_status = ? WHERE handle = ?")
            .bind(status.as_str())
            .bind(handle)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge(&self, handle: &str) -> Result<()> {
        let mut tx = self.begin_write().await?;

        sqlx::query("DELETE FROM items WHERE source_handle = ?")
            .bind(handle)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sources WHERE handle = ?")
            .bind(handle)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats> {
        let item_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        let source_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(&self.pool)
            .await?;

        // Best-effort: pragmas can be unavailable on exotic builds.
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);

        Ok(StorageStats {
            item_count: item_count as u64,
            source_count: source_count as u64,
            estimated_bytes: (page_count.max(0) * page_size.max(0)) as u64,
        })
    }

    async fn items(&self, handle: Option<&str>) -> Result<Vec<Item>> {
        let rows = match handle {
            Some(h) => {
                sqlx::query(&format!(
                    "SELECT {} FROM items WHERE source_handle = ? ORDER BY rowid",
                    ITEM_COLUMNS
                ))
                .bind(h)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM items ORDER BY rowid", ITEM_COLUMNS))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(row_to_item).collect())
    }

    async fn indexed_count(&self, handle: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE source_handle = ?")
            .bind(handle)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn get_summary(&self, handle: &str) -> Result<Option<SourceSummary>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sources WHERE handle = ?",
            SUMMARY_COLUMNS
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_summary(&r)).transpose()
    }

    async fn list_summaries(&self) -> Result<Vec<SourceSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sources ORDER BY last_sync_at DESC, handle ASC",
            SUMMARY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_summary).collect()
    }
}
