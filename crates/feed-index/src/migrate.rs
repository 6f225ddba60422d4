//! Schema migrations.
//!
//! Two tables, both created idempotently:
//!
//! | Table | Key | Secondary indexes |
//! |-------|-----|-------------------|
//! | `items` | `id` | `source_handle`, `timestamp`, `(source_handle, timestamp)` |
//! | `sources` | `handle` | `last_sync_at` |
//!
//! Items are read back in `rowid` order, which is their discovery order.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file (if needed) and apply the schema.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            source_handle TEXT NOT NULL,
            text TEXT NOT NULL DEFAULT '',
            timestamp INTEGER NOT NULL,
            likes INTEGER NOT NULL DEFAULT 0,
            reposts INTEGER NOT NULL DEFAULT 0,
            replies INTEGER NOT NULL DEFAULT 0,
            views INTEGER NOT NULL DEFAULT 0,
            has_media INTEGER NOT NULL DEFAULT 0,
            media_urls_json TEXT NOT NULL DEFAULT '[]',
            is_repost INTEGER NOT NULL DEFAULT 0,
            is_quote INTEGER NOT NULL DEFAULT 0,
            quoted_item_id TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            handle TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            avatar_url TEXT NOT NULL DEFAULT '',
            total_indexed INTEGER NOT NULL,
            oldest_timestamp INTEGER NOT NULL,
            newest_timestamp INTEGER NOT NULL,
            last_sync_at INTEGER NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'idle'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_source_handle ON items(source_handle)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_timestamp ON items(timestamp)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_items_source_timestamp ON items(source_handle, timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_last_sync_at ON sources(last_sync_at)")
        .execute(pool)
        .await?;

    Ok(())
}
