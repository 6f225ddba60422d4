//! Batch ingestion from files.
//!
//! Two file formats feed the store from the command line:
//!
//! - an [`IngestRequest`] JSON document (`fidx ingest`), the same shape the
//!   extraction side sends over the ingestion boundary;
//! - a raw structured timeline payload (`fidx import-timeline`), decoded
//!   with [`feed_index_core::feed::decode_timeline`].

use anyhow::{Context, Result};
use std::path::Path;

use feed_index_core::feed;

use crate::config::Config;
use crate::coordinator::{handle_ingest, IngestRequest, IngestResponse};
use crate::sqlite_store::SqliteStore;

/// Ingest an [`IngestRequest`] read from `path`.
pub async fn ingest_file(config: &Config, path: &Path) -> Result<IngestResponse> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ingest file: {}", path.display()))?;
    let req: IngestRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid ingest payload: {}", path.display()))?;

    let store = SqliteStore::open(config).await?;
    let resp = handle_ingest(&store, &req).await;
    store.close().await;
    resp
}

/// Decode a timeline payload from `path` and ingest it under `handle`.
///
/// Returns the number of decoded items alongside the store response.
pub async fn import_timeline(
    config: &Config,
    path: &Path,
    handle: &str,
    display_name: Option<String>,
) -> Result<(usize, IngestResponse)> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read timeline file: {}", path.display()))?;
    let items = feed::decode_timeline_str(&raw, handle);
    let decoded = items.len();

    let req = IngestRequest {
        handle: handle.to_string(),
        items,
        display_name,
        avatar_url: None,
    };

    let store = SqliteStore::open(config).await?;
    let resp = handle_ingest(&store, &req).await;
    store.close().await;
    Ok((decoded, resp?))
}

/// CLI entry point for `fidx ingest`.
pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let resp = ingest_file(config, path).await?;
    println!("ingest {}", path.display());
    println!("  new items: {}", resp.new_count);
    println!("  indexed for source: {}", resp.indexed_count);
    println!("ok");
    Ok(())
}

/// CLI entry point for `fidx import-timeline`.
pub async fn run_import_timeline(
    config: &Config,
    path: &Path,
    handle: &str,
    display_name: Option<String>,
) -> Result<()> {
    let (decoded, resp) = import_timeline(config, path, handle, display_name).await?;
    println!("import-timeline {}", path.display());
    println!("  decoded items: {}", decoded);
    println!("  new items: {}", resp.new_count);
    println!("  indexed for source: {}", resp.indexed_count);
    println!("ok");
    Ok(())
}
