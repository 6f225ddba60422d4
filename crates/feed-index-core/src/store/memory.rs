//! In-memory [`Store`] implementation for testing and embedding.
//!
//! All state lives behind a single `std::sync::RwLock`, so every write
//! operation (ingest, purge, recompute) is atomic with respect to readers
//! and to other writers.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{now_millis, Item, SourceSummary, StorageStats, SyncStatus};

use super::{derive_summary, Rollup, Store};

#[derive(Default)]
struct Tables {
    /// Insertion order doubles as discovery order.
    items: Vec<Item>,
    ids: HashSet<String>,
    summaries: HashMap<String, SourceSummary>,
}

/// In-memory store for tests and embedders.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ingest(&self, items: &[Item]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut tables = self.tables.write().map_err(poisoned)?;
        let mut inserted = 0;
        for item in items {
            if tables.ids.insert(item.id.clone()) {
                tables.items.push(item.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn recompute_summary(
        &self,
        handle: &str,
        display_name: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let mut owned: Vec<Item> = tables
            .items
            .iter()
            .filter(|i| i.source_handle == handle)
            .cloned()
            .collect();
        owned.sort_by_key(|i| i.timestamp);

        let Some(rollup) = Rollup::from_sorted(&owned) else {
            return Ok(());
        };
        let summary = derive_summary(
            handle,
            rollup,
            tables.summaries.get(handle),
            display_name,
            avatar_url,
            now_millis(),
        );
        tables.summaries.insert(handle.to_string(), summary);
        Ok(())
    }

    async fn set_sync_status(&self, handle: &str, status: SyncStatus) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        if let Some(summary) = tables.summaries.get_mut(handle) {
            summary.sync_status = status;
        }
        Ok(())
    }

    async fn purge(&self, handle: &str) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Tables {
            items,
            ids,
            summaries,
        } = &mut *tables;
        items.retain(|i| {
            if i.source_handle == handle {
                ids.remove(&i.id);
                false
            } else {
                true
            }
        });
        summaries.remove(handle);
        Ok(())
    }

    async fn stats(&self) -> Result<StorageStats> {
        let tables = self.tables.read().map_err(poisoned)?;
        let estimated_bytes: usize = tables
            .items
            .iter()
            .map(|i| {
                i.id.len()
                    + i.source_handle.len()
                    + i.text.len()
                    + i.media_urls.iter().map(String::len).sum::<usize>()
            })
            .sum();
        Ok(StorageStats {
            item_count: tables.items.len() as u64,
            source_count: tables.summaries.len() as u64,
            estimated_bytes: estimated_bytes as u64,
        })
    }

    async fn items(&self, handle: Option<&str>) -> Result<Vec<Item>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .items
            .iter()
            .filter(|i| handle.map_or(true, |h| i.source_handle == h))
            .cloned()
            .collect())
    }

    async fn indexed_count(&self, handle: &str) -> Result<u64> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .items
            .iter()
            .filter(|i| i.source_handle == handle)
            .count() as u64)
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.ids.contains(id))
    }

    async fn get_summary(&self, handle: &str) -> Result<Option<SourceSummary>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.summaries.get(handle).cloned())
    }

    async fn list_summaries(&self) -> Result<Vec<SourceSummary>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let mut all: Vec<SourceSummary> = tables.summaries.values().cloned().collect();
        all.sort_by(|a, b| {
            b.last_sync_at
                .cmp(&a.last_sync_at)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        Ok(all)
    }
}
