use std::sync::Arc;

use feed_index_core::search::{profile_stats, search, SearchQuery, SortMode};
use feed_index::coordinator::{handle_ingest, IngestRequest};
use feed_index::store::Store;
use feed_index::{db, migrate, Item, SqliteStore, SyncStatus};
use tempfile::TempDir;

async fn open_store() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("data/feed.sqlite"))
        .await
        .unwrap();
    migrate::apply(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

fn item(id: &str, handle: &str, text: &str, ts: i64) -> Item {
    Item::new(id, handle, text, ts)
}

fn batch() -> Vec<Item> {
    let mut media = item("3", "alice", "photo dump", 3_000);
    media.has_media = true;
    media.media_urls = vec!["https://img/a.jpg".to_string(), "https://img/b.jpg".to_string()];
    media.likes = 42;
    media.views = 1_000;
    media.is_quote = true;
    media.quoted_item_id = Some("99".to_string());
    vec![
        item("1", "alice", "first post", 2_000),
        item("2", "alice", "second post", 1_000),
        media,
        item("4", "bob", "hello from bob", 5_000),
    ]
}

#[tokio::test]
async fn ingest_round_trips_every_field() {
    let (_tmp, store) = open_store().await;
    let original = batch();
    assert_eq!(store.ingest(&original).await.unwrap(), 4);

    let stored = store.items(None).await.unwrap();
    assert_eq!(stored, original);
}

#[tokio::test]
async fn ingest_is_idempotent() {
    let (_tmp, store) = open_store().await;
    store.ingest(&batch()).await.unwrap();
    let before = store.items(None).await.unwrap();

    assert_eq!(store.ingest(&batch()).await.unwrap(), 0);
    assert_eq!(store.ingest(&batch()[1..3]).await.unwrap(), 0);
    assert_eq!(store.ingest(&[]).await.unwrap(), 0);
    assert_eq!(store.items(None).await.unwrap(), before);
}

#[tokio::test]
async fn existing_records_are_never_updated() {
    let (_tmp, store) = open_store().await;
    store.ingest(&batch()).await.unwrap();

    let mut edited = item("1", "alice", "edited", 9_000);
    edited.likes = 1_000;
    assert_eq!(
        store
            .ingest(&[edited, item("5", "alice", "new", 4_000)])
            .await
            .unwrap(),
        1
    );

    let alice = store.items(Some("alice")).await.unwrap();
    assert_eq!(alice[0].text, "first post");
    assert_eq!(alice[0].likes, 0);
    // Discovery order: later ingests come last.
    assert_eq!(alice.last().unwrap().id, "5");
}

#[tokio::test]
async fn concurrent_ingests_never_duplicate() {
    let (_tmp, store) = open_store().await;
    let store = Arc::new(store);
    let items: Vec<Item> = (0..50)
        .map(|i| item(&format!("id-{}", i), "alice", "x", i))
        .collect();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let items = items.clone();
        handles.push(tokio::spawn(async move { store.ingest(&items).await }));
    }

    let mut total = 0;
    for h in handles {
        total += h.await.unwrap().unwrap();
    }
    assert_eq!(total, 50);
    assert_eq!(store.indexed_count("alice").await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingest_batches_keep_summary_consistent() {
    let (_tmp, store) = open_store().await;
    let store = Arc::new(store);

    for round in 0..10 {
        let mut handles = Vec::new();
        for task in 0..8 {
            let store = store.clone();
            let req = IngestRequest {
                handle: "alice".to_string(),
                items: (0..20)
                    .map(|i| {
                        let id = format!("{}-{}-{}", round, task, i);
                        item(&id, "alice", "batch", (round * 1_000 + task * 20 + i) as i64)
                    })
                    .collect(),
                display_name: Some("Alice".to_string()),
                avatar_url: None,
            };
            handles.push(tokio::spawn(async move {
                handle_ingest(store.as_ref(), &req).await
            }));
        }

        for h in handles {
            let resp = h.await.unwrap().expect("concurrent batch failed");
            assert_eq!(resp.new_count, 20);
        }
    }

    let indexed = store.indexed_count("alice").await.unwrap();
    assert_eq!(indexed, 1_600);
    let summary = store.get_summary("alice").await.unwrap().unwrap();
    assert_eq!(summary.total_indexed, indexed);
    assert_eq!(summary.oldest_timestamp, 0);
    assert_eq!(summary.newest_timestamp, 9_159);
}

#[tokio::test]
async fn contains_reports_stored_ids() {
    let (_tmp, store) = open_store().await;
    assert!(!store.contains("1").await.unwrap());

    store.ingest(&batch()).await.unwrap();
    assert!(store.contains("1").await.unwrap());
    assert!(store.contains("4").await.unwrap());
    assert!(!store.contains("missing").await.unwrap());

    store.purge("alice").await.unwrap();
    assert!(!store.contains("1").await.unwrap());
    assert!(store.contains("4").await.unwrap());
}

#[tokio::test]
async fn summary_tracks_items_and_keeps_status() {
    let (_tmp, store) = open_store().await;
    store.recompute_summary("alice", Some("Alice"), None).await.unwrap();
    assert!(store.get_summary("alice").await.unwrap().is_none());

    store.ingest(&batch()).await.unwrap();
    store
        .recompute_summary("alice", Some("Alice"), Some("https://img/alice.png"))
        .await
        .unwrap();

    let summary = store.get_summary("alice").await.unwrap().unwrap();
    assert_eq!(summary.total_indexed, 3);
    assert_eq!(summary.oldest_timestamp, 1_000);
    assert_eq!(summary.newest_timestamp, 3_000);
    assert_eq!(summary.display_name, "Alice");
    assert_eq!(summary.sync_status, SyncStatus::Idle);
    assert!(summary.last_sync_at > 0);

    store
        .set_sync_status("alice", SyncStatus::Paused)
        .await
        .unwrap();
    store.ingest(&[item("9", "alice", "late", 500)]).await.unwrap();
    store.recompute_summary("alice", None, None).await.unwrap();

    let summary = store.get_summary("alice").await.unwrap().unwrap();
    assert_eq!(summary.total_indexed, 4);
    assert_eq!(summary.oldest_timestamp, 500);
    assert_eq!(summary.display_name, "Alice");
    assert_eq!(summary.avatar_url, "https://img/alice.png");
    assert_eq!(summary.sync_status, SyncStatus::Paused);
}

#[tokio::test]
async fn set_sync_status_without_summary_is_a_no_op() {
    let (_tmp, store) = open_store().await;
    store
        .set_sync_status("nobody", SyncStatus::Complete)
        .await
        .unwrap();
    assert!(store.list_summaries().await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_removes_one_source() {
    let (_tmp, store) = open_store().await;
    store.ingest(&batch()).await.unwrap();
    store.recompute_summary("alice", None, None).await.unwrap();
    store.recompute_summary("bob", None, None).await.unwrap();

    store.purge("alice").await.unwrap();

    assert_eq!(store.indexed_count("alice").await.unwrap(), 0);
    assert!(store.get_summary("alice").await.unwrap().is_none());
    assert!(!store.contains("1").await.unwrap());
    assert!(store.contains("4").await.unwrap());

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.item_count, 1);
    assert_eq!(stats.source_count, 1);
    assert!(stats.estimated_bytes > 0);

    // Purged ids can be captured again.
    assert_eq!(store.ingest(&batch()).await.unwrap(), 3);
}

#[tokio::test]
async fn search_runs_over_sqlite() {
    let (_tmp, store) = open_store().await;
    store.ingest(&batch()).await.unwrap();

    let results = search(&store, &SearchQuery::new("post")).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.item.id.as_str()).collect();
    // Equal scores keep discovery order.
    assert_eq!(ids, vec!["1", "2"]);

    let mut query = SearchQuery::new("post");
    query.sort_by = SortMode::Oldest;
    let results = search(&store, &query).await.unwrap();
    assert_eq!(results[0].item.id, "2");

    let mut query = SearchQuery::new("PHOTO");
    query.media_only = true;
    let results = search(&store, &query).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].highlighted_text, "<mark>photo</mark> dump");

    let stats = profile_stats(&store, "bob").await.unwrap();
    assert_eq!(stats.count, 1);
    assert!(stats.summary.is_none());
}

#[tokio::test]
async fn data_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("feed.sqlite");

    {
        let pool = db::connect_path(&path).await.unwrap();
        migrate::apply(&pool).await.unwrap();
        let store = SqliteStore::new(pool);
        store.ingest(&batch()).await.unwrap();
        store.recompute_summary("bob", None, None).await.unwrap();
        store.close().await;
    }

    let pool = db::connect_path(&path).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    let store = SqliteStore::new(pool);
    assert_eq!(store.items(None).await.unwrap().len(), 4);
    let sources = store.list_summaries().await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].handle, "bob");
}
