use std::sync::{Arc, Mutex};
use std::time::Duration;

use feed_index::acquisition::{ScrollConfig, ScrollHost, ScrollPhase};
use feed_index::coordinator::{
    handle_ingest, Command, CommandResponse, Coordinator, IngestRequest, ItemExtractor,
};
use feed_index_core::store::memory::InMemoryStore;
use feed_index::store::Store;
use feed_index::config::Config;
use feed_index::{Item, SyncStatus};
use serde_json::json;

/// A feed that renders one item per 100 units scrolled, up to `limit`.
struct Feed {
    offset: Mutex<i64>,
    limit: i64,
    deltas: Mutex<Vec<i64>>,
}

impl Feed {
    fn new(limit: i64) -> Arc<Self> {
        Arc::new(Self {
            offset: Mutex::new(0),
            limit,
            deltas: Mutex::new(Vec::new()),
        })
    }

    fn rendered(&self) -> usize {
        (*self.offset.lock().unwrap() / 100) as usize
    }
}

impl ScrollHost for Feed {
    fn scroll_offset(&self) -> i64 {
        *self.offset.lock().unwrap()
    }

    fn scroll_by(&self, delta: i64) {
        self.deltas.lock().unwrap().push(delta);
        let mut offset = self.offset.lock().unwrap();
        *offset = (*offset + delta).clamp(0, self.limit);
    }

    fn visible_item_count(&self) -> usize {
        self.rendered()
    }

    fn end_reached(&self) -> bool {
        *self.offset.lock().unwrap() >= self.limit
    }
}

struct FeedItems {
    feed: Arc<Feed>,
}

impl ItemExtractor for FeedItems {
    fn visible_items(&self, handle: &str) -> Vec<Item> {
        (0..self.feed.rendered())
            .map(|i| {
                Item::new(
                    &format!("{}-{}", handle, i),
                    handle,
                    &format!("post number {}", i),
                    1_000 + i as i64,
                )
            })
            .collect()
    }

    fn display_name(&self) -> Option<String> {
        Some("Alice Example".to_string())
    }
}

fn setup(limit: i64) -> (Arc<InMemoryStore>, Coordinator<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let feed = Feed::new(limit);
    let extractor = Arc::new(FeedItems { feed: feed.clone() });
    let config = ScrollConfig {
        min_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(100),
        scroll_distance: 800,
    };
    let coordinator = Coordinator::new(store.clone(), feed, extractor, config);
    (store, coordinator)
}

async fn status_of(store: &InMemoryStore, handle: &str) -> Option<SyncStatus> {
    store
        .get_summary(handle)
        .await
        .unwrap()
        .map(|s| s.sync_status)
}

#[tokio::test]
async fn handle_ingest_reports_new_and_total_counts() {
    let store = InMemoryStore::new();
    let req = IngestRequest {
        handle: "alice".to_string(),
        items: vec![
            Item::new("1", "alice", "a", 1),
            Item::new("2", "alice", "b", 2),
        ],
        display_name: Some("Alice".to_string()),
        avatar_url: None,
    };

    let resp = handle_ingest(&store, &req).await.unwrap();
    assert_eq!((resp.new_count, resp.indexed_count), (2, 2));
    let resp = handle_ingest(&store, &req).await.unwrap();
    assert_eq!((resp.new_count, resp.indexed_count), (0, 2));

    let summary = store.get_summary("alice").await.unwrap().unwrap();
    assert_eq!(summary.display_name, "Alice");
}

#[tokio::test]
async fn start_without_handle_is_ignored() {
    let (_store, coord) = setup(10_000);
    let resp = coord.command(Command::Start).await.unwrap();
    assert_eq!(resp, CommandResponse::Ok { ok: true });
    assert!(!coord.session().is_running());

    let state = coord.command(Command::GetState).await.unwrap();
    assert_eq!(
        state,
        CommandResponse::State {
            handle: None,
            indexed_count: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn commands_drive_session_and_sync_status() {
    let (store, coord) = setup(1_000_000);
    store.ingest(&[Item::new("seed", "alice", "seed", 1)]).await.unwrap();
    store.recompute_summary("alice", None, None).await.unwrap();
    coord.set_handle(Some("alice"));

    coord.command(Command::Start).await.unwrap();
    assert!(coord.session().is_running());
    assert_eq!(status_of(&store, "alice").await, Some(SyncStatus::Indexing));

    coord.command(Command::Pause).await.unwrap();
    assert_eq!(status_of(&store, "alice").await, Some(SyncStatus::Paused));

    coord.command(Command::Resume).await.unwrap();
    assert_eq!(status_of(&store, "alice").await, Some(SyncStatus::Indexing));
    assert!(coord.session().is_scrolling());

    coord.command(Command::Stop).await.unwrap();
    assert_eq!(status_of(&store, "alice").await, Some(SyncStatus::Idle));
    assert_eq!(coord.session().phase(), ScrollPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn run_to_completion_stores_every_item_once() {
    let (store, coord) = setup(4_000);
    coord.set_handle(Some("alice"));
    let mut updates = coord.subscribe();

    coord.command(Command::Start).await.unwrap();

    for _ in 0..1_000 {
        if status_of(&store, "alice").await == Some(SyncStatus::Complete) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    assert_eq!(status_of(&store, "alice").await, Some(SyncStatus::Complete));
    assert_eq!(coord.session().phase(), ScrollPhase::Complete);

    // 4000 units at one item per 100.
    assert_eq!(store.indexed_count("alice").await.unwrap(), 40);
    let summary = store.get_summary("alice").await.unwrap().unwrap();
    assert_eq!(summary.display_name, "Alice Example");
    assert_eq!(summary.oldest_timestamp, 1_000);
    assert_eq!(summary.newest_timestamp, 1_039);

    let snapshot = coord.snapshot();
    assert_eq!(snapshot.indexed_count, 40);
    assert_eq!(snapshot.processed_count, 40);

    let mut last = None;
    while let Ok(update) = updates.try_recv() {
        last = Some(update);
    }
    assert_eq!(last.map(|s| s.indexed_count), Some(40));

    let state = coord.command(Command::GetState).await.unwrap();
    assert_eq!(
        serde_json::to_value(state).unwrap(),
        json!({ "handle": "alice", "indexedCount": 40 })
    );
}

#[tokio::test(start_paused = true)]
async fn from_config_uses_scroll_settings() {
    let mut config = Config::with_db_path("unused.sqlite");
    config.scroll.min_delay_ms = 50;
    config.scroll.max_delay_ms = 50;
    config.scroll.scroll_distance = 500;

    let store = Arc::new(InMemoryStore::new());
    let feed = Feed::new(2_000);
    let extractor = Arc::new(FeedItems { feed: feed.clone() });
    let coord = Coordinator::from_config(store.clone(), feed.clone(), extractor, &config);
    assert_eq!(
        coord.scroll_config(),
        &ScrollConfig {
            min_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(50),
            scroll_distance: 500,
        }
    );

    coord.set_handle(Some("alice"));
    coord.command(Command::Start).await.unwrap();
    for _ in 0..1_000 {
        if status_of(&store, "alice").await == Some(SyncStatus::Complete) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(status_of(&store, "alice").await, Some(SyncStatus::Complete));
    assert_eq!(store.indexed_count("alice").await.unwrap(), 20);

    // Four full steps reach the end; later deltas are stall nudges.
    let deltas = feed.deltas.lock().unwrap().clone();
    assert_eq!(deltas[..4], [500, 500, 500, 500]);
    assert!(!deltas[4..].contains(&800), "{:?}", deltas);
}

#[tokio::test]
async fn scan_skips_items_already_processed() {
    let store = Arc::new(InMemoryStore::new());
    let feed = Feed::new(10_000);
    feed.scroll_by(500);
    let extractor = Arc::new(FeedItems { feed: feed.clone() });
    let coord = Coordinator::new(store.clone(), feed.clone(), extractor, ScrollConfig::default());

    assert_eq!(coord.scan_visible().await.unwrap(), 0);

    coord.set_handle(Some("alice"));
    assert_eq!(coord.scan_visible().await.unwrap(), 5);
    assert_eq!(coord.scan_visible().await.unwrap(), 0);

    feed.scroll_by(300);
    assert_eq!(coord.scan_visible().await.unwrap(), 3);
    assert_eq!(coord.snapshot().processed_count, 8);

    // A new handle starts a fresh session.
    coord.set_handle(Some("bob"));
    assert_eq!(coord.snapshot().processed_count, 0);
    assert_eq!(coord.scan_visible().await.unwrap(), 8);
    assert_eq!(store.indexed_count("bob").await.unwrap(), 8);
}

#[tokio::test]
async fn intercepted_timeline_is_decoded_and_stored() {
    let (store, coord) = setup(10_000);
    coord.set_handle(Some("alice"));

    let payload = json!({
        "data": { "user": { "result": { "timeline_v2": { "timeline": {
            "instructions": [{ "entries": [
                { "content": { "itemContent": { "tweet_results": { "result": {
                    "rest_id": "900", "legacy": { "full_text": "from the wire", "favorite_count": 7 }
                } } } } },
                { "content": { "itemContent": { "tweet_results": { "result": {
                    "tweet": { "rest_id": "901", "legacy": { "full_text": "wrapped one" } }
                } } } } }
            ] }]
        } } } } }
    });

    assert_eq!(coord.ingest_timeline(&payload).await.unwrap(), 2);
    assert_eq!(coord.ingest_timeline(&payload).await.unwrap(), 0);

    let items = store.items(Some("alice")).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].likes, 7);
    assert_eq!(items[1].text, "wrapped one");

    assert_eq!(
        coord
            .ingest_timeline(&json!({ "errors": ["rate limited"] }))
            .await
            .unwrap(),
        0
    );
}
