//! Wiring between acquisition, the store, and the control surface.
//!
//! The [`Coordinator`] owns one [`ScrollSession`] for one observed feed
//! context. It translates control [`Command`]s into session calls and
//! sync-status updates, turns every [`ScrollEvent::ItemsInView`] into an
//! extraction + ingestion pass, and publishes [`StatusSnapshot`]s on a
//! broadcast channel.
//!
//! | Command | Session | Sync status |
//! |---------|---------|-------------|
//! | `start` | `start` | `indexing` |
//! | `pause` | `pause` | `paused` |
//! | `resume` | `resume` | `indexing` |
//! | `stop` | `stop` | `idle` |
//! | (feed exhausted) | — | `complete` |
//!
//! Extraction of items from the rendered view is external and reaches
//! the coordinator through the [`ItemExtractor`] trait.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use feed_index_core::feed;
use feed_index_core::models::{Item, SyncStatus};
use feed_index_core::store::Store;

use crate::acquisition::{ScrollConfig, ScrollEvent, ScrollHost, ScrollSession, ScrollStatus};
use crate::config::Config;

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// A batch of captured items for one handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    pub handle: String,
    pub items: Vec<Item>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub new_count: usize,
    pub indexed_count: u64,
}

/// Control-surface commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    GetState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Ok {
        ok: bool,
    },
    State {
        handle: Option<String>,
        #[serde(rename = "indexedCount")]
        indexed_count: u64,
    },
}

impl CommandResponse {
    fn ok() -> Self {
        CommandResponse::Ok { ok: true }
    }
}

/// Periodic progress report for the control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub handle: Option<String>,
    pub indexed_count: u64,
    pub processed_count: usize,
}

/// Pulls structured items out of the rendered feed view.
pub trait ItemExtractor: Send + Sync + 'static {
    /// Items currently rendered, attributed to `handle`. Items the view
    /// cannot parse are simply left out.
    fn visible_items(&self, handle: &str) -> Vec<Item>;

    fn display_name(&self) -> Option<String> {
        None
    }

    fn avatar_url(&self) -> Option<String> {
        None
    }
}

/// Store a batch, refresh the handle's summary, and report counts.
pub async fn handle_ingest<S: Store + ?Sized>(
    store: &S,
    req: &IngestRequest,
) -> Result<IngestResponse> {
    let new_count = store.ingest(&req.items).await?;
    store
        .recompute_summary(
            &req.handle,
            req.display_name.as_deref(),
            req.avatar_url.as_deref(),
        )
        .await?;
    let indexed_count = store.indexed_count(&req.handle).await?;
    Ok(IngestResponse {
        new_count,
        indexed_count,
    })
}

#[derive(Default)]
struct Progress {
    handle: Option<String>,
    processed: HashSet<String>,
    indexed_count: u64,
}

/// Coordinates one acquisition session against a store.
pub struct Coordinator<S: Store + 'static> {
    store: Arc<S>,
    session: ScrollSession,
    host: Arc<dyn ScrollHost>,
    extractor: Arc<dyn ItemExtractor>,
    config: ScrollConfig,
    progress: Arc<Mutex<Progress>>,
    status_tx: broadcast::Sender<StatusSnapshot>,
}

impl<S: Store + 'static> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            session: self.session.clone(),
            host: self.host.clone(),
            extractor: self.extractor.clone(),
            config: self.config.clone(),
            progress: self.progress.clone(),
            status_tx: self.status_tx.clone(),
        }
    }
}

impl<S: Store + 'static> Coordinator<S> {
    pub fn new(
        store: Arc<S>,
        host: Arc<dyn ScrollHost>,
        extractor: Arc<dyn ItemExtractor>,
        config: ScrollConfig,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            store,
            session: ScrollSession::new(),
            host,
            extractor,
            config,
            progress: Arc::new(Mutex::new(Progress::default())),
            status_tx,
        }
    }

    /// Build a coordinator whose scroll timing comes from `[scroll]`.
    pub fn from_config(
        store: Arc<S>,
        host: Arc<dyn ScrollHost>,
        extractor: Arc<dyn ItemExtractor>,
        config: &Config,
    ) -> Self {
        Self::new(store, host, extractor, config.scroll.to_scroll_config())
    }

    /// Scroll timing handed to every session started by this coordinator.
    pub fn scroll_config(&self) -> &ScrollConfig {
        &self.config
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn session(&self) -> &ScrollSession {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let progress = self.progress();
        StatusSnapshot {
            handle: progress.handle.clone(),
            indexed_count: progress.indexed_count,
            processed_count: progress.processed.len(),
        }
    }

    fn broadcast(&self) {
        // No subscribers is fine.
        let _ = self.status_tx.send(self.snapshot());
    }

    pub fn current_handle(&self) -> Option<String> {
        self.progress().handle.clone()
    }

    /// Switch the observed source. Resets per-session progress when the
    /// handle actually changes.
    pub fn set_handle(&self, handle: Option<&str>) {
        {
            let mut progress = self.progress();
            if progress.handle.as_deref() == handle {
                return;
            }
            *progress = Progress {
                handle: handle.map(str::to_string),
                ..Progress::default()
            };
        }
        self.broadcast();
    }

    /// Execute a control command.
    pub async fn command(&self, command: Command) -> Result<CommandResponse> {
        let handle = self.current_handle();
        match command {
            Command::Start => {
                let Some(handle) = handle else {
                    debug!("start ignored: no source handle");
                    return Ok(CommandResponse::ok());
                };
                self.store
                    .set_sync_status(&handle, SyncStatus::Indexing)
                    .await?;
                let (tx, rx) = mpsc::unbounded_channel();
                if self
                    .session
                    .start(self.host.clone(), tx, Some(self.config.clone()))
                {
                    let this = self.clone();
                    tokio::spawn(async move { this.pump(rx).await });
                }
            }
            Command::Pause => {
                self.session.pause();
                if let Some(handle) = handle {
                    self.store.set_sync_status(&handle, SyncStatus::Paused).await?;
                }
            }
            Command::Resume => {
                self.session.resume();
                if let Some(handle) = handle {
                    self.store
                        .set_sync_status(&handle, SyncStatus::Indexing)
                        .await?;
                }
            }
            Command::Stop => {
                self.session.stop();
                if let Some(handle) = handle {
                    self.store.set_sync_status(&handle, SyncStatus::Idle).await?;
                }
            }
            Command::GetState => {
                let indexed_count = self.progress().indexed_count;
                return Ok(CommandResponse::State {
                    handle,
                    indexed_count,
                });
            }
        }
        Ok(CommandResponse::ok())
    }

    /// Deliver session events in order until the session lets go of its
    /// channel.
    async fn pump(&self, mut rx: mpsc::UnboundedReceiver<ScrollEvent>) {
        while let Some(event) = rx.recv().await {
            if let Err(e) = self.on_event(event).await {
                warn!(error = %e, "failed to process acquisition event");
            }
        }
        debug!("acquisition event stream closed");
    }

    async fn on_event(&self, event: ScrollEvent) -> Result<()> {
        match event {
            ScrollEvent::ItemsInView(_) => {
                self.scan_visible().await?;
            }
            ScrollEvent::Status(status) => {
                if status == ScrollStatus::Complete {
                    if let Some(handle) = self.current_handle() {
                        self.store
                            .set_sync_status(&handle, SyncStatus::Complete)
                            .await?;
                    }
                }
                self.broadcast();
            }
        }
        Ok(())
    }

    /// Extract visible items and store the ones not yet seen this session.
    ///
    /// Returns the number of items newly stored.
    pub async fn scan_visible(&self) -> Result<usize> {
        let Some(handle) = self.current_handle() else {
            return Ok(0);
        };
        let visible = self.extractor.visible_items(&handle);
        self.store_unseen(&handle, visible).await
    }

    /// Decode an intercepted timeline payload and store its unseen items.
    pub async fn ingest_timeline(&self, payload: &serde_json::Value) -> Result<usize> {
        let Some(handle) = self.current_handle() else {
            return Ok(0);
        };
        let decoded = feed::decode_timeline(payload, &handle);
        self.store_unseen(&handle, decoded).await
    }

    async fn store_unseen(&self, handle: &str, candidates: Vec<Item>) -> Result<usize> {
        let fresh: Vec<Item> = {
            let mut progress = self.progress();
            candidates
                .into_iter()
                .filter(|item| progress.processed.insert(item.id.clone()))
                .collect()
        };
        if fresh.is_empty() {
            return Ok(0);
        }

        let req = IngestRequest {
            handle: handle.to_string(),
            items: fresh,
            display_name: self.extractor.display_name(),
            avatar_url: self.extractor.avatar_url(),
        };
        let resp = match handle_ingest(self.store.as_ref(), &req).await {
            Ok(resp) => resp,
            Err(e) => {
                // Let the next scan pick these ids up again.
                let mut progress = self.progress();
                for item in &req.items {
                    progress.processed.remove(&item.id);
                }
                return Err(e);
            }
        };
        debug!(
            handle,
            new_count = resp.new_count,
            indexed_count = resp.indexed_count,
            "stored batch"
        );

        {
            let mut progress = self.progress();
            if progress.handle.as_deref() == Some(handle) {
                progress.indexed_count = resp.indexed_count;
            }
        }
        self.broadcast();
        Ok(resp.new_count)
    }
}
