//! Scroll-driven acquisition of items from a virtualized feed.
//!
//! A [`ScrollSession`] advances a [`ScrollHost`] (the rendered feed view)
//! step by step, tells its listener how many items are visible after every
//! step, and decides when the feed is exhausted.
//!
//! # State machine
//!
//! ```text
//!            start                  no progress          stall limit
//!   Idle ───────────▶ Scrolling ───────────────▶ Stalled ───────────▶ Complete
//!                      │   ▲   ◀─────────────────┘
//!               pause  │   │ resume     recovered
//!                      ▼   │
//!                      Paused
//!
//!   any running state ── stop ──▶ Stopped
//! ```
//!
//! `Complete` and `Stopped` are terminal until the next `start`.
//!
//! # Stall policy
//!
//! A step that leaves the scroll offset unchanged is a stall. The feed is
//! declared complete after 3 consecutive stalls when the host shows its
//! end-of-feed marker, or after 8 regardless. Otherwise the loop nudges
//! back 200 and forward 400 and backs off for `2000 + stalls * 1500` ms.
//!
//! # Concurrency
//!
//! Each session owns its state; several sessions can run side by side.
//! One tokio task drives a session. `stop` cancels that task's
//! [`CancellationToken`], which interrupts any pending wait; scroll
//! actions are performed under the session lock after a cancellation
//! check, so no scroll happens once `stop` has returned. Step reports are
//! sent the same way and never follow the `Stopped` status.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consecutive stalls tolerated when the host shows its end marker.
pub const END_MARKER_STALL_LIMIT: u32 = 3;
/// Consecutive stalls after which the feed is complete regardless.
pub const MAX_STALLS: u32 = 8;

const PAUSE_POLL: Duration = Duration::from_millis(500);
const NUDGE_BACK: i64 = -200;
const NUDGE_FORWARD: i64 = 400;
const NUDGE_SETTLE: Duration = Duration::from_millis(1000);
const BACKOFF_BASE_MS: u64 = 2000;
const BACKOFF_STEP_MS: u64 = 1500;

/// The rendered feed being scrolled.
///
/// Implementations report "nothing there" as zero or `false` rather than
/// failing; a missing element is simply no data for this step.
pub trait ScrollHost: Send + Sync + 'static {
    /// Current vertical scroll offset.
    fn scroll_offset(&self) -> i64;
    /// Scroll by `delta` units (negative scrolls back).
    fn scroll_by(&self, delta: i64);
    /// Number of candidate items currently rendered.
    fn visible_item_count(&self) -> usize;
    /// Whether the view shows an end-of-feed (or retry) marker.
    fn end_reached(&self) -> bool;
}

/// Timing of the acquisition loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub scroll_distance: i64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(1500),
            max_delay: Duration::from_millis(3000),
            scroll_distance: 800,
        }
    }
}

/// Status values reported to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollStatus {
    Scrolling,
    Paused,
    Stopped,
    Complete,
}

/// Internal state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollPhase {
    #[default]
    Idle,
    Scrolling,
    Paused,
    Stalled,
    Complete,
    Stopped,
}

/// Events delivered to the session listener, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEvent {
    /// A step finished; this many candidate items are visible.
    ItemsInView(usize),
    Status(ScrollStatus),
}

#[derive(Debug, thiserror::Error)]
enum LoopError {
    #[error("wait cancelled")]
    Cancelled,
    #[error("event listener disconnected")]
    Disconnected,
}

#[derive(Default)]
struct SessionState {
    running: bool,
    paused: bool,
    phase: ScrollPhase,
    /// Bumped on every start so a superseded loop can tell it is stale.
    epoch: u64,
    cancel: Option<CancellationToken>,
    events: Option<UnboundedSender<ScrollEvent>>,
}

/// Handle to one acquisition session. Clones share the same session.
#[derive(Clone, Default)]
pub struct ScrollSession {
    state: Arc<Mutex<SessionState>>,
}

impl ScrollSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // The state is plain data; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start scrolling `host`, reporting to `events`.
    ///
    /// Returns `false` without doing anything if the session is already
    /// running. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        host: Arc<dyn ScrollHost>,
        events: UnboundedSender<ScrollEvent>,
        config: Option<ScrollConfig>,
    ) -> bool {
        let ctx = {
            let mut state = self.lock();
            if state.running {
                return false;
            }
            let token = CancellationToken::new();
            state.epoch += 1;
            state.running = true;
            state.paused = false;
            state.phase = ScrollPhase::Scrolling;
            state.cancel = Some(token.clone());
            state.events = Some(events.clone());

            LoopContext {
                session: self.clone(),
                host,
                events,
                config: config.unwrap_or_default(),
                token,
                epoch: state.epoch,
            }
        };

        info!(epoch = ctx.epoch, "acquisition started");
        tokio::spawn(async move {
            let session = ctx.session.clone();
            let epoch = ctx.epoch;
            match ctx.run().await {
                Ok(()) => {}
                Err(LoopError::Cancelled) => debug!(epoch, "acquisition loop cancelled"),
                Err(err) => {
                    warn!(epoch, error = %err, "acquisition loop ended early");
                    session.finish(epoch, ScrollPhase::Stopped);
                }
            }
        });
        true
    }

    /// Pause at the next iteration boundary. An in-flight wait completes.
    pub fn pause(&self) {
        let mut state = self.lock();
        if state.running {
            state.paused = true;
        }
    }

    /// Resume a paused session; no-op unless running.
    pub fn resume(&self) {
        let mut state = self.lock();
        if !state.running {
            return;
        }
        state.paused = false;
        state.phase = ScrollPhase::Scrolling;
        if let Some(events) = &state.events {
            let _ = events.send(ScrollEvent::Status(ScrollStatus::Scrolling));
        }
    }

    /// Cancel the loop immediately and discard its counters.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.running = false;
        state.paused = false;
        state.phase = ScrollPhase::Stopped;
        if let Some(token) = state.cancel.take() {
            token.cancel();
        }
        if let Some(events) = state.events.take() {
            let _ = events.send(ScrollEvent::Status(ScrollStatus::Stopped));
        }
        info!(epoch = state.epoch, "acquisition stopped");
    }

    pub fn phase(&self) -> ScrollPhase {
        self.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Running and not paused.
    pub fn is_scrolling(&self) -> bool {
        let state = self.lock();
        state.running && !state.paused
    }

    /// Move a loop of `epoch` into a terminal phase, unless superseded.
    fn finish(&self, epoch: u64, phase: ScrollPhase) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch || !state.running {
            return false;
        }
        state.running = false;
        state.paused = false;
        state.phase = phase;
        state.cancel = None;
        state.events = None;
        true
    }
}

enum Checkpoint {
    Active,
    Paused,
    Exit,
}

struct LoopContext {
    session: ScrollSession,
    host: Arc<dyn ScrollHost>,
    events: UnboundedSender<ScrollEvent>,
    config: ScrollConfig,
    token: CancellationToken,
    epoch: u64,
}

impl LoopContext {
    async fn run(&self) -> Result<(), LoopError> {
        self.emit(ScrollEvent::Status(ScrollStatus::Scrolling))?;
        let mut stall_count: u32 = 0;

        loop {
            match self.checkpoint() {
                Checkpoint::Exit => return Ok(()),
                Checkpoint::Paused => {
                    self.set_phase(ScrollPhase::Paused);
                    self.emit(ScrollEvent::Status(ScrollStatus::Paused))?;
                    self.wait(PAUSE_POLL).await?;
                    continue;
                }
                Checkpoint::Active => {}
            }

            let before = self.host.scroll_offset();
            self.scroll(self.config.scroll_distance)?;
            self.wait(random_delay(&self.config)).await?;

            self.report_items(self.host.visible_item_count())?;

            let after = self.host.scroll_offset();
            if after > before {
                if stall_count > 0 {
                    debug!(epoch = self.epoch, stall_count, "scroll progress resumed");
                    self.set_phase(ScrollPhase::Scrolling);
                }
                stall_count = 0;
                continue;
            }

            stall_count += 1;
            let end_marker = self.host.end_reached();
            debug!(epoch = self.epoch, stall_count, end_marker, "no scroll progress");

            if (end_marker && stall_count >= END_MARKER_STALL_LIMIT) || stall_count >= MAX_STALLS {
                if self.session.finish(self.epoch, ScrollPhase::Complete) {
                    info!(epoch = self.epoch, stall_count, "feed exhausted");
                    self.emit(ScrollEvent::Status(ScrollStatus::Complete))?;
                }
                return Ok(());
            }

            self.set_phase(ScrollPhase::Stalled);
            self.scroll(NUDGE_BACK)?;
            self.wait(NUDGE_SETTLE).await?;
            self.scroll(NUDGE_FORWARD)?;
            self.wait(stall_backoff(stall_count)).await?;
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        let state = self.session.lock();
        if self.token.is_cancelled() || !state.running || state.epoch != self.epoch {
            Checkpoint::Exit
        } else if state.paused {
            Checkpoint::Paused
        } else {
            Checkpoint::Active
        }
    }

    /// Scroll while holding the session lock, so `stop` cannot interleave
    /// between the cancellation check and the action.
    fn scroll(&self, delta: i64) -> Result<(), LoopError> {
        let state = self.session.lock();
        if self.token.is_cancelled() || state.epoch != self.epoch {
            return Err(LoopError::Cancelled);
        }
        self.host.scroll_by(delta);
        Ok(())
    }

    /// Emit `ItemsInView` under the session lock, so nothing follows the
    /// `Stopped` that `stop` sends while holding the same lock.
    fn report_items(&self, count: usize) -> Result<(), LoopError> {
        let state = self.session.lock();
        if self.token.is_cancelled() || state.epoch != self.epoch {
            return Err(LoopError::Cancelled);
        }
        self.emit(ScrollEvent::ItemsInView(count))
    }

    fn set_phase(&self, phase: ScrollPhase) {
        let mut state = self.session.lock();
        if state.epoch == self.epoch && state.running {
            state.phase = phase;
        }
    }

    fn emit(&self, event: ScrollEvent) -> Result<(), LoopError> {
        self.events
            .send(event)
            .map_err(|_| LoopError::Disconnected)
    }

    async fn wait(&self, duration: Duration) -> Result<(), LoopError> {
        tokio::select! {
            _ = self.token.cancelled() => Err(LoopError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

/// Uniformly random step delay in `[min_delay, max_delay]`.
fn random_delay(config: &ScrollConfig) -> Duration {
    let min = config.min_delay.as_millis() as u64;
    let max = config.max_delay.as_millis() as u64;
    if max <= min {
        return config.min_delay;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Backoff after the `stall_count`-th consecutive stall.
pub fn stall_backoff(stall_count: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS + stall_count as u64 * BACKOFF_STEP_MS)
}
