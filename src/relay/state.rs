//! Shared relay state
//!
//! One `RelayState` owns everything a processing session shares: the frame
//! buffer, the signal flags, and the event hub. It is handed around behind
//! an `Arc`, never ambient — multiple independent sessions can coexist by
//! creating multiple states.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<RelayState>
//!                  ┌───────────────────────┐
//!                  │ RwLock<RelayInner> {  │
//!                  │   buffer, signals,    │
//!                  │ }                     │
//!                  │ events: EventHub      │
//!                  │ rev: watch::Sender    │
//!                  └──────────┬────────────┘
//!                             │
//!        ┌────────────────────┼────────────────────┐
//!        │                    │                    │
//!        ▼                    ▼                    ▼
//!   [Ingest]            [MJPEG viewer]       [SSE subscriber]
//!   apply writes        rev.changed()        events.recv()
//! ```
//!
//! The ingest multiplexer is the single writer; every egress component is a
//! reader holding its own cursor. Readers wake on the revision `watch`
//! channel instead of polling on a timer, so an append or finish signal
//! reaches a waiting viewer immediately.
//!
//! # Zero-Copy Design
//!
//! Frame payloads are `bytes::Bytes`: reads hand out clones that share the
//! ingest-side allocation, so fan-out to many viewers never copies pixels.

use tokio::sync::{watch, RwLock};

use super::buffer::FrameBuffer;
use super::config::RelayConfig;
use super::events::{EventHub, RelayEvent};
use super::frame::Frame;
use super::signals::SessionSignals;

/// Which decoder strategy produced a batch of frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    /// NDJSON or batch-JSON `frames` entries
    Ndjson,
    /// The outbound MJPEG pull decoder
    MjpegPull,
}

/// One egress read against the buffer
#[derive(Debug)]
pub struct EgressStep {
    /// The cursor clamped into the currently retained absolute range
    pub cursor: u64,
    /// The frame at `cursor`, if one is retained there
    pub frame: Option<Frame>,
    /// Whether the finished signal has been seen
    pub finished: bool,
}

/// Point-in-time view of the buffer and signals for the polling API
#[derive(Debug)]
pub struct PollSnapshot {
    /// The requested window, clamped
    pub frames: Vec<Frame>,
    /// Total frames currently retained
    pub buffer_size: usize,
    /// Offset the caller should resume from
    pub next_offset: usize,
    /// Signal flags at snapshot time
    pub signals: SessionSignals,
}

struct RelayInner {
    buffer: FrameBuffer,
    signals: SessionSignals,
    /// While true, NDJSON frame entries are dropped to avoid duplicate
    /// delivery; control messages stay authoritative.
    pull_active: bool,
}

/// Shared state for one processing session
///
/// Single-writer/multiple-reader: only the ingest multiplexer calls the
/// mutating methods; egress components read through their own cursors.
pub struct RelayState {
    config: RelayConfig,
    inner: RwLock<RelayInner>,
    events: EventHub,
    rev_tx: watch::Sender<u64>,
}

impl RelayState {
    /// Create state with default configuration
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create state with custom configuration
    pub fn with_config(config: RelayConfig) -> Self {
        let (rev_tx, _) = watch::channel(0);

        Self {
            events: EventHub::new(config.event_capacity),
            inner: RwLock::new(RelayInner {
                buffer: FrameBuffer::with_capacity(config.frame_capacity),
                signals: SessionSignals::new(),
                pull_active: false,
            }),
            config,
            rev_tx,
        }
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Handle the start control signal
    pub async fn on_start(&self) {
        let mut inner = self.inner.write().await;
        inner.signals.on_start();

        tracing::info!(phase = ?inner.signals.phase(), "start signal received");
        drop(inner);

        self.bump();
    }

    /// Handle the finished control signal
    ///
    /// Unconditionally broadcasts the finished event to push subscribers.
    pub async fn on_finished(&self) {
        let mut inner = self.inner.write().await;
        inner.signals.on_finished();

        tracing::info!(
            buffer_size = inner.buffer.size(),
            "finished signal received"
        );
        drop(inner);

        let receivers = self.events.broadcast(RelayEvent::finished());
        tracing::debug!(receivers, "finished event broadcast");

        self.bump();
    }

    /// Append a batch of frames from one decoder strategy
    ///
    /// Returns the number appended. NDJSON batches are dropped while the
    /// MJPEG pull path is active; frames arriving after the finished signal
    /// are still accepted and appended.
    pub async fn append_frames(&self, frames: Vec<Frame>, source: FrameSource) -> usize {
        if frames.is_empty() {
            return 0;
        }

        let mut inner = self.inner.write().await;

        if inner.pull_active && source == FrameSource::Ndjson {
            tracing::debug!(
                dropped = frames.len(),
                "pull path active; ignoring ndjson frame entries"
            );
            return 0;
        }

        let added = inner.buffer.append(frames);
        inner.signals.on_frames_added();

        tracing::debug!(
            added,
            buffer_size = inner.buffer.size(),
            source = ?source,
            "frames appended"
        );
        drop(inner);

        self.bump();
        added
    }

    /// Reset buffer and signals together, from any state
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.buffer.clear();
        inner.signals.clear();

        tracing::info!("buffer and session signals cleared");
        drop(inner);

        self.bump();
    }

    /// Mark the MJPEG pull path active
    pub async fn begin_pull(&self) {
        self.inner.write().await.pull_active = true;
        tracing::info!("mjpeg pull path active");
    }

    /// Mark the MJPEG pull path inactive
    pub async fn end_pull(&self) {
        self.inner.write().await.pull_active = false;
        tracing::info!("mjpeg pull path ended");
    }

    /// Windowed read plus signal snapshot for the polling API
    pub async fn poll(&self, offset: usize, limit: usize) -> PollSnapshot {
        let inner = self.inner.read().await;
        let (frames, next_offset) = inner.buffer.window(offset, limit);

        PollSnapshot {
            frames,
            buffer_size: inner.buffer.size(),
            next_offset,
            signals: inner.signals,
        }
    }

    /// One egress read: clamp `cursor` into the retained absolute range and
    /// fetch the frame there
    ///
    /// A cursor behind the retained history jumps forward to the oldest
    /// retained frame (late viewers lose evicted history); a cursor past
    /// the end (after a clear) snaps back to the append point.
    pub async fn egress_step(&self, cursor: u64) -> EgressStep {
        let inner = self.inner.read().await;
        let clamped = cursor
            .max(inner.buffer.first_index())
            .min(inner.buffer.next_index());

        if clamped > cursor {
            tracing::debug!(
                skipped = clamped - cursor,
                "viewer cursor behind retained history; skipping forward"
            );
        }

        EgressStep {
            cursor: clamped,
            frame: inner.buffer.get(clamped).cloned(),
            finished: inner.signals.finished,
        }
    }

    /// Number of frames currently retained
    pub async fn buffer_size(&self) -> usize {
        self.inner.read().await.buffer.size()
    }

    /// Current signal flags
    pub async fn signals(&self) -> SessionSignals {
        self.inner.read().await.signals
    }

    /// Register a new push subscriber queue
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    /// Watch the buffer/signal revision; bumped on every mutation
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.rev_tx.subscribe()
    }

    fn bump(&self) {
        self.rev_tx.send_modify(|rev| *rev += 1);
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}
