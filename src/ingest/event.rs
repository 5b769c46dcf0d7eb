//! The internal ingest event model
//!
//! Every decoder strategy — NDJSON, batch-JSON, MJPEG pull — normalizes its
//! wire format into this closed set of events, converging on one
//! append/signal API. The buffer and signal tracker never see wire formats.

use crate::relay::{Frame, FrameSource, RelayState};

/// One normalized unit of ingest
#[derive(Debug)]
pub enum IngestEvent {
    /// Producer announced the start of a session
    Start,
    /// Producer announced the end of a session
    Finished,
    /// A batch of decoded frames, in producer order
    FramesAdded(Vec<Frame>),
}

impl IngestEvent {
    /// Number of frames carried by this event
    pub fn frame_count(&self) -> usize {
        match self {
            IngestEvent::FramesAdded(frames) => frames.len(),
            _ => 0,
        }
    }
}

/// Apply one event to the shared state
///
/// Control events are authoritative regardless of which frame-data path is
/// active; frame batches are subject to the duplicate-delivery guard in
/// [`RelayState::append_frames`]. Returns the number of frames appended.
pub async fn apply(state: &RelayState, source: FrameSource, event: IngestEvent) -> usize {
    match event {
        IngestEvent::Start => {
            state.on_start().await;
            0
        }
        IngestEvent::Finished => {
            state.on_finished().await;
            0
        }
        IngestEvent::FramesAdded(frames) => state.append_frames(frames, source).await,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[tokio::test]
    async fn test_apply_routes_events() {
        let state = RelayState::new();

        apply(&state, FrameSource::Ndjson, IngestEvent::Start).await;
        assert!(state.signals().await.started);

        let frames = vec![Frame::new(0, Bytes::from_static(b"\xFF\xD8"))];
        let added = apply(&state, FrameSource::Ndjson, IngestEvent::FramesAdded(frames)).await;
        assert_eq!(added, 1);
        assert!(state.signals().await.initial_buffer_received);

        apply(&state, FrameSource::Ndjson, IngestEvent::Finished).await;
        assert!(state.signals().await.finished);
    }
}
