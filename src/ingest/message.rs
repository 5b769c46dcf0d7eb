//! Wire schema for producer stream messages
//!
//! One message is either a control signal (`{"status": "start"}` /
//! `{"status": "finished"}`) or a frame batch
//! (`{"frames": [{"sequence": 0, "frame_data": "<base64>"}, ...]}`).
//! The same schema is carried one-per-line over NDJSON or as a single
//! batch-JSON body.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;

use super::event::IngestEvent;
use crate::relay::Frame;

/// One producer message
#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    /// Control status; only `"start"` and `"finished"` are significant
    #[serde(default)]
    pub status: Option<String>,

    /// Frame batch; ignored when a control status is present
    #[serde(default)]
    pub frames: Vec<FrameEntry>,
}

/// One frame entry within a batch
#[derive(Debug, Deserialize)]
pub struct FrameEntry {
    /// Producer sequence tag (`frame_number` accepted from older producers)
    #[serde(default, alias = "frame_number")]
    pub sequence: u64,

    /// Base64-encoded JPEG payload
    #[serde(default)]
    pub frame_data: Option<String>,
}

impl StreamMessage {
    /// Parse a message from a JSON byte slice
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Normalize into an ingest event
    ///
    /// Entries with missing or undecodable `frame_data` are skipped in
    /// isolation; a message carrying neither a significant status nor any
    /// decodable frame yields `None`.
    pub fn into_event(self) -> Option<IngestEvent> {
        match self.status.as_deref() {
            Some("start") => return Some(IngestEvent::Start),
            Some("finished") => return Some(IngestEvent::Finished),
            _ => {}
        }

        if self.frames.is_empty() {
            return None;
        }

        let mut frames = Vec::with_capacity(self.frames.len());
        for entry in self.frames {
            let Some(encoded) = entry.frame_data else {
                continue;
            };
            match STANDARD.decode(&encoded) {
                Ok(payload) => frames.push(Frame::new(entry.sequence, Bytes::from(payload))),
                Err(_) => {
                    tracing::warn!(
                        sequence = entry.sequence,
                        "frame entry has invalid base64; dropping"
                    );
                }
            }
        }

        if frames.is_empty() {
            None
        } else {
            Some(IngestEvent::FramesAdded(frames))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_control() {
        let msg = StreamMessage::from_slice(br#"{"status":"start"}"#).unwrap();
        assert!(matches!(msg.into_event(), Some(IngestEvent::Start)));
    }

    #[test]
    fn test_finished_control() {
        let msg = StreamMessage::from_slice(br#"{"status":"finished"}"#).unwrap();
        assert!(matches!(msg.into_event(), Some(IngestEvent::Finished)));
    }

    #[test]
    fn test_unknown_status_falls_through_to_frames() {
        let body = br#"{"status":"progress","frames":[{"sequence":1,"frame_data":"aGk="}]}"#;
        let msg = StreamMessage::from_slice(body).unwrap();

        let event = msg.into_event().unwrap();
        assert_eq!(event.frame_count(), 1);
    }

    #[test]
    fn test_frame_batch_decodes_payloads() {
        let body = br#"{"frames":[
            {"sequence":3,"frame_data":"/9g="},
            {"sequence":4,"frame_data":"/9k="}
        ]}"#;
        let msg = StreamMessage::from_slice(body).unwrap();

        let Some(IngestEvent::FramesAdded(frames)) = msg.into_event() else {
            panic!("expected a frame batch");
        };
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].sequence, 3);
        assert_eq!(frames[0].payload.as_ref(), &[0xFF, 0xD8]);
        assert_eq!(frames[1].payload.as_ref(), &[0xFF, 0xD9]);
    }

    #[test]
    fn test_invalid_base64_skips_only_that_entry() {
        let body = br#"{"frames":[
            {"sequence":0,"frame_data":"!!!not-base64!!!"},
            {"sequence":1,"frame_data":"aGk="}
        ]}"#;
        let msg = StreamMessage::from_slice(body).unwrap();

        let Some(IngestEvent::FramesAdded(frames)) = msg.into_event() else {
            panic!("expected a frame batch");
        };
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 1);
    }

    #[test]
    fn test_missing_frame_data_skipped() {
        let body = br#"{"frames":[{"sequence":0}]}"#;
        let msg = StreamMessage::from_slice(body).unwrap();

        assert!(msg.into_event().is_none());
    }

    #[test]
    fn test_legacy_frame_number_alias() {
        let body = br#"{"frames":[{"frame_number":42,"frame_data":"aGk="}]}"#;
        let msg = StreamMessage::from_slice(body).unwrap();

        let Some(IngestEvent::FramesAdded(frames)) = msg.into_event() else {
            panic!("expected a frame batch");
        };
        assert_eq!(frames[0].sequence, 42);
    }

    #[test]
    fn test_empty_message_yields_nothing() {
        let msg = StreamMessage::from_slice(b"{}").unwrap();
        assert!(msg.into_event().is_none());
    }
}
