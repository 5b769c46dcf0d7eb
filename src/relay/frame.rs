//! Frame types shared between ingest and egress
//!
//! A frame is one rendered image plus the tag its producer assigned to it.
//! The relay never looks inside the payload.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A single rendered video frame held by the relay
///
/// Cheap to clone: the JPEG payload is reference-counted via `Bytes`, so
/// fan-out to many viewers shares one allocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Producer-assigned sequence tag
    ///
    /// Not guaranteed unique or strictly increasing when ingest paths are
    /// mixed; an opaque label, not an index into the buffer.
    pub sequence: u64,

    /// JPEG-encoded image data
    pub payload: Bytes,

    /// When the relay accepted this frame
    pub ingested_at: DateTime<Utc>,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(sequence: u64, payload: Bytes) -> Self {
        Self {
            sequence,
            payload,
            ingested_at: Utc::now(),
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
