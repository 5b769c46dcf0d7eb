//! NDJSON stream decoding
//!
//! Consumes an arbitrarily-chunked byte stream, splits on `\n`, and parses
//! each complete line as an independent JSON message. A line that fails to
//! parse is logged and dropped; the stream itself only ends when the
//! transport does.

use bytes::{Buf, BytesMut};

use super::event::IngestEvent;
use super::message::StreamMessage;

/// Incremental NDJSON decoder
///
/// Feed raw chunks with [`push`](Self::push) as they arrive and flush the
/// final unterminated line with [`finish`](Self::finish) at stream end.
/// Counts processed lines and accepted frames for the ingest response.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: BytesMut,
    lines: u64,
    frames: u64,
}

impl NdjsonDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the events decoded from completed lines
    pub fn push(&mut self, chunk: &[u8]) -> Vec<IngestEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line = self.buf.split_to(pos);
            self.buf.advance(1); // the newline itself
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the final unterminated line at stream end
    pub fn finish(&mut self) -> Option<IngestEvent> {
        if self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split();
        self.decode_line(&line)
    }

    /// Lines processed so far, including blank and malformed ones
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Frames accepted so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<IngestEvent> {
        self.lines += 1;

        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let message: StreamMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "non-JSON line received; ignoring");
                return None;
            }
        };

        let event = message.into_event()?;
        self.frames += event.frame_count() as u64;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut decoder = NdjsonDecoder::new();

        let events = decoder.push(b"{\"status\":\"start\"}\n");

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], IngestEvent::Start));
        assert_eq!(decoder.lines(), 1);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = NdjsonDecoder::new();

        assert!(decoder.push(b"{\"status\":").is_empty());
        assert!(decoder.push(b"\"finish").is_empty());
        let events = decoder.push(b"ed\"}\n");

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], IngestEvent::Finished));
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut decoder = NdjsonDecoder::new();

        let chunk = b"{\"status\":\"start\"}\n{\"frames\":[{\"sequence\":0,\"frame_data\":\"aGk=\"}]}\n";
        let events = decoder.push(chunk);

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], IngestEvent::Start));
        assert_eq!(events[1].frame_count(), 1);
        assert_eq!(decoder.frames(), 1);
    }

    #[test]
    fn test_malformed_line_dropped_stream_continues() {
        let mut decoder = NdjsonDecoder::new();

        let events = decoder.push(b"this is not json\n{\"status\":\"start\"}\n");

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], IngestEvent::Start));
        assert_eq!(decoder.lines(), 2);
    }

    #[test]
    fn test_blank_lines_counted_but_ignored() {
        let mut decoder = NdjsonDecoder::new();

        let events = decoder.push(b"\n\r\n{\"status\":\"start\"}\n");

        assert_eq!(events.len(), 1);
        assert_eq!(decoder.lines(), 3);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = NdjsonDecoder::new();

        assert!(decoder.push(b"{\"status\":\"finished\"}").is_empty());
        let event = decoder.finish();

        assert!(matches!(event, Some(IngestEvent::Finished)));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_frame_counter_accumulates() {
        let mut decoder = NdjsonDecoder::new();

        decoder.push(b"{\"frames\":[{\"sequence\":0,\"frame_data\":\"aGk=\"},{\"sequence\":1,\"frame_data\":\"aGk=\"}]}\n");
        decoder.push(b"{\"frames\":[{\"sequence\":2,\"frame_data\":\"aGk=\"}]}\n");

        assert_eq!(decoder.frames(), 3);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = NdjsonDecoder::new();

        let events = decoder.push(b"{\"status\":\"start\"}\r\n");

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], IngestEvent::Start));
    }
}
