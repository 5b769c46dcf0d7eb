//! Ingest multiplexer
//!
//! Three logically equivalent entry points feed one internal event model:
//!
//! - NDJSON stream decoding ([`ndjson`]), one JSON message per line;
//! - batch-JSON, the same message schema as a single body ([`message`]);
//! - an outbound MJPEG pull ([`mjpeg_pull`]) parsing the upstream
//!   multipart stream directly.
//!
//! All three normalize into [`IngestEvent`] and converge on the shared
//! [`RelayState`](crate::relay::RelayState). Any single malformed unit —
//! line, JSON object, base64 field, multipart part — is dropped in
//! isolation; an ingest channel terminates only on transport error, and the
//! buffer keeps whatever was already appended.

pub mod event;
pub mod message;
pub mod mjpeg_pull;
pub mod ndjson;

pub use event::{apply, IngestEvent};
pub use message::{FrameEntry, StreamMessage};
pub use mjpeg_pull::{MjpegPuller, MultipartFrameDecoder};
pub use ndjson::NdjsonDecoder;
