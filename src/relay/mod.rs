//! Core relay state shared by ingest and egress
//!
//! One bounded frame buffer plus one set of session signal flags, owned by
//! a [`RelayState`] and shared behind `Arc`. The ingest multiplexer is the
//! single writer; polling, MJPEG, and event-push egress are independent
//! concurrent readers, each with its own cursor.

pub mod buffer;
pub mod config;
pub mod events;
pub mod frame;
pub mod signals;
pub mod state;

pub use buffer::FrameBuffer;
pub use config::RelayConfig;
pub use events::{EventHub, RelayEvent};
pub use frame::Frame;
pub use signals::{SessionPhase, SessionSignals};
pub use state::{EgressStep, FrameSource, PollSnapshot, RelayState};
