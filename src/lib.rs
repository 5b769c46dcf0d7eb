//! # avatar-relay
//!
//! A relay between an avatar-rendering service and many live viewers of
//! its output. Rendered frames arrive over one of several wire encodings
//! (NDJSON, batch JSON, or a pulled MJPEG multipart stream), land in one
//! bounded in-memory buffer, and are re-served over three delivery
//! mechanisms: stateless polling, infinite MJPEG streams, and a
//! signal-only SSE push channel.
//!
//! ```text
//!   producer ──ndjson/json──► POST /stream_frames ─┐
//!   upstream ◄──pull── MjpegPuller ────────────────┤
//!                                                  ▼
//!                                        Arc<RelayState>
//!                                   (frame buffer + signals)
//!                                                  │
//!              ┌───────────────────────┬───────────┴─────────┐
//!              ▼                       ▼                     ▼
//!      GET /frame_buffer        GET /mjpeg_stream        GET /events
//!      (windowed polling)       (per-viewer cursor)      (SSE signals)
//! ```
//!
//! The ingest side is the single writer; every egress connection is an
//! independent reader with its own cursor, woken by a revision channel
//! rather than a polling timer. Frame payloads travel as [`bytes::Bytes`],
//! so fan-out shares one allocation per frame.
//!
//! # Example
//!
//! ```no_run
//! use avatar_relay::server::{RelayServer, ServerConfig};
//!
//! # async fn example() -> avatar_relay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! server.run().await
//! # }
//! ```

pub mod error;
pub mod ingest;
pub mod relay;
pub mod server;

pub use error::{Error, Result};
pub use relay::{Frame, FrameBuffer, RelayConfig, RelayState, SessionSignals};
pub use server::{RelayServer, ServerConfig};
