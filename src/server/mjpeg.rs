//! MJPEG egress
//!
//! Replays the frame buffer to one viewer as an infinite
//! `multipart/x-mixed-replace` stream. Each connection runs its own task
//! with an independent cursor, so simultaneous viewers each see the full
//! frame sequence from their own connection time — minus whatever history
//! the buffer has already evicted, which is accepted lossy behavior for
//! late or slow viewers.
//!
//! A connection moves through three phases: wait for the first frame (or
//! an empty finish), stream until caught up and finished, then write the
//! closing boundary. Waits are on the relay's revision channel, so a
//! viewer wakes immediately on append or finish rather than on a timer.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::relay::{Frame, RelayState};

use super::routes::AppState;

/// Boundary token for the egress stream
pub const BOUNDARY: &str = "frame";

/// Handle one `GET /mjpeg_stream` viewer
pub async fn mjpeg_stream(State(app): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(32);
    tokio::spawn(stream_to_viewer(app.relay.clone(), tx));

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .expect("failed to build mjpeg response")
}

type PartSender = mpsc::Sender<Result<Bytes, Infallible>>;

async fn stream_to_viewer(relay: Arc<RelayState>, tx: PartSender) {
    let mut rev = relay.watch_revision();
    let mut cursor = 0;

    // Wait for the first frame, or finish with zero frames delivered.
    loop {
        rev.borrow_and_update();
        let step = relay.egress_step(cursor).await;
        cursor = step.cursor;
        if step.frame.is_some() {
            break;
        }
        if step.finished {
            finalize(&tx, 0).await;
            return;
        }
        if rev.changed().await.is_err() {
            return;
        }
    }

    // Stream: drain the buffer from the cursor, waking on every append.
    let mut delivered = 0u64;
    loop {
        rev.borrow_and_update();
        loop {
            let step = relay.egress_step(cursor).await;
            cursor = step.cursor;
            match step.frame {
                Some(frame) => {
                    if write_part(&tx, &frame).await.is_err() {
                        // Peer disconnected mid-write; only this viewer ends.
                        tracing::debug!(delivered, "mjpeg viewer disconnected");
                        return;
                    }
                    cursor += 1;
                    delivered += 1;
                }
                None if step.finished => {
                    // Caught up and the session is over.
                    finalize(&tx, delivered).await;
                    return;
                }
                None => break,
            }
        }
        if rev.changed().await.is_err() {
            finalize(&tx, delivered).await;
            return;
        }
    }
}

async fn write_part(
    tx: &PartSender,
    frame: &Frame,
) -> Result<(), mpsc::error::SendError<Result<Bytes, Infallible>>> {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        frame.payload.len()
    );

    let mut part = Vec::with_capacity(head.len() + frame.payload.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(&frame.payload);
    part.extend_from_slice(b"\r\n");

    tx.send(Ok(Bytes::from(part))).await
}

/// Closing boundary, best-effort: the peer may already be gone
async fn finalize(tx: &PartSender, delivered: u64) {
    let _ = tx
        .send(Ok(Bytes::from(format!("--{}--\r\n", BOUNDARY))))
        .await;
    tracing::debug!(delivered, "mjpeg stream finalized");
}
