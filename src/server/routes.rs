//! HTTP routes and request handlers
//!
//! The ingest endpoint (`POST /stream_frames`) selects between the NDJSON
//! and batch-JSON decoders by inspecting the declared content type; the
//! polling endpoint (`GET /frame_buffer`) is stateless — the caller owns
//! its offset and advances it with the returned `next_offset`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::ingest::{self, NdjsonDecoder, StreamMessage};
use crate::relay::{Frame, FrameSource, RelayState};

use super::config::ServerConfig;
use super::{gateway, mjpeg, sse};

/// Default window size for the polling API
pub const DEFAULT_POLL_LIMIT: usize = 200;

/// Shared state passed to all request handlers
#[derive(Clone)]
pub struct AppState {
    /// Session state shared with ingest and egress tasks
    pub relay: Arc<RelayState>,
    /// Outbound HTTP client for upstream calls
    pub http: reqwest::Client,
    /// Server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create handler state around an existing relay
    pub fn new(relay: Arc<RelayState>, config: ServerConfig) -> Self {
        Self {
            relay,
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size;

    Router::new()
        .route("/healthz", get(healthz))
        // The producer stream is long-lived and already bounded by the
        // frame buffer; only buffered bodies get the upload cap.
        .route(
            "/stream_frames",
            post(stream_frames).layer(DefaultBodyLimit::disable()),
        )
        .route("/frame_buffer", get(frame_buffer))
        .route("/clear_buffer", post(clear_buffer))
        .route("/mjpeg_stream", get(mjpeg::mjpeg_stream))
        .route("/events", get(sse::events))
        .route("/save_audio", post(gateway::save_audio))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
struct PollParams {
    offset: Option<String>,
    limit: Option<String>,
}

/// One frame as served by the polling API
#[derive(Debug, Serialize)]
struct FrameDto {
    sequence: u64,
    frame_data: String,
    ingested_at: DateTime<Utc>,
}

impl From<&Frame> for FrameDto {
    fn from(frame: &Frame) -> Self {
        Self {
            sequence: frame.sequence,
            frame_data: STANDARD.encode(&frame.payload),
            ingested_at: frame.ingested_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct PollResponse {
    frames: Vec<FrameDto>,
    buffer_size: usize,
    next_offset: usize,
    started: bool,
    finished: bool,
    initial_buffer_received: bool,
}

/// Malformed or negative query values fall back to the default
fn lenient(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

async fn frame_buffer(
    State(app): State<AppState>,
    Query(params): Query<PollParams>,
) -> Json<PollResponse> {
    let offset = lenient(params.offset.as_deref(), 0);
    let limit = lenient(params.limit.as_deref(), DEFAULT_POLL_LIMIT);

    let snapshot = app.relay.poll(offset, limit).await;

    Json(PollResponse {
        frames: snapshot.frames.iter().map(FrameDto::from).collect(),
        buffer_size: snapshot.buffer_size,
        next_offset: snapshot.next_offset,
        started: snapshot.signals.started,
        finished: snapshot.signals.finished,
        initial_buffer_received: snapshot.signals.initial_buffer_received,
    })
}

async fn clear_buffer(State(app): State<AppState>) -> Json<serde_json::Value> {
    app.relay.clear().await;
    Json(json!({ "success": true }))
}

async fn stream_frames(State(app): State<AppState>, request: Request) -> Response {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    // A json-but-not-ndjson content type selects the buffered batch path;
    // everything else is treated as a line stream.
    let is_batch = content_type.contains("json") && !content_type.contains("ndjson");
    let body = request.into_body();

    if is_batch {
        ingest_batch(app, body).await
    } else {
        ingest_ndjson(app, body).await
    }
}

async fn ingest_batch(app: AppState, body: Body) -> Response {
    let bytes = match axum::body::to_bytes(body, app.config.max_upload_size).await {
        Ok(bytes) => bytes,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response();
        }
    };

    let message = match StreamMessage::from_slice(&bytes) {
        Ok(message) => message,
        Err(error) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid json body: {}", error) })),
            )
                .into_response();
        }
    };

    let mut frames_added = 0;
    if let Some(event) = message.into_event() {
        frames_added = ingest::apply(&app.relay, FrameSource::Ndjson, event).await;
    }

    Json(json!({ "ok": true, "frames_added": frames_added })).into_response()
}

async fn ingest_ndjson(app: AppState, body: Body) -> Response {
    tracing::info!("ndjson frame stream opened");

    let mut decoder = NdjsonDecoder::new();
    let mut stream = body.into_data_stream();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                for event in decoder.push(&chunk) {
                    ingest::apply(&app.relay, FrameSource::Ndjson, event).await;
                }
            }
            Err(error) => {
                // Inbound transport abort: keep whatever was appended.
                tracing::warn!(%error, lines = decoder.lines(), "ndjson stream aborted");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response();
            }
        }
    }

    if let Some(event) = decoder.finish() {
        ingest::apply(&app.relay, FrameSource::Ndjson, event).await;
    }

    tracing::info!(
        lines = decoder.lines(),
        frames = decoder.frames(),
        "ndjson frame stream completed"
    );

    Json(json!({
        "ok": true,
        "lines": decoder.lines(),
        "frames": decoder.frames(),
    }))
    .into_response()
}
