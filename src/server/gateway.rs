//! Relay gateway for audio uploads
//!
//! Boundary validation plus forward to the upstream renderer: the relay
//! decodes the uploaded audio, optionally routes it through the answer
//! synthesizer, and hands the renderer a multipart form carrying this
//! relay's own frame-stream callback URL. A non-success upstream answer is
//! passed back as a gateway error with the upstream body attached for
//! diagnosis. Nothing here is retried; retries belong to the caller.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};

use super::routes::AppState;

/// Data-URI prefix producers may put in front of the base64 audio
const WAV_DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

/// Body of `POST /save_audio`
#[derive(Debug, Deserialize)]
pub struct SaveAudioRequest {
    /// Base64 recording, with or without a data-URI prefix
    #[serde(default)]
    pub audio_data: Option<String>,
    /// Frame rate hint for the renderer; number or string
    #[serde(default)]
    pub fps: Option<serde_json::Value>,
    /// Batch size hint for the renderer; number or string
    #[serde(default)]
    pub batch_size: Option<serde_json::Value>,
    /// Per-request renderer override
    #[serde(default)]
    pub renderer_url: Option<String>,
}

/// Handle one audio upload
pub async fn save_audio(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SaveAudioRequest>,
) -> Response {
    let Some(audio_data) = request.audio_data.as_deref() else {
        return error_response(StatusCode::BAD_REQUEST, "no audio data received");
    };
    let audio = match decode_audio(audio_data, app.config.max_upload_size) {
        Ok(audio) => audio,
        Err(error) => return boundary_error(error),
    };

    let Some(renderer) = request
        .renderer_url
        .clone()
        .or_else(|| app.config.renderer_base.clone())
    else {
        return error_response(StatusCode::BAD_REQUEST, "no renderer configured");
    };
    let base = normalize_base_url(&renderer);
    let stream_url = callback_url(&headers, app.config.public_base.as_deref());

    // With a synthesizer wired in, the renderer animates the synthesized
    // reply rather than the raw question audio.
    let (payload, file_name, mime) = if let Some(answer_base) = &app.config.answer_base {
        let synthesizer = AnswerSynthesizer::new(app.http.clone(), answer_base);
        let answer = match synthesizer.answer(Bytes::from(audio)).await {
            Ok(answer) => answer,
            Err(error) => return upstream_error(error),
        };
        match synthesizer.fetch_audio(&answer).await {
            Ok(bytes) => (bytes, "answer.mp3", "audio/mpeg"),
            Err(error) => return upstream_error(error),
        }
    } else {
        (Bytes::from(audio), "input.wav", "audio/wav")
    };

    match forward_to_renderer(&app, &base, payload, file_name, mime, &stream_url, &request).await {
        Ok(body) => Json(json!({
            "success": true,
            "message": "audio forwarded to renderer",
            "renderer_response": body,
            "renderer_url": format!("{}/process", base),
            "stream_url": stream_url,
        }))
        .into_response(),
        Err(error) => upstream_error(error),
    }
}

async fn forward_to_renderer(
    app: &AppState,
    base: &str,
    payload: Bytes,
    file_name: &'static str,
    mime: &str,
    stream_url: &str,
    request: &SaveAudioRequest,
) -> Result<String> {
    let part = reqwest::multipart::Part::stream(reqwest::Body::from(payload))
        .file_name(file_name)
        .mime_str(mime)?;
    let form = reqwest::multipart::Form::new()
        .part("audio", part)
        .text("stream_url", stream_url.to_string())
        .text("fps", text_field(&request.fps, "25"))
        .text("batch_size", text_field(&request.batch_size, "20"))
        .text("bbox_shift", "0");

    let response = app
        .http
        .post(format!("{}/process", base))
        .multipart(form)
        .timeout(app.config.forward_timeout)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}

/// Output contract of the external answer synthesizer
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizedAnswer {
    /// Transcript of the submitted recording
    pub transcript: String,
    /// Text of the generated reply
    pub reply_text: String,
    /// Reference to the synthesized speech audio
    pub synthesized_audio_ref: String,
}

/// Narrow client for the external answer synthesizer
///
/// Consumed only: the relay submits recorded audio and gets back a
/// transcript, a reply, and a reference to synthesized speech. Failures
/// surface as relay errors and are never retried here.
pub struct AnswerSynthesizer {
    client: reqwest::Client,
    base: String,
}

impl AnswerSynthesizer {
    /// Create a client for the synthesizer at `base`
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        Self {
            client,
            base: normalize_base_url(base),
        }
    }

    /// Submit recorded audio and obtain the synthesized answer
    pub async fn answer(&self, audio: Bytes) -> Result<SynthesizedAnswer> {
        let part = reqwest::multipart::Part::stream(reqwest::Body::from(audio))
            .file_name("input.wav")
            .mime_str("audio/wav")?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(format!("{}/answer", self.base))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }

    /// Fetch the synthesized speech referenced by an answer
    pub async fn fetch_audio(&self, answer: &SynthesizedAnswer) -> Result<Bytes> {
        let url = if answer.synthesized_audio_ref.starts_with("http") {
            answer.synthesized_audio_ref.clone()
        } else {
            format!(
                "{}/{}",
                self.base,
                answer.synthesized_audio_ref.trim_start_matches('/')
            )
        };

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?)
    }
}

/// Validate and decode the uploaded base64 audio
///
/// Rejection happens at the boundary: a bad encoding or an oversized
/// payload is a client error, never a silent truncation.
fn decode_audio(audio_data: &str, limit: usize) -> Result<Vec<u8>> {
    let encoded = audio_data
        .strip_prefix(WAV_DATA_URI_PREFIX)
        .unwrap_or(audio_data);

    let audio = STANDARD
        .decode(encoded)
        .map_err(|error| Error::InvalidPayload(format!("invalid audio data: {}", error)))?;

    if audio.len() > limit {
        return Err(Error::PayloadTooLarge { limit });
    }
    Ok(audio)
}

/// Trim, strip trailing slashes, and default the scheme to `http://`
pub fn normalize_base_url(url: &str) -> String {
    let base = url.trim().trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("http://{}", base)
    }
}

/// Build the producer's frame-stream callback URL
///
/// Forwarded headers from a deployment proxy win over the configured
/// public base, which wins over the plain `Host` header.
fn callback_url(headers: &HeaderMap, public_base: Option<&str>) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");

    if let Some(host) = headers
        .get("x-forwarded-host")
        .and_then(|value| value.to_str().ok())
    {
        return format!("{}://{}/stream_frames", scheme, host);
    }
    if let Some(base) = public_base {
        return format!("{}/stream_frames", base.trim_end_matches('/'));
    }
    if let Some(host) = headers.get(header::HOST).and_then(|value| value.to_str().ok()) {
        return format!("{}://{}/stream_frames", scheme, host);
    }
    "http://localhost:5000/stream_frames".to_string()
}

/// Renderer hints arrive as numbers or strings; forward them as text
fn text_field(value: &Option<serde_json::Value>, default: &str) -> String {
    match value {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => default.to_string(),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn boundary_error(error: Error) -> Response {
    let status = match &error {
        Error::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn upstream_error(error: Error) -> Response {
    tracing::warn!(%error, "upstream forward failed");

    match error {
        Error::Upstream { status, body } => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "success": false,
                "error": format!("renderer returned status {}", status),
                "renderer_response": body,
            })),
        )
            .into_response(),
        error => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "success": false, "error": error.to_string() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://host:8085"), "http://host:8085");
        assert_eq!(normalize_base_url("http://host:8085/"), "http://host:8085");
        assert_eq!(normalize_base_url("host:8085"), "http://host:8085");
        assert_eq!(normalize_base_url("  https://host/  "), "https://host");
    }

    #[test]
    fn test_text_field_accepts_numbers_and_strings() {
        assert_eq!(text_field(&Some(json!(25)), "15"), "25");
        assert_eq!(text_field(&Some(json!("30")), "15"), "30");
        assert_eq!(text_field(&None, "15"), "15");
    }

    #[test]
    fn test_callback_url_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "internal:5000".parse().unwrap());

        // Plain host header is the last resort.
        assert_eq!(
            callback_url(&headers, None),
            "http://internal:5000/stream_frames"
        );

        // Configured public base beats the host header.
        assert_eq!(
            callback_url(&headers, Some("http://public:80/")),
            "http://public:80/stream_frames"
        );

        // Forwarded headers from the proxy beat everything.
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        headers.insert("x-forwarded-host", "relay.example.com".parse().unwrap());
        assert_eq!(
            callback_url(&headers, Some("http://public:80")),
            "https://relay.example.com/stream_frames"
        );
    }

    #[test]
    fn test_decode_audio_strips_data_uri_prefix() {
        let with_prefix = format!("{}aGk=", WAV_DATA_URI_PREFIX);
        assert_eq!(decode_audio(&with_prefix, 1024).unwrap(), b"hi");
        assert_eq!(decode_audio("aGk=", 1024).unwrap(), b"hi");
    }

    #[test]
    fn test_decode_audio_rejects_bad_input() {
        assert!(matches!(
            decode_audio("!!!not-base64!!!", 1024),
            Err(Error::InvalidPayload(_))
        ));
        assert!(matches!(
            decode_audio("aGVsbG8gd29ybGQ=", 4),
            Err(Error::PayloadTooLarge { limit: 4 })
        ));
    }
}
