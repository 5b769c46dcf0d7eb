//! Upstream MJPEG pull ingest
//!
//! Opens an outbound connection to the renderer's multipart image stream
//! and actively parses it: scan to the boundary marker, read header lines
//! to a blank line, take the declared `Content-Length`, read exactly that
//! many payload bytes, discard the trailing line terminator. A part without
//! a declared length is skipped wholesale — no length guessing.
//!
//! This is the higher-throughput alternative to base64 frame entries over
//! NDJSON. While it runs, the shared state drops NDJSON frame batches to
//! avoid duplicate delivery; NDJSON control messages stay authoritative.

use bytes::{Buf, Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::error::{Error, Result};
use crate::relay::{Frame, FrameSource, RelayState};

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    /// Scanning for the next boundary line
    Boundary,
    /// Reading part headers until a blank line
    Headers { content_length: Option<usize> },
    /// Collecting exactly `need` payload bytes
    Body { need: usize },
    /// Discarding the line terminator after a payload
    Trailer,
}

/// Incremental decoder for one `multipart/x-mixed-replace` byte stream
///
/// Assigns sequence numbers locally, starting at 0, one per successfully
/// parsed part.
#[derive(Debug)]
pub struct MultipartFrameDecoder {
    marker: Vec<u8>,
    buf: BytesMut,
    state: DecodeState,
    next_sequence: u64,
}

impl MultipartFrameDecoder {
    /// Create a decoder for the given boundary token (without dashes)
    pub fn new(boundary: &str) -> Self {
        Self {
            marker: format!("--{}", boundary).into_bytes(),
            buf: BytesMut::new(),
            state: DecodeState::Boundary,
            next_sequence: 0,
        }
    }

    /// Parts successfully decoded so far
    pub fn frames_decoded(&self) -> u64 {
        self.next_sequence
    }

    /// Feed one chunk; returns the frames completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            match self.state {
                DecodeState::Boundary => {
                    let Some(line) = take_line(&mut self.buf) else {
                        break;
                    };
                    if line.starts_with(&self.marker) {
                        self.state = DecodeState::Headers {
                            content_length: None,
                        };
                    }
                }
                DecodeState::Headers { content_length } => {
                    let Some(line) = take_line(&mut self.buf) else {
                        break;
                    };
                    if line.is_empty() {
                        match content_length {
                            Some(need) => self.state = DecodeState::Body { need },
                            None => {
                                tracing::warn!("multipart part without content length; skipping");
                                self.state = DecodeState::Boundary;
                            }
                        }
                    } else if let Some(length) = parse_content_length(&line) {
                        self.state = DecodeState::Headers {
                            content_length: Some(length),
                        };
                    }
                }
                DecodeState::Body { need } => {
                    if self.buf.len() < need {
                        break;
                    }
                    let payload: Bytes = self.buf.split_to(need).freeze();
                    frames.push(Frame::new(self.next_sequence, payload));
                    self.next_sequence += 1;
                    self.state = DecodeState::Trailer;
                }
                DecodeState::Trailer => {
                    if self.buf.is_empty() {
                        break;
                    }
                    if self.buf[0] == b'\r' {
                        if self.buf.len() < 2 {
                            break; // wait for the rest of the CRLF
                        }
                        let skip = if self.buf[1] == b'\n' { 2 } else { 1 };
                        self.buf.advance(skip);
                    } else if self.buf[0] == b'\n' {
                        self.buf.advance(1);
                    }
                    self.state = DecodeState::Boundary;
                }
            }
        }
        frames
    }
}

/// Take one `\n`-terminated line off the buffer, stripping a trailing `\r`
fn take_line(buf: &mut BytesMut) -> Option<BytesMut> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line = buf.split_to(pos);
    buf.advance(1);
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    Some(line)
}

fn parse_content_length(line: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(line).ok()?;
    let (name, value) = text.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}

/// Extract the `boundary` parameter from a multipart content type
pub fn boundary_param(content_type: &str) -> Option<String> {
    for part in content_type.split(';') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// Pulls the upstream multipart image stream into the relay
pub struct MjpegPuller {
    client: reqwest::Client,
    url: String,
}

impl MjpegPuller {
    /// `base` is the upstream service root, e.g. `http://localhost:8085`
    pub fn new(client: reqwest::Client, base: &str) -> Self {
        let url = format!("{}/mjpeg_stream", base.trim_end_matches('/'));
        Self { client, url }
    }

    /// Connect and relay frames until the upstream closes or fails
    ///
    /// A transport loss terminates only this ingest path; frames already
    /// appended stay in the buffer. No automatic reconnect.
    pub async fn run(&self, state: &RelayState) -> Result<()> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.contains("multipart/x-mixed-replace") {
            return Err(Error::InvalidStream(format!(
                "unexpected upstream content type: {}",
                content_type
            )));
        }
        let boundary = boundary_param(&content_type).ok_or_else(|| {
            Error::InvalidStream("upstream content type missing boundary parameter".into())
        })?;

        tracing::info!(url = %self.url, %boundary, "pulling upstream mjpeg stream");

        state.begin_pull().await;
        let result = self.pump(state, response, &boundary).await;
        state.end_pull().await;
        result
    }

    async fn pump(
        &self,
        state: &RelayState,
        response: reqwest::Response,
        boundary: &str,
    ) -> Result<()> {
        let mut decoder = MultipartFrameDecoder::new(boundary);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let frames = decoder.push(&chunk);
            if !frames.is_empty() {
                state.append_frames(frames, FrameSource::MjpegPull).await;
            }
        }

        tracing::info!(
            frames = decoder.frames_decoded(),
            "upstream mjpeg stream ended"
        );
        Ok(())
    }
}
