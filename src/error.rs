//! Crate error types
//!
//! Errors local to one frame, line, or multipart part are absorbed at the
//! decode site and never reach this type; `Error` covers the failures that
//! terminate a whole ingest or egress channel, plus client-boundary
//! rejections and upstream passthrough.

/// Error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// Transport-level IO failure
    Io(std::io::Error),
    /// Outbound HTTP transport failure (connection reset, DNS, timeout)
    Http(reqwest::Error),
    /// Malformed stream framing: wrong content type, bad multipart headers
    InvalidStream(String),
    /// Client-supplied payload failed validation at the boundary
    InvalidPayload(String),
    /// Client payload exceeded the configured limit
    PayloadTooLarge {
        /// The limit that was exceeded, in bytes
        limit: usize,
    },
    /// Upstream answered with a non-success status; body kept for diagnosis
    Upstream {
        /// HTTP status returned by the upstream service
        status: u16,
        /// Upstream response body, passed through for the caller
        body: String,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "io error: {}", e),
            Error::Http(e) => write!(f, "http transport error: {}", e),
            Error::InvalidStream(msg) => write!(f, "invalid stream: {}", msg),
            Error::InvalidPayload(msg) => write!(f, "invalid payload: {}", msg),
            Error::PayloadTooLarge { limit } => {
                write!(f, "payload exceeds limit of {} bytes", limit)
            }
            Error::Upstream { status, body } => {
                write!(f, "upstream returned status {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

/// Result alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;
