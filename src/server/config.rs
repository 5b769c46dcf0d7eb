//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default cap on uploaded audio payloads (100MB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Hard cap on client upload bodies, in bytes
    pub max_upload_size: usize,

    /// Base URL of the upstream renderer, e.g. `http://localhost:8085`
    pub renderer_base: Option<String>,

    /// Base URL of the answer synthesizer, if one is wired in
    pub answer_base: Option<String>,

    /// Public base URL of this relay, used to build the producer's
    /// frame-stream callback when forwarded headers are absent
    pub public_base: Option<String>,

    /// Timeout for forwarded renderer calls
    pub forward_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".parse().unwrap(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            renderer_base: None,
            answer_base: None,
            public_base: None,
            forward_timeout: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the upload size cap
    pub fn max_upload_size(mut self, size: usize) -> Self {
        self.max_upload_size = size;
        self
    }

    /// Set the upstream renderer base URL
    pub fn renderer_base(mut self, base: impl Into<String>) -> Self {
        self.renderer_base = Some(base.into());
        self
    }

    /// Set the answer synthesizer base URL
    pub fn answer_base(mut self, base: impl Into<String>) -> Self {
        self.answer_base = Some(base.into());
        self
    }

    /// Set the public base URL of this relay
    pub fn public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into());
        self
    }

    /// Set the forwarded-call timeout
    pub fn forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }
}
