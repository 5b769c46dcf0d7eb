//! Runnable relay server
//!
//! Configuration comes from the environment:
//!
//! - `RELAY_BIND` — listen address (default `0.0.0.0:5000`)
//! - `RENDERER_URL` — upstream renderer base, e.g. `http://localhost:8085`
//! - `ANSWER_URL` — answer synthesizer base (optional)
//! - `PUBLIC_BASE` — public base URL of this relay (optional)
//! - `PULL_MJPEG` — pull frames from `<base>/mjpeg_stream` instead of
//!   waiting for NDJSON frame batches (optional)
//! - `FRAME_CAPACITY` — frame buffer capacity (default 3000)
//!
//! Run with: `cargo run --example relay_server`

use std::sync::Arc;

use avatar_relay::ingest::MjpegPuller;
use avatar_relay::relay::RelayConfig;
use avatar_relay::server::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> avatar_relay::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_relay=info,relay_server=info".into()),
        )
        .init();

    let mut config = ServerConfig::default();
    if let Ok(bind) = std::env::var("RELAY_BIND") {
        config = config.bind(bind.parse().expect("RELAY_BIND must be host:port"));
    }
    if let Ok(base) = std::env::var("RENDERER_URL") {
        config = config.renderer_base(base);
    }
    if let Ok(base) = std::env::var("ANSWER_URL") {
        config = config.answer_base(base);
    }
    if let Ok(base) = std::env::var("PUBLIC_BASE") {
        config = config.public_base(base);
    }

    let mut relay_config = RelayConfig::default();
    if let Ok(capacity) = std::env::var("FRAME_CAPACITY") {
        relay_config =
            relay_config.frame_capacity(capacity.parse().expect("FRAME_CAPACITY must be a number"));
    }

    let server = RelayServer::with_relay_config(config, relay_config);

    if let Ok(upstream) = std::env::var("PULL_MJPEG") {
        let state = Arc::clone(server.state());
        tokio::spawn(async move {
            let puller = MjpegPuller::new(reqwest::Client::new(), &upstream);
            if let Err(error) = puller.run(&state).await {
                tracing::error!(%error, "mjpeg pull ingest ended with error");
            }
        });
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
