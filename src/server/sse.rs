//! Session signal push channel
//!
//! A long-lived `text/event-stream` response announcing session signal
//! transitions — today only `finished`, but any named event the hub
//! broadcasts is forwarded as-is. Dropping the connection drops the
//! subscriber's queue out of the registry.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use super::routes::AppState;

/// Handle one `GET /events` subscriber
pub async fn events(
    State(app): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = app.relay.subscribe_events();
    tracing::debug!("event subscriber connected");

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(Event::default()
            .event(event.name)
            .data(event.data.to_string()))),
        // A lagged subscriber loses the dropped events but keeps the
        // connection; the broadcaster was never blocked.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
