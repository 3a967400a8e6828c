use std::convert::Infallible;

use async_stream::stream;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::error;

use crate::errors::AppError;
use crate::models::{now_timestamp, RelayEvent};
use crate::service::relay_service::RelayService;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// POST `/chat`: relays a chat turn as a Server-Sent Events stream.
///
/// The body is read raw so that every validation failure is reported in-band
/// as an `error` event rather than as an extractor rejection.
pub async fn chat_handler(State(relay): State<RelayService>, body: Bytes) -> impl IntoResponse {
    let events = relay.relay(&body);
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(frame_events(events)),
    )
}

/// Encodes relay events as SSE frames. The stream ends after the first
/// terminal event; an event that cannot be encoded ends it with a plain error
/// frame.
fn frame_events<S>(events: S) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = RelayEvent> + Send + 'static,
{
    frame_events_with(events, to_sse_event)
}

fn frame_events_with<S, F>(events: S, encode: F) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = RelayEvent> + Send + 'static,
    F: Fn(&RelayEvent) -> Result<Event, AppError> + Send + 'static,
{
    stream! {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            match encode(&event) {
                Ok(frame) => {
                    yield Ok(frame);
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(e) => {
                    error!("dropping chat stream: {e}");
                    yield Ok(encoding_failure_frame(&e));
                    break;
                }
            }
        }
    }
}

fn to_sse_event(event: &RelayEvent) -> Result<Event, AppError> {
    Event::default()
        .event(event.event_name())
        .json_data(event)
        .map_err(|e| AppError::Serialization { message: e.to_string() })
}

fn encoding_failure_frame(err: &AppError) -> Event {
    let payload = json!({
        "type": "error",
        "error": err.to_string(),
        "timestamp": now_timestamp(),
    });
    Event::default().event("error").data(payload.to_string())
}
