use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::docker::container::{LogEvent, PullEvent};

// ============================================================================
// SSE conversions for streamed endpoints
// ============================================================================

pub fn pull_event_to_sse(event: PullEvent) -> Result<Event, Infallible> {
    let event_type = match &event {
        PullEvent::Progress(_) => "progress",
        PullEvent::Error { .. } => "error",
        PullEvent::Complete { .. } => "complete",
    };

    Ok(Event::default()
        .event(event_type)
        .data(serde_json::to_string(&event).unwrap_or_default()))
}

pub fn log_event_to_sse(event: LogEvent) -> Result<Event, Infallible> {
    let event_type = match &event {
        LogEvent::StdOut { .. } => "stdout",
        LogEvent::StdErr { .. } => "stderr",
        LogEvent::Error { .. } => "error",
        LogEvent::Eof => "eof",
    };

    Ok(Event::default()
        .event(event_type)
        .data(serde_json::to_string(&event).unwrap_or_default()))
}

pub fn create_sse_response<S, E>(
    stream: S,
    convert: fn(E) -> Result<Event, Infallible>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = E> + Send + 'static,
    E: 'static,
{
    use futures::StreamExt;

    Sse::new(stream.map(convert)).keep_alive(KeepAlive::default())
}
