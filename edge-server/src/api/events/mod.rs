//! Server-Sent-Events fan-out
//!
//! `GET /api/events?shift={id}` or `GET /api/events?table={id}`: one stream per
//! display, only events addressed to that scope. Each SSE message is named
//! after the event type and carries the `ScopedEvent` JSON.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::Stream;
use serde::Deserialize;
use shared::error::{AppError, AppResult};
use shared::event::EventScope;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/events", get(stream))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub shift: Option<String>,
    pub table: Option<String>,
}

impl EventsQuery {
    fn scope(self) -> AppResult<EventScope> {
        match (self.shift, self.table) {
            (Some(shift), None) => Ok(EventScope::Shift(shift)),
            (None, Some(table)) => Ok(EventScope::Table(table)),
            _ => Err(AppError::validation("exactly one of shift or table is required")),
        }
    }
}

async fn stream(
    State(state): State<ServerState>,
    Query(query): Query<EventsQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let scope = query.scope()?;
    tracing::debug!(?scope, "SSE subscriber connected");
    let rx = state.bus().subscribe_scope(scope);

    let events = futures::stream::unfold(rx, |mut rx| async move {
        let scoped = rx.recv().await?;
        let event = Event::default()
            .event(scoped.event.name())
            .json_data(&scoped)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to encode SSE event");
                Event::default().comment("encode error")
            });
        Some((Ok(event), rx))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_exactly_one_scope() {
        let q = EventsQuery {
            shift: Some("s1".into()),
            table: None,
        };
        assert_eq!(q.scope().unwrap(), EventScope::Shift("s1".into()));

        let both = EventsQuery {
            shift: Some("s1".into()),
            table: Some("T1".into()),
        };
        assert!(both.scope().is_err());
        let none = EventsQuery { shift: None, table: None };
        assert!(none.scope().is_err());
    }
}
