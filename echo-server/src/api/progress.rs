use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use serde_json::Value;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::{
    api::ApiResult,
    db::repositories::UserRepository,
    progress::{count_update, COUNT_UPDATE_TOPIC},
    state::AppState,
};

fn to_event(value: &Value) -> Event {
    let event_type = value
        .get("type")
        .and_then(|t| t.as_str())
        .unwrap_or("message");
    Event::default().event(event_type).data(value.to_string())
}

/// GET /progress - Server-sent `count-update` events, starting with the current total
pub async fn stream_progress(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before reading the snapshot so no update falls in between
    let rx = state.hub.subscribe(COUNT_UPDATE_TOPIC).await;
    let total = UserRepository::new(state.db.pool.clone()).count()?;

    let snapshot = tokio_stream::once(Ok::<_, Infallible>(to_event(&count_update(total))));
    let updates = BroadcastStream::new(rx).map(|result| match result {
        Ok(value) => Ok::<_, Infallible>(to_event(&value)),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => Ok(Event::default()
            .event("lagged")
            .data(format!("{{\"skipped\":{}}}", skipped))),
    });

    Ok(Sse::new(snapshot.chain(updates)).keep_alive(KeepAlive::default()))
}
