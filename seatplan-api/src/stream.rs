use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::stream::{self, Stream, StreamExt};
use seatplan_shared::AssignmentEvent;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events/{event_id}/stream", get(event_stream))
}

/// GET /v1/events/{event_id}/stream
/// Server-sent events for every seating and lodging change of the event.
async fn event_stream(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state.registry.session(&event_id).await?;
    let (seating_rx, lodging_rx) = {
        let session = session.lock().await;
        (session.seating.subscribe(), session.lodging.subscribe())
    };
    debug!("Client subscribed to change stream of event {}", event_id);

    let changes = stream::select(
        BroadcastStream::new(seating_rx),
        BroadcastStream::new(lodging_rx),
    )
    .filter_map(move |result| {
        let event_id = event_id.clone();
        async move {
            match result {
                Ok(change) => to_sse_event(&change).map(Ok::<_, Infallible>),
                Err(lagged) => {
                    warn!("Change stream of event {} fell behind: {}", event_id, lagged);
                    None
                }
            }
        }
    });

    Ok(Sse::new(changes).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

fn to_sse_event(change: &AssignmentEvent) -> Option<Event> {
    match Event::default().event(change.name()).json_data(change) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to encode {} event: {}", change.name(), e);
            None
        }
    }
}
