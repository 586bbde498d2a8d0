use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};

use crate::{
    allocation::{ActorRole, AllocationError},
    dto::application_dto::{EventListResponse, EventsQuery},
    error::Result,
    middleware::actor::CurrentActor,
    AppState,
};

/// Outbox feed for the notification worker. Consumers resume from `next_after`.
#[utoipa::path(
    get,
    path = "/api/integration/events",
    params(
        ("after" = Option<i64>, Query, description = "Return events with a greater sequence"),
        ("limit" = Option<i64>, Query, description = "Page size (1-500)")
    ),
    responses(
        (status = 200, description = "Allocation events in sequence order", body = EventListResponse),
        (status = 403, description = "Admins only")
    )
)]
#[axum::debug_handler]
pub async fn list_events(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse> {
    if actor.role != ActorRole::Admin {
        return Err(AllocationError::Forbidden.into());
    }
    let after = query.after.unwrap_or(0);
    let items = state
        .coordinator
        .events_after(after, query.limit.unwrap_or(100))
        .await?;
    let next_after = items.last().map_or(after, |event| event.sequence);
    Ok(Json(EventListResponse { items, next_after }))
}
