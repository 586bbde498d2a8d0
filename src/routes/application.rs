use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    allocation::{ActorRole, AllocationError},
    dto::application_dto::{
        ApplicationListResponse, ApplicationResponse, ApplyPayload, ClosePlacementPayload,
        IssueOfferPayload, StudentApplicationsQuery, SweepQuery, TransitionResponse,
    },
    error::Result,
    middleware::actor::CurrentActor,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/student/applications",
    request_body = ApplyPayload,
    responses(
        (status = 201, description = "Application submitted", body = TransitionResponse),
        (status = 404, description = "Vacancy not found"),
        (status = 409, description = "Vacancy not open or already applied")
    )
)]
#[axum::debug_handler]
pub async fn apply(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(payload): Json<ApplyPayload>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.apply(actor, payload.vacancy_id).await?;
    Ok((StatusCode::CREATED, Json(TransitionResponse::from(outcome))))
}

#[utoipa::path(
    get,
    path = "/api/student/applications",
    params(
        ("status" = Option<String>, Query, description = "Only applications in this status, e.g. oferta")
    ),
    responses(
        (status = 200, description = "The caller's applications", body = ApplicationListResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_my_applications(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<StudentApplicationsQuery>,
) -> Result<impl IntoResponse> {
    let items = state
        .coordinator
        .applications_for_student(actor, query.status)
        .await?
        .into_iter()
        .map(ApplicationResponse::from)
        .collect();
    Ok(Json(ApplicationListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/applications/{id}",
    params(
        ("id" = Uuid, Path, description = "Application ID")
    ),
    responses(
        (status = 200, description = "Application", body = ApplicationResponse),
        (status = 403, description = "Not the caller's application"),
        (status = 404, description = "Application not found")
    )
)]
#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let application = state.coordinator.application(actor, id).await?;
    Ok(Json(ApplicationResponse::from(application)))
}

#[utoipa::path(
    post,
    path = "/api/student/applications/{id}/accept",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Offer accepted, seat reserved", body = TransitionResponse),
        (status = 409, description = "Offer expired, vacancy full or student already placed")
    )
)]
#[axum::debug_handler]
pub async fn accept_offer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.accept_offer(actor, id).await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/student/applications/{id}/decline",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Offer declined", body = TransitionResponse),
        (status = 409, description = "No open offer")
    )
)]
#[axum::debug_handler]
pub async fn decline_offer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.decline_offer(actor, id).await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

/// Shared by the student portal and the company console.
#[utoipa::path(
    post,
    path = "/api/applications/{id}/withdraw",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application withdrawn", body = TransitionResponse),
        (status = 409, description = "Application already closed")
    )
)]
#[axum::debug_handler]
pub async fn withdraw(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.withdraw(actor, id).await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/review",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application moved to postulada", body = TransitionResponse)
    )
)]
#[axum::debug_handler]
pub async fn review(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.review(actor, id).await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/offer",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = IssueOfferPayload,
    responses(
        (status = 200, description = "Offer issued", body = TransitionResponse),
        (status = 409, description = "Vacancy inactive or full"),
        (status = 422, description = "Offer window out of range")
    )
)]
#[axum::debug_handler]
pub async fn issue_offer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<IssueOfferPayload>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.issue_offer(actor, id, payload.days).await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/reject",
    params(("id" = Uuid, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application rejected", body = TransitionResponse)
    )
)]
#[axum::debug_handler]
pub async fn reject(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.coordinator.reject(actor, id).await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/company/applications/{id}/close",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = ClosePlacementPayload,
    responses(
        (status = 200, description = "Placement closed, seat released", body = TransitionResponse),
        (status = 409, description = "Application is not an active placement")
    )
)]
#[axum::debug_handler]
pub async fn close_placement(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ClosePlacementPayload>,
) -> Result<impl IntoResponse> {
    let outcome = state
        .coordinator
        .close_placement(actor, id, payload.outcome)
        .await?;
    Ok(Json(TransitionResponse::from(outcome)))
}

#[utoipa::path(
    post,
    path = "/api/admin/offers/sweep",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum offers to examine")
    ),
    responses(
        (status = 200, description = "Overdue offers expired"),
        (status = 403, description = "Admins only")
    )
)]
#[axum::debug_handler]
pub async fn sweep_expired_offers(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<SweepQuery>,
) -> Result<impl IntoResponse> {
    if actor.role != ActorRole::Admin {
        return Err(AllocationError::Forbidden.into());
    }
    let report = state
        .coordinator
        .sweep_expired_offers(query.limit.unwrap_or(state.sweep_batch))
        .await?;
    Ok(Json(report))
}
