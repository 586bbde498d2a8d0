use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    allocation::ActorRole,
    dto::{
        application_dto::{ApplicationListResponse, ApplicationResponse},
        vacancy_dto::{
            CreateVacancyPayload, ToggleStatusPayload, UpdateCapacityPayload,
            VacancyPublicListResponse, VacancyPublicQuery, VacancyResponse,
        },
    },
    error::{Error, Result},
    middleware::actor::CurrentActor,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/company/vacancies",
    request_body = CreateVacancyPayload,
    responses(
        (status = 201, description = "Vacancy created", body = VacancyResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Caller may not create vacancies for this company")
    )
)]
#[axum::debug_handler]
pub async fn create_vacancy(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(payload): Json<CreateVacancyPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let company_id = match (actor.role, payload.company_id) {
        (ActorRole::Admin, Some(company_id)) => company_id,
        (ActorRole::Admin, None) => {
            return Err(Error::BadRequest(
                "company_id is required when an admin creates a vacancy".to_string(),
            ))
        }
        _ => actor.id,
    };
    let vacancy = state
        .coordinator
        .create_vacancy(
            actor,
            company_id,
            payload.title.trim().to_string(),
            payload.spots_total,
            payload.active,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(VacancyResponse::from(vacancy))))
}

#[utoipa::path(
    patch,
    path = "/api/company/vacancies/{id}/capacity",
    params(
        ("id" = Uuid, Path, description = "Vacancy ID")
    ),
    request_body = UpdateCapacityPayload,
    responses(
        (status = 200, description = "Capacity updated", body = VacancyResponse),
        (status = 404, description = "Vacancy not found"),
        (status = 422, description = "Capacity below seats already taken")
    )
)]
#[axum::debug_handler]
pub async fn resize_vacancy(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCapacityPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let vacancy = state
        .coordinator
        .resize_vacancy(actor, id, payload.spots_total)
        .await?;
    Ok(Json(VacancyResponse::from(vacancy)))
}

#[utoipa::path(
    patch,
    path = "/api/company/vacancies/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Vacancy ID")
    ),
    request_body = ToggleStatusPayload,
    responses(
        (status = 200, description = "Status updated", body = VacancyResponse),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn toggle_vacancy_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    Json(payload): Json<ToggleStatusPayload>,
) -> Result<impl IntoResponse> {
    let vacancy = state
        .coordinator
        .toggle_status(actor, id, payload.active)
        .await?;
    Ok(Json(VacancyResponse::from(vacancy)))
}

#[utoipa::path(
    get,
    path = "/api/company/vacancies/{id}/applications",
    params(
        ("id" = Uuid, Path, description = "Vacancy ID")
    ),
    responses(
        (status = 200, description = "Applications for the vacancy", body = ApplicationListResponse),
        (status = 403, description = "Vacancy belongs to another company"),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn list_vacancy_applications(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let items = state
        .coordinator
        .applications_for_vacancy(actor, id)
        .await?
        .into_iter()
        .map(ApplicationResponse::from)
        .collect();
    Ok(Json(ApplicationListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/vacancies",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of vacancies (1-100)")
    ),
    responses(
        (status = 200, description = "Active vacancies with free seats", body = VacancyPublicListResponse)
    )
)]
#[axum::debug_handler]
pub async fn list_open_vacancies(
    State(state): State<AppState>,
    Query(query): Query<VacancyPublicQuery>,
) -> Result<impl IntoResponse> {
    let items = state
        .coordinator
        .open_vacancies(query.limit.unwrap_or(20))
        .await?
        .into_iter()
        .map(VacancyResponse::from)
        .collect();
    Ok(Json(VacancyPublicListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/api/vacancies/{id}",
    params(
        ("id" = Uuid, Path, description = "Vacancy ID")
    ),
    responses(
        (status = 200, description = "Vacancy with seat counters", body = VacancyResponse),
        (status = 404, description = "Vacancy not found")
    )
)]
#[axum::debug_handler]
pub async fn get_vacancy(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let vacancy = state.coordinator.vacancy(id).await?;
    Ok(Json(VacancyResponse::from(vacancy)))
}
