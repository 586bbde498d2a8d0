pub mod application;
pub mod events;
pub mod health;
pub mod vacancy;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::middleware::rate_limit::{new_rps_state, rps_middleware};
use crate::AppState;

/// Requests per second allowed on each router group.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub public_rps: u32,
    pub integration_rps: u32,
}

pub fn router(state: AppState, limits: RateLimits) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let company_api = Router::new()
        .route("/api/company/vacancies", post(vacancy::create_vacancy))
        .route(
            "/api/company/vacancies/:id/capacity",
            patch(vacancy::resize_vacancy),
        )
        .route(
            "/api/company/vacancies/:id/status",
            patch(vacancy::toggle_vacancy_status),
        )
        .route(
            "/api/company/vacancies/:id/applications",
            get(vacancy::list_vacancy_applications),
        )
        .route(
            "/api/company/applications/:id/review",
            post(application::review),
        )
        .route(
            "/api/company/applications/:id/offer",
            post(application::issue_offer),
        )
        .route(
            "/api/company/applications/:id/reject",
            post(application::reject),
        )
        .route(
            "/api/company/applications/:id/close",
            post(application::close_placement),
        )
        .route(
            "/api/admin/offers/sweep",
            post(application::sweep_expired_offers),
        )
        .route(
            "/api/integration/events",
            get(events::list_events),
        )
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(limits.integration_rps),
            rps_middleware,
        ));

    let student_api = Router::new()
        .route("/api/vacancies", get(vacancy::list_open_vacancies))
        .route("/api/vacancies/:id", get(vacancy::get_vacancy))
        .route(
            "/api/student/applications",
            get(application::list_my_applications).post(application::apply),
        )
        .route(
            "/api/student/applications/:id/accept",
            post(application::accept_offer),
        )
        .route(
            "/api/student/applications/:id/decline",
            post(application::decline_offer),
        )
        .route("/api/applications/:id", get(application::get_application))
        .route(
            "/api/applications/:id/withdraw",
            post(application::withdraw),
        )
        .layer(axum::middleware::from_fn_with_state(
            new_rps_state(limits.public_rps),
            rps_middleware,
        ));

    base_routes
        .merge(company_api)
        .merge(student_api)
        .with_state(state)
}
