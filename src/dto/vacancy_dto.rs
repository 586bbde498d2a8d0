use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::vacancy::{Vacancy, VacancyStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVacancyPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(range(min = 1, max = 10000))]
    pub spots_total: Option<i32>,
    pub active: Option<bool>,
    /// Only honored for admins; companies always create for themselves.
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCapacityPayload {
    #[validate(range(min = 1, max = 10000))]
    pub spots_total: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleStatusPayload {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyResponse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub spots_total: i32,
    pub spots_taken: i32,
    pub spots_left: i32,
    pub status: VacancyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VacancyPublicListResponse {
    pub items: Vec<VacancyResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VacancyPublicQuery {
    pub limit: Option<i64>,
}

impl From<Vacancy> for VacancyResponse {
    fn from(value: Vacancy) -> Self {
        Self {
            spots_left: value.spots_left(),
            id: value.id,
            company_id: value.company_id,
            title: value.title,
            spots_total: value.spots_total,
            spots_taken: value.spots_taken,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
