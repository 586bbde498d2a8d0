use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vacancy_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VacancyStatus {
    Active,
    Inactive,
}

impl VacancyStatus {
    pub fn from_active(active: bool) -> Self {
        if active {
            VacancyStatus::Active
        } else {
            VacancyStatus::Inactive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Vacancy {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub spots_total: i32,
    pub spots_taken: i32,
    pub status: VacancyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vacancy {
    pub fn spots_left(&self) -> i32 {
        (self.spots_total - self.spots_taken).max(0)
    }

    pub fn is_active(&self) -> bool {
        self.status == VacancyStatus::Active
    }

    pub fn is_full(&self) -> bool {
        self.spots_left() == 0
    }

    /// Active and with at least one free seat.
    pub fn is_open(&self) -> bool {
        self.is_active() && !self.is_full()
    }

    pub fn seats(&self) -> VacancySeats {
        VacancySeats {
            vacancy_id: self.id,
            spots_total: self.spots_total,
            spots_taken: self.spots_taken,
            spots_left: self.spots_left(),
            status: self.status,
        }
    }
}

/// Seat counters exposed next to every transition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancySeats {
    pub vacancy_id: Uuid,
    pub spots_total: i32,
    pub spots_taken: i32,
    pub spots_left: i32,
    pub status: VacancyStatus,
}

#[derive(Debug, Clone)]
pub struct NewVacancy {
    pub company_id: Uuid,
    pub title: String,
    pub spots_total: i32,
    pub status: VacancyStatus,
}
