use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::allocation::{PlacementOutcome, TransitionOutcome};
use crate::models::application::{Application, ApplicationStatus, Decision};
use crate::models::event::AllocationEvent;
use crate::models::vacancy::VacancySeats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyPayload {
    pub vacancy_id: Uuid,
}

/// `days` falls back to the configured default offer window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueOfferPayload {
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosePlacementPayload {
    pub outcome: PlacementOutcome,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StudentApplicationsQuery {
    pub status: Option<ApplicationStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsQuery {
    pub after: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub vacancy_id: Uuid,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub decision: Option<Decision>,
    pub decision_at: Option<DateTime<Utc>>,
    pub auto_declined: bool,
}

impl From<Application> for ApplicationResponse {
    fn from(value: Application) -> Self {
        Self {
            id: value.id,
            student_id: value.student_id,
            vacancy_id: value.vacancy_id,
            status: value.status,
            applied_at: value.applied_at,
            offer_expires_at: value.offer_expires_at,
            decision: value.decision,
            decision_at: value.decision_at,
            auto_declined: value.auto_declined,
        }
    }
}

/// New application state plus the vacancy's seat counters after the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub application: ApplicationResponse,
    pub vacancy: VacancySeats,
}

impl From<TransitionOutcome> for TransitionResponse {
    fn from(value: TransitionOutcome) -> Self {
        Self {
            application: value.application.into(),
            vacancy: value.seats,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationListResponse {
    pub items: Vec<ApplicationResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListResponse {
    pub items: Vec<AllocationEvent>,
    pub next_after: i64,
}
