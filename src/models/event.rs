use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::application::{Application, ApplicationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "allocation_event_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ApplicationSubmitted,
    ApplicationReviewed,
    OfferIssued,
    ApplicationRejected,
    OfferAccepted,
    OfferDeclined,
    OfferExpired,
    ApplicationWithdrawn,
    PlacementClosed,
}

/// Outbox row describing a committed transition; notification delivery reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AllocationEvent {
    pub sequence: i64,
    pub kind: EventKind,
    pub application_id: Uuid,
    pub vacancy_id: Uuid,
    pub student_id: Uuid,
    pub status: ApplicationStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event before the store assigns its sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub kind: EventKind,
    pub application_id: Uuid,
    pub vacancy_id: Uuid,
    pub student_id: Uuid,
    pub status: ApplicationStatus,
    pub occurred_at: DateTime<Utc>,
}

impl PendingEvent {
    pub fn for_application(kind: EventKind, application: &Application, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            application_id: application.id,
            vacancy_id: application.vacancy_id,
            student_id: application.student_id,
            status: application.status,
            occurred_at: at,
        }
    }

    pub fn into_event(self, sequence: i64) -> AllocationEvent {
        AllocationEvent {
            sequence,
            kind: self.kind,
            application_id: self.application_id,
            vacancy_id: self.vacancy_id,
            student_id: self.student_id,
            status: self.status,
            occurred_at: self.occurred_at,
        }
    }
}
