use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::AllocationResult;
use super::state_machine::{Actor, Transition};
use crate::models::application::{Application, ApplicationStatus};
use crate::models::event::AllocationEvent;
use crate::models::vacancy::{NewVacancy, Vacancy, VacancySeats};

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub application: Application,
    pub seats: VacancySeats,
    /// False when the request was a no-op, e.g. expiring an offer that was already settled.
    #[serde(skip)]
    pub changed: bool,
}

/// Capacity-affecting edits a company makes to its own vacancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VacancyChange {
    Status { active: bool },
    Capacity { spots_total: i32 },
}

/// Unit of atomicity for the allocation engine.
///
/// Every mutating method loads, validates and persists the application, the vacancy
/// counters and the outbox events as one indivisible step. Calls touching the same
/// vacancy are serialized; calls on different vacancies are not.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AllocationStore: Send + Sync {
    async fn create_vacancy(&self, vacancy: NewVacancy, now: DateTime<Utc>) -> AllocationResult<Vacancy>;

    async fn update_vacancy(
        &self,
        vacancy_id: Uuid,
        actor: Actor,
        change: VacancyChange,
        now: DateTime<Utc>,
    ) -> AllocationResult<Vacancy>;

    async fn vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vacancy>;

    async fn open_vacancies(&self, limit: i64) -> AllocationResult<Vec<Vacancy>>;

    async fn apply(
        &self,
        student_id: Uuid,
        vacancy_id: Uuid,
        now: DateTime<Utc>,
    ) -> AllocationResult<TransitionOutcome>;

    async fn transition(
        &self,
        application_id: Uuid,
        actor: Actor,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AllocationResult<TransitionOutcome>;

    async fn application(&self, application_id: Uuid) -> AllocationResult<Application>;

    async fn applications_for_vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vec<Application>>;

    async fn applications_for_student(
        &self,
        student_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> AllocationResult<Vec<Application>>;

    /// Offers whose deadline has passed, oldest deadline first.
    async fn overdue_offers(&self, now: DateTime<Utc>, limit: i64) -> AllocationResult<Vec<Uuid>>;

    async fn events_after(&self, sequence: i64, limit: i64) -> AllocationResult<Vec<AllocationEvent>>;
}
