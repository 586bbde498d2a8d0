use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::error::{AllocationError, AllocationResult};
use super::expiry;
use super::state_machine::{Actor, ActorRole, PlacementOutcome, Transition};
use super::store::{AllocationStore, TransitionOutcome, VacancyChange};
use crate::models::application::{Application, ApplicationStatus};
use crate::models::event::AllocationEvent;
use crate::models::vacancy::{NewVacancy, Vacancy, VacancyStatus};
use crate::utils::time::Clock;

/// Offer window limits, in days.
#[derive(Debug, Clone, Copy)]
pub struct OfferPolicy {
    pub default_days: u32,
    pub max_days: u32,
}

impl Default for OfferPolicy {
    fn default() -> Self {
        Self {
            default_days: 5,
            max_days: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
}

/// Single entry point for everything that touches seats or application status.
#[derive(Clone)]
pub struct AllocationCoordinator {
    store: Arc<dyn AllocationStore>,
    clock: Arc<dyn Clock>,
    policy: OfferPolicy,
}

impl AllocationCoordinator {
    pub fn new(store: Arc<dyn AllocationStore>, clock: Arc<dyn Clock>, policy: OfferPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> OfferPolicy {
        self.policy
    }

    pub async fn create_vacancy(
        &self,
        actor: Actor,
        company_id: Uuid,
        title: String,
        spots_total: Option<i32>,
        active: Option<bool>,
    ) -> AllocationResult<Vacancy> {
        let allowed = match actor.role {
            ActorRole::Company => actor.id == company_id,
            ActorRole::Admin => true,
            _ => false,
        };
        if !allowed {
            return Err(AllocationError::Forbidden);
        }
        let spots_total = spots_total.unwrap_or(1);
        if spots_total < 1 {
            return Err(AllocationError::InvalidCapacity(
                "spots_total must be at least 1".to_string(),
            ));
        }

        let vacancy = self
            .store
            .create_vacancy(
                NewVacancy {
                    company_id,
                    title,
                    spots_total,
                    status: VacancyStatus::from_active(active.unwrap_or(true)),
                },
                self.clock.now(),
            )
            .await?;
        tracing::info!(vacancy_id = %vacancy.id, company_id = %company_id, spots_total, "vacancy created");
        Ok(vacancy)
    }

    pub async fn toggle_status(&self, actor: Actor, vacancy_id: Uuid, active: bool) -> AllocationResult<Vacancy> {
        self.change_vacancy(actor, vacancy_id, VacancyChange::Status { active })
            .await
    }

    pub async fn resize_vacancy(
        &self,
        actor: Actor,
        vacancy_id: Uuid,
        spots_total: i32,
    ) -> AllocationResult<Vacancy> {
        self.change_vacancy(actor, vacancy_id, VacancyChange::Capacity { spots_total })
            .await
    }

    async fn change_vacancy(
        &self,
        actor: Actor,
        vacancy_id: Uuid,
        change: VacancyChange,
    ) -> AllocationResult<Vacancy> {
        let result = self
            .store
            .update_vacancy(vacancy_id, actor, change, self.clock.now())
            .await;
        match &result {
            Ok(vacancy) => tracing::info!(
                vacancy_id = %vacancy_id,
                spots_total = vacancy.spots_total,
                spots_taken = vacancy.spots_taken,
                status = ?vacancy.status,
                "vacancy updated"
            ),
            Err(err) => self.report(err, vacancy_id, "update_vacancy"),
        }
        result
    }

    pub async fn vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vacancy> {
        self.store.vacancy(vacancy_id).await
    }

    pub async fn open_vacancies(&self, limit: i64) -> AllocationResult<Vec<Vacancy>> {
        self.store.open_vacancies(limit.clamp(1, 100)).await
    }

    pub async fn apply(&self, actor: Actor, vacancy_id: Uuid) -> AllocationResult<TransitionOutcome> {
        if actor.role != ActorRole::Student {
            return Err(AllocationError::Forbidden);
        }
        let result = self.store.apply(actor.id, vacancy_id, self.clock.now()).await;
        match &result {
            Ok(outcome) => tracing::info!(
                application_id = %outcome.application.id,
                vacancy_id = %vacancy_id,
                student_id = %actor.id,
                "application submitted"
            ),
            Err(err) => self.report(err, vacancy_id, "apply"),
        }
        result
    }

    pub async fn review(&self, actor: Actor, application_id: Uuid) -> AllocationResult<TransitionOutcome> {
        self.execute(actor, application_id, Transition::Review).await
    }

    /// Issues an offer valid for `days` (the configured default when `None`).
    pub async fn issue_offer(
        &self,
        actor: Actor,
        application_id: Uuid,
        days: Option<u32>,
    ) -> AllocationResult<TransitionOutcome> {
        let days = days.unwrap_or(self.policy.default_days);
        if days == 0 || days > self.policy.max_days {
            return Err(AllocationError::InvalidOfferWindow {
                days,
                max: self.policy.max_days,
            });
        }
        self.execute(actor, application_id, Transition::IssueOffer { days })
            .await
    }

    pub async fn reject(&self, actor: Actor, application_id: Uuid) -> AllocationResult<TransitionOutcome> {
        self.execute(actor, application_id, Transition::Reject).await
    }

    pub async fn accept_offer(&self, actor: Actor, application_id: Uuid) -> AllocationResult<TransitionOutcome> {
        self.execute(actor, application_id, Transition::AcceptOffer)
            .await
    }

    pub async fn decline_offer(&self, actor: Actor, application_id: Uuid) -> AllocationResult<TransitionOutcome> {
        self.execute(actor, application_id, Transition::DeclineOffer)
            .await
    }

    pub async fn withdraw(&self, actor: Actor, application_id: Uuid) -> AllocationResult<TransitionOutcome> {
        self.execute(actor, application_id, Transition::Withdraw).await
    }

    pub async fn close_placement(
        &self,
        actor: Actor,
        application_id: Uuid,
        outcome: PlacementOutcome,
    ) -> AllocationResult<TransitionOutcome> {
        self.execute(actor, application_id, Transition::ClosePlacement { outcome })
            .await
    }

    /// Expires the offer if its deadline has passed; a no-op otherwise.
    pub async fn expire(&self, application_id: Uuid) -> AllocationResult<TransitionOutcome> {
        self.execute(Actor::system(), application_id, Transition::Expire)
            .await
    }

    /// The one path that mutates application status and seat counters.
    pub async fn execute(
        &self,
        actor: Actor,
        application_id: Uuid,
        transition: Transition,
    ) -> AllocationResult<TransitionOutcome> {
        let result = self
            .store
            .transition(application_id, actor, transition, self.clock.now())
            .await;

        match &result {
            Ok(outcome) => tracing::info!(
                application_id = %application_id,
                transition = %transition,
                status = %outcome.application.status,
                spots_taken = outcome.seats.spots_taken,
                spots_left = outcome.seats.spots_left,
                "transition committed"
            ),
            Err(err) => self.report(err, application_id, transition.name()),
        }
        result
    }

    fn report(&self, err: &AllocationError, id: Uuid, operation: &str) {
        if err.is_fatal() {
            tracing::error!(id = %id, operation, error = %err, "allocation ledger failure");
        } else {
            tracing::debug!(id = %id, operation, error = %err, "allocation request refused");
        }
    }

    /// Reads an application, settling an overdue offer first.
    pub async fn application(&self, actor: Actor, application_id: Uuid) -> AllocationResult<Application> {
        let application = self.store.application(application_id).await?;
        match actor.role {
            ActorRole::Student if actor.id != application.student_id => {
                return Err(AllocationError::Forbidden)
            }
            ActorRole::Company => {
                let vacancy = self.store.vacancy(application.vacancy_id).await?;
                if vacancy.company_id != actor.id {
                    return Err(AllocationError::Forbidden);
                }
            }
            _ => {}
        }
        self.settle(application).await
    }

    pub async fn applications_for_vacancy(
        &self,
        actor: Actor,
        vacancy_id: Uuid,
    ) -> AllocationResult<Vec<Application>> {
        let vacancy = self.store.vacancy(vacancy_id).await?;
        super::state_machine::authorize_vacancy(&actor, &vacancy)?;
        let applications = self.store.applications_for_vacancy(vacancy_id).await?;
        self.settle_all(applications).await
    }

    pub async fn applications_for_student(
        &self,
        actor: Actor,
        status: Option<ApplicationStatus>,
    ) -> AllocationResult<Vec<Application>> {
        if actor.role != ActorRole::Student {
            return Err(AllocationError::Forbidden);
        }
        let applications = self.store.applications_for_student(actor.id, status).await?;
        let applications = self.settle_all(applications).await?;
        // Settling may have moved an overdue offer out of the requested status.
        Ok(applications
            .into_iter()
            .filter(|app| status.map_or(true, |s| app.status == s))
            .collect())
    }

    async fn settle(&self, application: Application) -> AllocationResult<Application> {
        if expiry::is_overdue(&application, self.clock.now()) {
            let outcome = self.expire(application.id).await?;
            return Ok(outcome.application);
        }
        Ok(application)
    }

    async fn settle_all(&self, applications: Vec<Application>) -> AllocationResult<Vec<Application>> {
        let mut settled = Vec::with_capacity(applications.len());
        for application in applications {
            settled.push(self.settle(application).await?);
        }
        Ok(settled)
    }

    /// Feeds every overdue offer through the `expire` transition.
    pub async fn sweep_expired_offers(&self, limit: i64) -> AllocationResult<SweepReport> {
        let overdue = self
            .store
            .overdue_offers(self.clock.now(), limit.max(1))
            .await?;
        let mut report = SweepReport {
            examined: overdue.len(),
            expired: 0,
        };
        for application_id in overdue {
            match self.expire(application_id).await {
                Ok(outcome) if outcome.changed => report.expired += 1,
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => {}
            }
        }
        if report.expired > 0 {
            tracing::info!(examined = report.examined, expired = report.expired, "expired stale offers");
        }
        Ok(report)
    }

    pub async fn events_after(&self, sequence: i64, limit: i64) -> AllocationResult<Vec<AllocationEvent>> {
        self.store
            .events_after(sequence.max(0), limit.clamp(1, 500))
            .await
    }
}
