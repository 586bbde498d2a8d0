//! In-process store.
//!
//! Each vacancy and its applications live in one shard behind an async mutex, so
//! transitions on the same vacancy (and therefore on the same application) are
//! serialized while other vacancies proceed in parallel. The student placement index is
//! a separate lock, always taken after a shard lock and only by transitions that claim
//! or release a placement.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::error::{AllocationError, AllocationResult};
use super::ledger;
use super::state_machine::{self, Actor, PlacementChange, Transition};
use super::store::{AllocationStore, TransitionOutcome, VacancyChange};
use crate::models::application::{Application, ApplicationStatus};
use crate::models::event::{AllocationEvent, PendingEvent};
use crate::models::vacancy::{NewVacancy, Vacancy};

struct Shard {
    vacancy: Vacancy,
    applications: HashMap<Uuid, Application>,
    applicants: HashSet<Uuid>,
}

#[derive(Default)]
pub struct MemoryAllocationStore {
    shards: RwLock<HashMap<Uuid, Arc<Mutex<Shard>>>>,
    // application id -> vacancy id
    owners: RwLock<HashMap<Uuid, Uuid>>,
    // student id -> the one `aceptada` application
    placements: Mutex<HashMap<Uuid, Uuid>>,
    events: Mutex<Vec<AllocationEvent>>,
}

impl MemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn shard(&self, vacancy_id: Uuid) -> AllocationResult<Arc<Mutex<Shard>>> {
        self.shards
            .read()
            .await
            .get(&vacancy_id)
            .cloned()
            .ok_or(AllocationError::VacancyNotFound(vacancy_id))
    }

    async fn shard_of(&self, application_id: Uuid) -> AllocationResult<Arc<Mutex<Shard>>> {
        let vacancy_id = self
            .owners
            .read()
            .await
            .get(&application_id)
            .copied()
            .ok_or(AllocationError::ApplicationNotFound(application_id))?;
        self.shard(vacancy_id).await
    }

    async fn record(&self, pending: Vec<PendingEvent>) {
        let mut events = self.events.lock().await;
        for event in pending {
            let sequence = events.len() as i64 + 1;
            events.push(event.into_event(sequence));
        }
    }
}

#[async_trait]
impl AllocationStore for MemoryAllocationStore {
    async fn create_vacancy(&self, vacancy: NewVacancy, now: DateTime<Utc>) -> AllocationResult<Vacancy> {
        let vacancy = Vacancy {
            id: Uuid::new_v4(),
            company_id: vacancy.company_id,
            title: vacancy.title,
            spots_total: vacancy.spots_total,
            spots_taken: 0,
            status: vacancy.status,
            created_at: now,
            updated_at: now,
        };
        ledger::check_invariant(&vacancy)?;

        let shard = Shard {
            vacancy: vacancy.clone(),
            applications: HashMap::new(),
            applicants: HashSet::new(),
        };
        self.shards
            .write()
            .await
            .insert(vacancy.id, Arc::new(Mutex::new(shard)));
        Ok(vacancy)
    }

    async fn update_vacancy(
        &self,
        vacancy_id: Uuid,
        actor: Actor,
        change: VacancyChange,
        now: DateTime<Utc>,
    ) -> AllocationResult<Vacancy> {
        let shard = self.shard(vacancy_id).await?;
        let mut shard = shard.lock().await;
        state_machine::authorize_vacancy(&actor, &shard.vacancy)?;

        let mut next = shard.vacancy.clone();
        ledger::apply_change(&mut next, change, now)?;
        shard.vacancy = next.clone();
        Ok(next)
    }

    async fn vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vacancy> {
        let shard = self.shard(vacancy_id).await?;
        let shard = shard.lock().await;
        Ok(shard.vacancy.clone())
    }

    async fn open_vacancies(&self, limit: i64) -> AllocationResult<Vec<Vacancy>> {
        let shards: Vec<_> = self.shards.read().await.values().cloned().collect();
        let mut open = Vec::new();
        for shard in shards {
            let shard = shard.lock().await;
            if shard.vacancy.is_open() {
                open.push(shard.vacancy.clone());
            }
        }
        open.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        open.truncate(limit.max(0) as usize);
        Ok(open)
    }

    async fn apply(
        &self,
        student_id: Uuid,
        vacancy_id: Uuid,
        now: DateTime<Utc>,
    ) -> AllocationResult<TransitionOutcome> {
        let shard = self.shard(vacancy_id).await?;
        let mut shard = shard.lock().await;

        let already_applied = shard.applicants.contains(&student_id);
        let (application, event) =
            state_machine::admit(&shard.vacancy, student_id, already_applied, now)?;

        self.owners.write().await.insert(application.id, vacancy_id);
        shard.applicants.insert(student_id);
        shard
            .applications
            .insert(application.id, application.clone());
        self.record(vec![event]).await;

        Ok(TransitionOutcome {
            application,
            seats: shard.vacancy.seats(),
            changed: true,
        })
    }

    async fn transition(
        &self,
        application_id: Uuid,
        actor: Actor,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> AllocationResult<TransitionOutcome> {
        let shard = self.shard_of(application_id).await?;
        let mut shard = shard.lock().await;
        let current = shard
            .applications
            .get(&application_id)
            .cloned()
            .ok_or(AllocationError::ApplicationNotFound(application_id))?;

        let mut placements = match transition {
            Transition::AcceptOffer | Transition::ClosePlacement { .. } => {
                Some(self.placements.lock().await)
            }
            _ => None,
        };
        let placed_elsewhere = placements.as_ref().is_some_and(|placed| {
            placed
                .get(&current.student_id)
                .is_some_and(|held| *held != application_id)
        });

        let resolution = state_machine::resolve(
            &current,
            &shard.vacancy,
            &actor,
            transition,
            placed_elsewhere,
            now,
        );

        let changed = resolution.is_dirty();
        if changed {
            match (resolution.placement, placements.as_mut()) {
                (PlacementChange::Claim, Some(placed)) => {
                    placed.insert(current.student_id, application_id);
                }
                (PlacementChange::Release, Some(placed)) => {
                    placed.remove(&current.student_id);
                }
                (PlacementChange::None, _) => {}
                (_, None) => {
                    return Err(AllocationError::InvariantViolation(format!(
                        "{transition} changed a placement without holding the placement lock"
                    )))
                }
            }
            shard.vacancy = resolution.vacancy.clone();
            shard
                .applications
                .insert(application_id, resolution.application.clone());
            self.record(resolution.events).await;
        }

        resolution.outcome.map(|()| TransitionOutcome {
            application: resolution.application,
            seats: resolution.vacancy.seats(),
            changed,
        })
    }

    async fn application(&self, application_id: Uuid) -> AllocationResult<Application> {
        let shard = self.shard_of(application_id).await?;
        let shard = shard.lock().await;
        shard
            .applications
            .get(&application_id)
            .cloned()
            .ok_or(AllocationError::ApplicationNotFound(application_id))
    }

    async fn applications_for_vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vec<Application>> {
        let shard = self.shard(vacancy_id).await?;
        let shard = shard.lock().await;
        let mut applications: Vec<_> = shard.applications.values().cloned().collect();
        applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(applications)
    }

    async fn applications_for_student(
        &self,
        student_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> AllocationResult<Vec<Application>> {
        let shards: Vec<_> = self.shards.read().await.values().cloned().collect();
        let mut applications = Vec::new();
        for shard in shards {
            let shard = shard.lock().await;
            applications.extend(
                shard
                    .applications
                    .values()
                    .filter(|app| app.student_id == student_id)
                    .filter(|app| status.map_or(true, |s| app.status == s))
                    .cloned(),
            );
        }
        applications.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(applications)
    }

    async fn overdue_offers(&self, now: DateTime<Utc>, limit: i64) -> AllocationResult<Vec<Uuid>> {
        let shards: Vec<_> = self.shards.read().await.values().cloned().collect();
        let mut overdue = Vec::new();
        for shard in shards {
            let shard = shard.lock().await;
            overdue.extend(
                shard
                    .applications
                    .values()
                    .filter(|app| super::expiry::is_overdue(app, now))
                    .filter_map(|app| app.offer_expires_at.map(|at| (at, app.id))),
            );
        }
        overdue.sort();
        overdue.truncate(limit.max(0) as usize);
        Ok(overdue.into_iter().map(|(_, id)| id).collect())
    }

    async fn events_after(&self, sequence: i64, limit: i64) -> AllocationResult<Vec<AllocationEvent>> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|event| event.sequence > sequence)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
