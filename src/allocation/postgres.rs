//! Postgres store.
//!
//! One transaction per call. The vacancy row is locked `FOR UPDATE` before the
//! application row, in that order everywhere, so transitions on the same vacancy queue
//! behind each other and never deadlock. The schema backs this up with a `CHECK` on the
//! seat range, the unique `(student_id, vacancy_id)` pair and a partial unique index on
//! `aceptada` applications per student.
//!
//! Outbox inserts take a transaction-scoped advisory lock first, so event sequences are
//! handed out in commit order and a reader following the cursor never skips a row that
//! commits late. Only the outbox tail is serialized; row locks on other vacancies are not.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::error::{AllocationError, AllocationResult};
use super::ledger;
use super::state_machine::{self, Actor, Transition};
use super::store::{AllocationStore, TransitionOutcome, VacancyChange};
use crate::models::application::{Application, ApplicationStatus};
use crate::models::event::{AllocationEvent, PendingEvent};
use crate::models::vacancy::{NewVacancy, Vacancy};

const VACANCY_COLUMNS: &str =
    "id, company_id, title, spots_total, spots_taken, status, created_at, updated_at";

const APPLICATION_COLUMNS: &str = "id, student_id, vacancy_id, status, applied_at, offer_expires_at, decision, decision_at, auto_declined";

/// Advisory lock key guarding `allocation_events` sequence assignment.
pub const OUTBOX_LOCK_KEY: i64 = 0x616c_6c6f_635f_6576;

const EVENT_COLUMNS: &str =
    "sequence, kind, application_id, vacancy_id, student_id, status, occurred_at";

#[derive(Clone)]
pub struct PgAllocationStore {
    pool: PgPool,
}

impl PgAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_vacancy(
        tx: &mut Transaction<'_, Postgres>,
        vacancy_id: Uuid,
    ) -> AllocationResult<Vacancy> {
        let sql = format!("SELECT {VACANCY_COLUMNS} FROM vacancies WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(vacancy_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AllocationError::VacancyNotFound(vacancy_id))
    }

    async fn save_vacancy(tx: &mut Transaction<'_, Postgres>, vacancy: &Vacancy) -> AllocationResult<()> {
        sqlx::query(
            r#"
            UPDATE vacancies
            SET spots_total = $2, spots_taken = $3, status = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(vacancy.id)
        .bind(vacancy.spots_total)
        .bind(vacancy.spots_taken)
        .bind(vacancy.status)
        .bind(vacancy.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn save_application(
        tx: &mut Transaction<'_, Postgres>,
        application: &Application,
    ) -> AllocationResult<()> {
        sqlx::query(
            r#"
            UPDATE applications
            SET status = $2, offer_expires_at = $3, decision = $4, decision_at = $5, auto_declined = $6
            WHERE id = $1
            "#,
        )
        .bind(application.id)
        .bind(application.status)
        .bind(application.offer_expires_at)
        .bind(application.decision)
        .bind(application.decision_at)
        .bind(application.auto_declined)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn record(tx: &mut Transaction<'_, Postgres>, events: &[PendingEvent]) -> AllocationResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        // Held until commit; must stay the last lock the transaction takes.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(OUTBOX_LOCK_KEY)
            .execute(&mut **tx)
            .await?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO allocation_events (kind, application_id, vacancy_id, student_id, status, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(event.kind)
            .bind(event.application_id)
            .bind(event.vacancy_id)
            .bind(event.student_id)
            .bind(event.status)
            .bind(event.occurred_at)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AllocationStore for PgAllocationStore {
    async fn create_vacancy(&self, vacancy: NewVacancy, now: DateTime<Utc>) -> AllocationResult<Vacancy> {
        let sql = format!(
            r#"
            INSERT INTO vacancies (id, company_id, title, spots_total, spots_taken, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $6)
            RETURNING {VACANCY_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Vacancy>(&sql)
            .bind(Uuid::new_v4())
            .bind(vacancy.company_id)
            .bind(&vacancy.title)
            .bind(vacancy.spots_total)
            .bind(vacancy.status)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_vacancy(
        &self,
        vacancy_id: Uuid,
        actor: Actor,
        change: VacancyChange,
        now: DateTime<Utc>,
    ) -> AllocationResult<Vacancy> {
        let mut tx = self.pool.begin().await?;
        let mut vacancy = Self::lock_vacancy(&mut tx, vacancy_id).await?;
        state_machine::authorize_vacancy(&actor, &vacancy)?;
        ledger::apply_change(&mut vacancy, change, now)?;
        Self::save_vacancy(&mut tx, &vacancy).await?;
        tx.commit().await?;
        Ok(vacancy)
    }

    async fn vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vacancy> {
        let sql = format!("SELECT {VACANCY_COLUMNS} FROM vacancies WHERE id = $1");
        sqlx::query_as::<_, Vacancy>(&sql)
            .bind(vacancy_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AllocationError::VacancyNotFound(vacancy_id))
    }

    async fn open_vacancies(&self, limit: i64) -> AllocationResult<Vec<Vacancy>> {
        let sql = format!(
            r#"
            SELECT {VACANCY_COLUMNS}
            FROM vacancies
            WHERE status = 'active' AND spots_taken < spots_total
            ORDER BY created_at DESC
            LIMIT $1
            "#
        );
        let rows = sqlx::query_as::<_, Vacancy>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn apply(
        &self,
        student_id: Uuid,
        vacancy_id: Uuid,
        now: DateTime<Utc>,
    ) -> AllocationResult<TransitionOutcome> {
        let mut tx = self.pool.begin().await?;
        let vacancy = Self::lock_vacancy(&mut tx, vacancy_id).await?;

        let already_applied: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM applications WHERE student_id = $1 AND vacancy_id = $2)",
        )
        .bind(student_id)
        .bind(vacancy_id)
        .fetch_one(&mut *tx)
        .await?;

        let (application, event) = state_machine::admit(&vacancy, student_id, already_applied, now)?;

        sqlx::query(
            r#"
            INSERT INTO applications (id, student_id, vacancy_id, status, applied_at, auto_declined)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            "#,
        )
        .bind(application.id)
        .bind(application.student_id)
        .bind(application.vacancy_id)
        .bind(application.status)
        .bind(application.applied_at)
        .execute(&mut *tx)
        .await?;
        Self::record(&mut tx, &[event]).await?;
        tx.commit().await?;

        Ok(TransitionOutcome {
            application,
            seats: vacancy.seats(),
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
        let mut tx = self.pool.begin().await?;

        let vacancy_id: Uuid = sqlx::query_scalar("SELECT vacancy_id FROM applications WHERE id = $1")
            .bind(application_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AllocationError::ApplicationNotFound(application_id))?;
        let vacancy = Self::lock_vacancy(&mut tx, vacancy_id).await?;

        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Application>(&sql)
            .bind(application_id)
            .fetch_one(&mut *tx)
            .await?;

        let placed_elsewhere = if transition == Transition::AcceptOffer {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM applications
                    WHERE student_id = $1 AND status = 'aceptada' AND id <> $2
                )
                "#,
            )
            .bind(current.student_id)
            .bind(application_id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            false
        };

        let resolution =
            state_machine::resolve(&current, &vacancy, &actor, transition, placed_elsewhere, now);

        let changed = resolution.is_dirty();
        if changed {
            Self::save_application(&mut tx, &resolution.application).await?;
            if resolution.vacancy != vacancy {
                Self::save_vacancy(&mut tx, &resolution.vacancy).await?;
            }
            Self::record(&mut tx, &resolution.events).await?;
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        resolution.outcome.map(|()| TransitionOutcome {
            application: resolution.application,
            seats: resolution.vacancy.seats(),
            changed,
        })
    }

    async fn application(&self, application_id: Uuid) -> AllocationResult<Application> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1");
        sqlx::query_as::<_, Application>(&sql)
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AllocationError::ApplicationNotFound(application_id))
    }

    async fn applications_for_vacancy(&self, vacancy_id: Uuid) -> AllocationResult<Vec<Application>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE vacancy_id = $1 ORDER BY applied_at DESC"
        );
        let rows = sqlx::query_as::<_, Application>(&sql)
            .bind(vacancy_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn applications_for_student(
        &self,
        student_id: Uuid,
        status: Option<ApplicationStatus>,
    ) -> AllocationResult<Vec<Application>> {
        let sql = format!(
            r#"
            SELECT {APPLICATION_COLUMNS}
            FROM applications
            WHERE student_id = $1 AND ($2::application_status IS NULL OR status = $2)
            ORDER BY applied_at DESC
            "#
        );
        let rows = sqlx::query_as::<_, Application>(&sql)
            .bind(student_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn overdue_offers(&self, now: DateTime<Utc>, limit: i64) -> AllocationResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM applications
            WHERE status = 'oferta' AND offer_expires_at < $1
            ORDER BY offer_expires_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn events_after(&self, sequence: i64, limit: i64) -> AllocationResult<Vec<AllocationEvent>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM allocation_events WHERE sequence > $1 ORDER BY sequence ASC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, AllocationEvent>(&sql)
            .bind(sequence)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
