//! Application lifecycle.
//!
//! ```text
//! submitted -> postulada -> oferta -> aceptada -> completada | terminada
//!                  |           |
//!                  +-----------+--> rechazada (company reject, student decline, expiry)
//! submitted | postulada | oferta -> retirada
//! ```
//!
//! [`resolve`] is a pure function over a locked application and its vacancy. Stores call
//! it inside their atomic section and persist whatever it returns.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AllocationError, AllocationResult};
use super::{expiry, ledger};
use crate::models::application::{Application, ApplicationStatus, Decision};
use crate::models::event::{EventKind, PendingEvent};
use crate::models::vacancy::Vacancy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Student,
    Company,
    Admin,
    System,
}

impl std::str::FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(ActorRole::Student),
            "company" => Ok(ActorRole::Company),
            "admin" => Ok(ActorRole::Admin),
            other => Err(format!("unsupported actor role `{other}`")),
        }
    }
}

/// Who is asking. `id` is the student id or the company id depending on the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn student(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Student,
        }
    }

    pub fn company(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Company,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Admin,
        }
    }

    pub fn system() -> Self {
        Self {
            id: Uuid::nil(),
            role: ActorRole::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementOutcome {
    Completed,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Review,
    IssueOffer { days: u32 },
    Reject,
    AcceptOffer,
    DeclineOffer,
    Withdraw,
    Expire,
    ClosePlacement { outcome: PlacementOutcome },
}

impl Transition {
    pub const fn name(self) -> &'static str {
        match self {
            Transition::Review => "review",
            Transition::IssueOffer { .. } => "issue_offer",
            Transition::Reject => "reject",
            Transition::AcceptOffer => "accept_offer",
            Transition::DeclineOffer => "decline_offer",
            Transition::Withdraw => "withdraw",
            Transition::Expire => "expire",
            Transition::ClosePlacement { .. } => "close_placement",
        }
    }

    pub fn permits(self, role: ActorRole) -> bool {
        use ActorRole::*;
        match self {
            Transition::Review
            | Transition::IssueOffer { .. }
            | Transition::Reject
            | Transition::ClosePlacement { .. } => matches!(role, Company | Admin),
            Transition::AcceptOffer | Transition::DeclineOffer => role == Student,
            Transition::Withdraw => matches!(role, Student | Company | Admin),
            Transition::Expire => matches!(role, System | Admin),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Change to the student's active-placement slot implied by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementChange {
    None,
    Claim,
    Release,
}

/// What a store must persist (or not) after resolving one request.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub application: Application,
    pub vacancy: Vacancy,
    pub events: Vec<PendingEvent>,
    pub placement: PlacementChange,
    pub outcome: AllocationResult<()>,
}

impl Resolution {
    /// True when something changed and must be written, even if `outcome` is an error
    /// (an overdue offer is expired before the request is refused).
    pub fn is_dirty(&self) -> bool {
        !self.events.is_empty()
    }
}

pub fn authorize(actor: &Actor, application: &Application, vacancy: &Vacancy) -> AllocationResult<()> {
    let owns = match actor.role {
        ActorRole::Student => actor.id == application.student_id,
        ActorRole::Company => actor.id == vacancy.company_id,
        ActorRole::Admin | ActorRole::System => true,
    };
    if owns {
        Ok(())
    } else {
        Err(AllocationError::Forbidden)
    }
}

/// Only the owning company (or an admin) may edit a vacancy.
pub fn authorize_vacancy(actor: &Actor, vacancy: &Vacancy) -> AllocationResult<()> {
    match actor.role {
        ActorRole::Company if actor.id == vacancy.company_id => Ok(()),
        ActorRole::Admin => Ok(()),
        _ => Err(AllocationError::Forbidden),
    }
}

/// Resolves `transition` against the current application and vacancy.
///
/// `student_placed_elsewhere` reports whether the student already holds another
/// `aceptada` application; stores only need to compute it for `AcceptOffer`.
pub fn resolve(
    current: &Application,
    vacancy: &Vacancy,
    actor: &Actor,
    transition: Transition,
    student_placed_elsewhere: bool,
    now: DateTime<Utc>,
) -> Resolution {
    let mut resolution = Resolution {
        application: current.clone(),
        vacancy: vacancy.clone(),
        events: Vec::new(),
        placement: PlacementChange::None,
        outcome: Ok(()),
    };

    if let Err(err) = authorize(actor, current, vacancy) {
        resolution.outcome = Err(err);
        return resolution;
    }

    if let Some(event) = expiry::expire_in_place(&mut resolution.application, now) {
        resolution.events.push(event);
        if transition != Transition::Expire {
            resolution.outcome = Err(AllocationError::OfferExpired);
        }
        return resolution;
    }

    let mut application = resolution.application.clone();
    let mut seats = resolution.vacancy.clone();
    let step = apply(
        &mut application,
        &mut seats,
        actor,
        transition,
        student_placed_elsewhere,
        now,
    )
    .and_then(|step| ledger::check_invariant(&seats).map(|_| step));

    match step {
        Ok(Some((kind, placement))) => {
            resolution
                .events
                .push(PendingEvent::for_application(kind, &application, now));
            resolution.application = application;
            resolution.vacancy = seats;
            resolution.placement = placement;
        }
        Ok(None) => {}
        Err(err) => resolution.outcome = Err(err),
    }
    resolution
}

/// Decides whether a student may open a new application on `vacancy`.
pub fn admit(
    vacancy: &Vacancy,
    student_id: Uuid,
    already_applied: bool,
    now: DateTime<Utc>,
) -> AllocationResult<(Application, PendingEvent)> {
    if already_applied {
        return Err(AllocationError::DuplicateApplication);
    }
    if !vacancy.is_open() {
        return Err(AllocationError::VacancyUnavailable);
    }
    let application = Application::new(student_id, vacancy.id, now);
    let event = PendingEvent::for_application(EventKind::ApplicationSubmitted, &application, now);
    Ok((application, event))
}

type Step = Option<(EventKind, PlacementChange)>;

fn apply(
    application: &mut Application,
    vacancy: &mut Vacancy,
    actor: &Actor,
    transition: Transition,
    student_placed_elsewhere: bool,
    now: DateTime<Utc>,
) -> AllocationResult<Step> {
    let from = application.status;
    let illegal = || AllocationError::InvalidStateTransition {
        from,
        transition: transition.name(),
    };

    if !transition.permits(actor.role) {
        return Err(illegal());
    }

    match transition {
        // Reaching this point means the offer was not overdue (or there was none).
        Transition::Expire => Ok(None),

        Transition::Review => {
            if from != ApplicationStatus::Submitted {
                return Err(illegal());
            }
            application.decide(ApplicationStatus::Postulada, Decision::Reviewed, now);
            Ok(Some((EventKind::ApplicationReviewed, PlacementChange::None)))
        }

        Transition::IssueOffer { days } => {
            if from != ApplicationStatus::Postulada {
                return Err(illegal());
            }
            if !vacancy.is_active() {
                return Err(AllocationError::VacancyInactive);
            }
            if vacancy.is_full() {
                return Err(AllocationError::CapacityExhausted);
            }
            application.decide(ApplicationStatus::Oferta, Decision::Offered, now);
            application.offer_expires_at = Some(now + Duration::days(i64::from(days)));
            Ok(Some((EventKind::OfferIssued, PlacementChange::None)))
        }

        Transition::Reject => {
            if !matches!(
                from,
                ApplicationStatus::Submitted | ApplicationStatus::Postulada | ApplicationStatus::Oferta
            ) {
                return Err(illegal());
            }
            application.decide(ApplicationStatus::Rechazada, Decision::Rejected, now);
            application.auto_declined = false;
            Ok(Some((EventKind::ApplicationRejected, PlacementChange::None)))
        }

        Transition::AcceptOffer => {
            if from != ApplicationStatus::Oferta {
                return Err(illegal());
            }
            if application.offer_expires_at.is_none() {
                return Err(AllocationError::InvariantViolation(format!(
                    "application {} is an offer without an expiry",
                    application.id
                )));
            }
            if student_placed_elsewhere {
                return Err(AllocationError::StudentAlreadyPlaced);
            }
            ledger::reserve_seat(vacancy, now)?;
            application.decide(ApplicationStatus::Aceptada, Decision::Accepted, now);
            Ok(Some((EventKind::OfferAccepted, PlacementChange::Claim)))
        }

        Transition::DeclineOffer => {
            if from != ApplicationStatus::Oferta {
                return Err(illegal());
            }
            application.decide(ApplicationStatus::Rechazada, Decision::Declined, now);
            application.auto_declined = false;
            Ok(Some((EventKind::OfferDeclined, PlacementChange::None)))
        }

        Transition::Withdraw => {
            if !from.is_open() {
                return Err(illegal());
            }
            application.decide(ApplicationStatus::Retirada, Decision::Withdrawn, now);
            Ok(Some((EventKind::ApplicationWithdrawn, PlacementChange::None)))
        }

        Transition::ClosePlacement { outcome } => {
            if from != ApplicationStatus::Aceptada {
                return Err(illegal());
            }
            ledger::release_seat(vacancy, now)?;
            let (status, decision) = match outcome {
                PlacementOutcome::Completed => (ApplicationStatus::Completada, Decision::Completed),
                PlacementOutcome::Terminated => (ApplicationStatus::Terminada, Decision::Terminated),
            };
            application.decide(status, decision, now);
            Ok(Some((EventKind::PlacementClosed, PlacementChange::Release)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vacancy::VacancyStatus;

    struct Fixture {
        student: Uuid,
        company: Uuid,
        vacancy: Vacancy,
        application: Application,
        now: DateTime<Utc>,
    }

    fn fixture(status: ApplicationStatus, total: i32, taken: i32) -> Fixture {
        let now = Utc::now();
        let student = Uuid::new_v4();
        let company = Uuid::new_v4();
        let vacancy = Vacancy {
            id: Uuid::new_v4(),
            company_id: company,
            title: "Data intern".into(),
            spots_total: total,
            spots_taken: taken,
            status: VacancyStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let mut application = Application::new(student, vacancy.id, now - Duration::days(2));
        application.status = status;
        if status == ApplicationStatus::Oferta {
            application.offer_expires_at = Some(now + Duration::days(5));
        }
        Fixture {
            student,
            company,
            vacancy,
            application,
            now,
        }
    }

    const ALL_TRANSITIONS: [Transition; 9] = [
        Transition::Review,
        Transition::IssueOffer { days: 5 },
        Transition::Reject,
        Transition::AcceptOffer,
        Transition::DeclineOffer,
        Transition::Withdraw,
        Transition::Expire,
        Transition::ClosePlacement {
            outcome: PlacementOutcome::Completed,
        },
        Transition::ClosePlacement {
            outcome: PlacementOutcome::Terminated,
        },
    ];

    fn actor_for(f: &Fixture, transition: Transition) -> Actor {
        match transition {
            Transition::AcceptOffer | Transition::DeclineOffer | Transition::Withdraw => {
                Actor::student(f.student)
            }
            Transition::Expire => Actor::system(),
            _ => Actor::company(f.company),
        }
    }

    #[test]
    fn issue_offer_sets_the_expiry_window() {
        let f = fixture(ApplicationStatus::Postulada, 2, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::company(f.company),
            Transition::IssueOffer { days: 5 },
            false,
            f.now,
        );
        assert!(r.outcome.is_ok());
        assert_eq!(r.application.status, ApplicationStatus::Oferta);
        assert_eq!(r.application.offer_expires_at, Some(f.now + Duration::days(5)));
        assert_eq!(r.application.decision, Some(Decision::Offered));
        assert_eq!(r.vacancy.spots_taken, 0, "offers do not consume seats");
        assert_eq!(r.events[0].kind, EventKind::OfferIssued);
    }

    #[test]
    fn issue_offer_on_full_vacancy_is_capacity_exhausted() {
        let f = fixture(ApplicationStatus::Postulada, 3, 3);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::company(f.company),
            Transition::IssueOffer { days: 5 },
            false,
            f.now,
        );
        assert_eq!(r.outcome, Err(AllocationError::CapacityExhausted));
        assert!(!r.is_dirty());
        assert_eq!(r.application, f.application);
    }

    #[test]
    fn accept_consumes_a_seat_and_claims_the_placement() {
        let f = fixture(ApplicationStatus::Oferta, 1, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::student(f.student),
            Transition::AcceptOffer,
            false,
            f.now,
        );
        assert!(r.outcome.is_ok());
        assert_eq!(r.application.status, ApplicationStatus::Aceptada);
        assert!(r.application.offer_expires_at.is_none());
        assert_eq!(r.vacancy.spots_taken, 1);
        assert_eq!(r.placement, PlacementChange::Claim);
    }

    #[test]
    fn accept_when_placed_elsewhere_keeps_the_offer() {
        let f = fixture(ApplicationStatus::Oferta, 1, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::student(f.student),
            Transition::AcceptOffer,
            true,
            f.now,
        );
        assert_eq!(r.outcome, Err(AllocationError::StudentAlreadyPlaced));
        assert_eq!(r.application.status, ApplicationStatus::Oferta);
        assert_eq!(r.vacancy.spots_taken, 0);
        assert!(!r.is_dirty());
    }

    #[test]
    fn accept_after_deadline_expires_the_offer() {
        let mut f = fixture(ApplicationStatus::Oferta, 1, 0);
        f.application.offer_expires_at = Some(f.now - Duration::hours(1));
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::student(f.student),
            Transition::AcceptOffer,
            false,
            f.now,
        );
        assert_eq!(r.outcome, Err(AllocationError::OfferExpired));
        assert!(r.is_dirty());
        assert_eq!(r.application.status, ApplicationStatus::Rechazada);
        assert!(r.application.auto_declined);
        assert_eq!(r.vacancy.spots_taken, 0);
    }

    #[test]
    fn decline_is_not_an_auto_decline() {
        let f = fixture(ApplicationStatus::Oferta, 1, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::student(f.student),
            Transition::DeclineOffer,
            false,
            f.now,
        );
        assert!(r.outcome.is_ok());
        assert_eq!(r.application.status, ApplicationStatus::Rechazada);
        assert_eq!(r.application.decision, Some(Decision::Declined));
        assert!(!r.application.auto_declined);
    }

    #[test]
    fn close_placement_releases_the_seat() {
        let f = fixture(ApplicationStatus::Aceptada, 2, 1);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::company(f.company),
            Transition::ClosePlacement {
                outcome: PlacementOutcome::Terminated,
            },
            false,
            f.now,
        );
        assert!(r.outcome.is_ok());
        assert_eq!(r.application.status, ApplicationStatus::Terminada);
        assert_eq!(r.vacancy.spots_taken, 0);
        assert_eq!(r.placement, PlacementChange::Release);
    }

    #[test]
    fn close_placement_with_no_taken_seat_is_fatal() {
        let f = fixture(ApplicationStatus::Aceptada, 2, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::admin(Uuid::new_v4()),
            Transition::ClosePlacement {
                outcome: PlacementOutcome::Completed,
            },
            false,
            f.now,
        );
        assert!(r.outcome.as_ref().is_err_and(|err| err.is_fatal()));
        assert!(!r.is_dirty());
    }

    #[test]
    fn wrong_role_is_an_invalid_transition() {
        let f = fixture(ApplicationStatus::Oferta, 1, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::company(f.company),
            Transition::AcceptOffer,
            false,
            f.now,
        );
        assert!(matches!(
            r.outcome,
            Err(AllocationError::InvalidStateTransition {
                from: ApplicationStatus::Oferta,
                transition: "accept_offer"
            })
        ));
    }

    #[test]
    fn strangers_are_forbidden() {
        let f = fixture(ApplicationStatus::Oferta, 1, 0);
        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::student(Uuid::new_v4()),
            Transition::AcceptOffer,
            false,
            f.now,
        );
        assert_eq!(r.outcome, Err(AllocationError::Forbidden));

        let r = resolve(
            &f.application,
            &f.vacancy,
            &Actor::company(Uuid::new_v4()),
            Transition::Reject,
            false,
            f.now,
        );
        assert_eq!(r.outcome, Err(AllocationError::Forbidden));
    }

    #[test]
    fn final_states_are_closed() {
        for status in [
            ApplicationStatus::Rechazada,
            ApplicationStatus::Retirada,
            ApplicationStatus::Completada,
            ApplicationStatus::Terminada,
        ] {
            for transition in ALL_TRANSITIONS {
                let f = fixture(status, 3, 1);
                let actor = actor_for(&f, transition);
                let r = resolve(&f.application, &f.vacancy, &actor, transition, false, f.now);
                assert!(!r.is_dirty(), "{status} accepted {transition}");
                assert_eq!(r.application, f.application);
                assert_eq!(r.vacancy, f.vacancy);
                if transition == Transition::Expire {
                    assert!(r.outcome.is_ok(), "expire must be a no-op on {status}");
                } else {
                    assert!(r.outcome.is_err(), "{status} accepted {transition}");
                }
            }
        }
    }

    #[test]
    fn withdraw_from_every_open_state() {
        for status in [
            ApplicationStatus::Submitted,
            ApplicationStatus::Postulada,
            ApplicationStatus::Oferta,
        ] {
            let f = fixture(status, 1, 0);
            let r = resolve(
                &f.application,
                &f.vacancy,
                &Actor::student(f.student),
                Transition::Withdraw,
                false,
                f.now,
            );
            assert!(r.outcome.is_ok());
            assert_eq!(r.application.status, ApplicationStatus::Retirada);
            assert!(r.application.offer_expires_at.is_none());
        }
    }

    #[test]
    fn admit_checks_duplicates_and_open_seats() {
        let f = fixture(ApplicationStatus::Postulada, 1, 0);
        let (app, event) = admit(&f.vacancy, f.student, false, f.now).unwrap();
        assert_eq!(app.status, ApplicationStatus::Postulada);
        assert_eq!(event.kind, EventKind::ApplicationSubmitted);

        assert_eq!(
            admit(&f.vacancy, f.student, true, f.now).unwrap_err(),
            AllocationError::DuplicateApplication
        );

        let full = fixture(ApplicationStatus::Postulada, 1, 1);
        assert_eq!(
            admit(&full.vacancy, full.student, false, full.now).unwrap_err(),
            AllocationError::VacancyUnavailable
        );
    }
}
