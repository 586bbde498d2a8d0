use uuid::Uuid;

use crate::models::application::ApplicationStatus;

pub type AllocationResult<T> = std::result::Result<T, AllocationError>;

/// Typed outcome of a rejected allocation request.
///
/// Everything except [`AllocationError::InvariantViolation`] and
/// [`AllocationError::Storage`] is an ordinary business answer that the caller turns
/// into user-facing messaging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("transition `{transition}` is not allowed from status `{from}`")]
    InvalidStateTransition {
        from: ApplicationStatus,
        transition: &'static str,
    },

    #[error("no seats left on this vacancy")]
    CapacityExhausted,

    #[error("vacancy is inactive")]
    VacancyInactive,

    #[error("vacancy is not accepting applications")]
    VacancyUnavailable,

    #[error("offer has expired")]
    OfferExpired,

    #[error("student already holds an active placement")]
    StudentAlreadyPlaced,

    #[error("student already applied to this vacancy")]
    DuplicateApplication,

    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),

    #[error("offer validity must be between 1 and {max} days, got {days}")]
    InvalidOfferWindow { days: u32, max: u32 },

    #[error("application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("vacancy {0} not found")]
    VacancyNotFound(Uuid),

    #[error("actor is not allowed to act on this resource")]
    Forbidden,

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl AllocationError {
    /// Failures that mean the ledger or its storage is broken rather than that the
    /// request was refused.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AllocationError::InvariantViolation(_) | AllocationError::Storage(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::InvalidStateTransition { .. } => "invalid_state_transition",
            AllocationError::CapacityExhausted => "capacity_exhausted",
            AllocationError::VacancyInactive => "vacancy_inactive",
            AllocationError::VacancyUnavailable => "vacancy_unavailable",
            AllocationError::OfferExpired => "offer_expired",
            AllocationError::StudentAlreadyPlaced => "student_already_placed",
            AllocationError::DuplicateApplication => "duplicate_application",
            AllocationError::InvalidCapacity(_) => "invalid_capacity",
            AllocationError::InvalidOfferWindow { .. } => "invalid_offer_window",
            AllocationError::ApplicationNotFound(_) => "application_not_found",
            AllocationError::VacancyNotFound(_) => "vacancy_not_found",
            AllocationError::Forbidden => "forbidden",
            AllocationError::InvariantViolation(_) => "invariant_violation",
            AllocationError::Storage(_) => "storage_failure",
        }
    }
}

/// Partial unique index allowing one `aceptada` application per student.
pub(crate) const ONE_PLACEMENT_CONSTRAINT: &str = "applications_one_placement_per_student";
/// Unique `(student_id, vacancy_id)` pair.
pub(crate) const UNIQUE_PAIR_CONSTRAINT: &str = "applications_student_vacancy_key";
/// `CHECK (spots_taken BETWEEN 0 AND spots_total)`.
pub(crate) const SEAT_RANGE_CONSTRAINT: &str = "vacancies_spots_taken_range";

impl From<sqlx::Error> for AllocationError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            match db.constraint() {
                Some(ONE_PLACEMENT_CONSTRAINT) => return AllocationError::StudentAlreadyPlaced,
                Some(UNIQUE_PAIR_CONSTRAINT) => return AllocationError::DuplicateApplication,
                Some(SEAT_RANGE_CONSTRAINT) => {
                    return AllocationError::InvariantViolation(db.message().to_string())
                }
                _ => {}
            }
        }
        AllocationError::Storage(err.to_string())
    }
}
