//! Seat accounting for a single vacancy.
//!
//! These functions mutate a vacancy the caller has already locked; the store is what
//! makes the check-and-mutate indivisible.

use chrono::{DateTime, Utc};

use super::error::{AllocationError, AllocationResult};
use super::store::VacancyChange;
use crate::models::vacancy::{Vacancy, VacancyStatus};

pub fn reserve_seat(vacancy: &mut Vacancy, now: DateTime<Utc>) -> AllocationResult<()> {
    if !vacancy.is_active() {
        return Err(AllocationError::VacancyInactive);
    }
    if vacancy.spots_taken >= vacancy.spots_total {
        return Err(AllocationError::CapacityExhausted);
    }
    vacancy.spots_taken += 1;
    vacancy.updated_at = now;
    Ok(())
}

pub fn release_seat(vacancy: &mut Vacancy, now: DateTime<Utc>) -> AllocationResult<()> {
    if vacancy.spots_taken <= 0 {
        return Err(AllocationError::InvariantViolation(format!(
            "vacancy {} would release a seat with spots_taken = {}",
            vacancy.id, vacancy.spots_taken
        )));
    }
    vacancy.spots_taken -= 1;
    vacancy.updated_at = now;
    Ok(())
}

/// Metadata flip; counts are untouched.
pub fn toggle_status(vacancy: &mut Vacancy, active: bool, now: DateTime<Utc>) {
    let status = VacancyStatus::from_active(active);
    if vacancy.status != status {
        vacancy.status = status;
        vacancy.updated_at = now;
    }
}

pub fn resize(vacancy: &mut Vacancy, spots_total: i32, now: DateTime<Utc>) -> AllocationResult<()> {
    if spots_total < 1 {
        return Err(AllocationError::InvalidCapacity(
            "spots_total must be at least 1".to_string(),
        ));
    }
    if spots_total < vacancy.spots_taken {
        return Err(AllocationError::InvalidCapacity(format!(
            "spots_total {} is below the {} seats already taken",
            spots_total, vacancy.spots_taken
        )));
    }
    vacancy.spots_total = spots_total;
    vacancy.updated_at = now;
    Ok(())
}

pub fn apply_change(vacancy: &mut Vacancy, change: VacancyChange, now: DateTime<Utc>) -> AllocationResult<()> {
    match change {
        VacancyChange::Status { active } => toggle_status(vacancy, active, now),
        VacancyChange::Capacity { spots_total } => resize(vacancy, spots_total, now)?,
    }
    check_invariant(vacancy)
}

/// Re-check of `0 <= spots_taken <= spots_total` before anything is persisted.
pub fn check_invariant(vacancy: &Vacancy) -> AllocationResult<()> {
    if vacancy.spots_taken < 0 || vacancy.spots_taken > vacancy.spots_total {
        return Err(AllocationError::InvariantViolation(format!(
            "vacancy {} has spots_taken = {} with spots_total = {}",
            vacancy.id, vacancy.spots_taken, vacancy.spots_total
        )));
    }
    Ok(())
}
