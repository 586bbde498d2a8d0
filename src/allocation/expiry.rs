//! Offer expiry rule.
//!
//! An offer is valid while `now <= offer_expires_at`. Once that instant has passed the
//! application is auto-declined before any other transition is looked at.

use chrono::{DateTime, Utc};

use crate::models::application::{Application, ApplicationStatus, Decision};
use crate::models::event::{EventKind, PendingEvent};

pub fn is_overdue(application: &Application, now: DateTime<Utc>) -> bool {
    application.status == ApplicationStatus::Oferta
        && application
            .offer_expires_at
            .map_or(false, |expires_at| now > expires_at)
}

/// Auto-declines an overdue offer. Returns the event to record, or `None` when the
/// application was not overdue (including every final state).
pub fn expire_in_place(application: &mut Application, now: DateTime<Utc>) -> Option<PendingEvent> {
    if !is_overdue(application, now) {
        return None;
    }
    application.decide(ApplicationStatus::Rechazada, Decision::Expired, now);
    application.auto_declined = true;
    Some(PendingEvent::for_application(
        EventKind::OfferExpired,
        application,
        now,
    ))
}
