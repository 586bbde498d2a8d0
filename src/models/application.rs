use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a (student, vacancy) application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Submitted,
    Postulada,
    Oferta,
    Aceptada,
    Rechazada,
    Retirada,
    Completada,
    Terminada,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Postulada => "postulada",
            ApplicationStatus::Oferta => "oferta",
            ApplicationStatus::Aceptada => "aceptada",
            ApplicationStatus::Rechazada => "rechazada",
            ApplicationStatus::Retirada => "retirada",
            ApplicationStatus::Completada => "completada",
            ApplicationStatus::Terminada => "terminada",
        }
    }

    /// Still moving through review or offer; may be withdrawn.
    pub const fn is_open(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Submitted | ApplicationStatus::Postulada | ApplicationStatus::Oferta
        )
    }

    /// No transition leaves these states.
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Rechazada
                | ApplicationStatus::Retirada
                | ApplicationStatus::Completada
                | ApplicationStatus::Terminada
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ApplicationStatus::Submitted),
            "postulada" => Ok(ApplicationStatus::Postulada),
            "oferta" => Ok(ApplicationStatus::Oferta),
            "aceptada" => Ok(ApplicationStatus::Aceptada),
            "rechazada" => Ok(ApplicationStatus::Rechazada),
            "retirada" => Ok(ApplicationStatus::Retirada),
            "completada" => Ok(ApplicationStatus::Completada),
            "terminada" => Ok(ApplicationStatus::Terminada),
            other => Err(format!("unknown application status `{other}`")),
        }
    }
}

/// Last decision recorded on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_decision", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Reviewed,
    Offered,
    Rejected,
    Accepted,
    Declined,
    Expired,
    Withdrawn,
    Completed,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Application {
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

impl Application {
    pub fn new(student_id: Uuid, vacancy_id: Uuid, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            vacancy_id,
            status: ApplicationStatus::Postulada,
            applied_at,
            offer_expires_at: None,
            decision: None,
            decision_at: None,
            auto_declined: false,
        }
    }

    pub(crate) fn decide(&mut self, status: ApplicationStatus, decision: Decision, at: DateTime<Utc>) {
        self.status = status;
        self.decision = Some(decision);
        self.decision_at = Some(at);
        if status != ApplicationStatus::Oferta {
            self.offer_expires_at = None;
        }
    }
}
