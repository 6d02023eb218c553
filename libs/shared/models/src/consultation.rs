use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Pending => "PENDING",
            ConsultationStatus::Active => "ACTIVE",
            ConsultationStatus::Completed => "COMPLETED",
            ConsultationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ConsultationStatus::Pending),
            "ACTIVE" => Ok(ConsultationStatus::Active),
            "COMPLETED" => Ok(ConsultationStatus::Completed),
            "CANCELLED" => Ok(ConsultationStatus::Cancelled),
            other => Err(format!("Unknown consultation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: ConsultationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Consultation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.doctor_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub title: String,
    pub description: String,
}

/// Which consultations a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsultationScope {
    Patient(Uuid),
    Doctor(Uuid),
    All,
}

impl ConsultationScope {
    pub fn includes(&self, consultation: &Consultation) -> bool {
        match self {
            ConsultationScope::Patient(id) => consultation.patient_id == *id,
            ConsultationScope::Doctor(id) => consultation.doctor_id == *id,
            ConsultationScope::All => true,
        }
    }
}

/// Conditional status write: applied only while the stored status equals `expected`.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub expected: ConsultationStatus,
    pub new_status: ConsultationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}
