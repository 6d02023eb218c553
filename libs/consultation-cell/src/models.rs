use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::consultation::{Consultation, ConsultationStatus};
use shared_models::error::AppError;
use shared_models::message::Message;
use shared_models::payment::Payment;
use shared_models::user::UserSummary;

use doctor_cell::DoctorError;

// ==============================================================================
// REQUEST TYPES
// ==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationRequest {
    pub doctor_id: uuid::Uuid,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ConsultationStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListConsultationsQuery {
    pub status: Option<ConsultationStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ==============================================================================
// RESPONSE TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationSummary {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub patient: Option<UserSummary>,
    pub doctor: Option<UserSummary>,
    pub message_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationDetail {
    #[serde(flatten)]
    pub consultation: Consultation,
    pub patient: Option<UserSummary>,
    pub doctor: Option<UserSummary>,
    pub payment: Option<Payment>,
    /// Oldest first.
    pub messages: Vec<Message>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum ConsultationError {
    #[error("Consultation not found")]
    NotFound,

    #[error("Doctor not found or not available")]
    DoctorUnavailable,

    #[error("Patient and doctor must be different users")]
    SelfConsultation,

    #[error("Only the assigned doctor can update consultation status")]
    NotAssignedDoctor,

    #[error("Cannot change consultation status from {from} to {to}")]
    InvalidTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    #[error("Consultation was modified concurrently, please retry")]
    Contention,

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::NotFound | ConsultationError::DoctorUnavailable => {
                AppError::NotFound(err.to_string())
            }
            ConsultationError::SelfConsultation | ConsultationError::InvalidTransition { .. } => {
                AppError::BadRequest(err.to_string())
            }
            ConsultationError::NotAssignedDoctor => AppError::Forbidden(err.to_string()),
            ConsultationError::Contention => AppError::Conflict(err.to_string()),
            ConsultationError::Doctor(inner) => inner.into(),
            ConsultationError::Store(inner) => inner.into(),
        }
    }
}
