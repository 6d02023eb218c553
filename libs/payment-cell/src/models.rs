use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::consultation::Consultation;
use shared_models::error::AppError;
use shared_models::payment::{Payment, PaymentStatus};
use shared_models::user::UserSummary;

use crate::services::gateway::GatewayError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub consultation_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentHistoryQuery {
    pub status: Option<PaymentStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Result of `initiate`: the stored payment plus the hosted checkout handle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedPayment {
    pub payment: Payment,
    pub snap_token: String,
    pub snap_redirect_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistoryItem {
    #[serde(flatten)]
    pub payment: Payment,
    pub consultation: Option<Consultation>,
    pub doctor: Option<UserSummary>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Consultation not found")]
    ConsultationNotFound,

    #[error("Only the consultation's patient can pay for it")]
    NotConsultationPatient,

    #[error("Payment already exists for this consultation")]
    AlreadyExists,

    #[error("Doctor profile not found")]
    DoctorProfileNotFound,

    #[error("Payment not found")]
    NotFound,

    #[error("Access denied to this payment")]
    NotPayer,

    #[error("Payment was modified concurrently, please retry")]
    Contention,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ConsultationNotFound
            | PaymentError::DoctorProfileNotFound
            | PaymentError::NotFound => AppError::NotFound(err.to_string()),
            PaymentError::NotConsultationPatient | PaymentError::NotPayer => {
                AppError::Forbidden(err.to_string())
            }
            PaymentError::AlreadyExists | PaymentError::Contention => {
                AppError::Conflict(err.to_string())
            }
            PaymentError::Gateway(GatewayError::NotConfigured) => {
                AppError::UpstreamUnavailable("Payment gateway is not configured".to_string())
            }
            PaymentError::Gateway(_) => {
                AppError::UpstreamUnavailable("Payment gateway unavailable".to_string())
            }
            PaymentError::Store(inner) => inner.into(),
        }
    }
}
