use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::consultation::ConsultationStatus;
use shared_models::error::AppError;
use shared_models::message::{Message, MessageType};
use shared_models::payment::PaymentStatus;
use shared_models::user::UserSummary;

pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub consultation_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<UserSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: u64,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Consultation not found")]
    ConsultationNotFound,

    #[error("Consultation is not active")]
    NotActive(ConsultationStatus),

    #[error("Payment required before sending messages")]
    PaymentRequired(Option<PaymentStatus>),

    #[error("fileUrl is required for {0} messages")]
    MissingFile(&'static str),

    #[error("Message not found")]
    MessageNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MessagingError> for AppError {
    fn from(err: MessagingError) -> Self {
        match err {
            MessagingError::ConsultationNotFound | MessagingError::MessageNotFound => {
                AppError::NotFound(err.to_string())
            }
            MessagingError::NotActive(_) => AppError::PreconditionFailed(err.to_string()),
            MessagingError::PaymentRequired(_) => AppError::PaymentRequired(err.to_string()),
            MessagingError::MissingFile(_) => AppError::BadRequest(err.to_string()),
            MessagingError::Store(inner) => inner.into(),
        }
    }
}
