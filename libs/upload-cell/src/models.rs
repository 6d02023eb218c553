use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_name: String,
    pub file_name: String,
    pub file_url: String,
    pub file_size: usize,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFile,

    #[error("File type not allowed")]
    TypeNotAllowed(String),

    #[error("File too large")]
    TooLarge { size: usize, max: usize },

    #[error("Malformed upload: {0}")]
    Multipart(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::NoFile
            | UploadError::TypeNotAllowed(_)
            | UploadError::TooLarge { .. }
            | UploadError::Multipart(_) => AppError::BadRequest(err.to_string()),
            UploadError::Io(inner) => AppError::Internal(inner.to_string()),
        }
    }
}
