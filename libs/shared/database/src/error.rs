use thiserror::Error;

use shared_models::error::AppError;

use crate::supabase::SupabaseError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Check constraint violated: {0}")]
    CheckViolation(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(detail) => StoreError::UniqueViolation(detail),
            SupabaseError::Constraint(detail) => StoreError::CheckViolation(detail),
            SupabaseError::NotFound(_) => StoreError::NotFound,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound("Record not found".to_string()),
            StoreError::UniqueViolation(detail) => {
                AppError::Conflict(format!("Record already exists ({})", detail))
            }
            StoreError::CheckViolation(detail) => AppError::BadRequest(detail),
            StoreError::Backend(detail) => AppError::Database(detail),
        }
    }
}
