use serde::Deserialize;
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDoctorProfileRequest {
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i32,
    pub education: String,
    pub consultation_fee: i64,
    pub bio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDoctorProfileRequest {
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub education: Option<String>,
    pub consultation_fee: Option<i64>,
    pub is_available: Option<bool>,
    pub bio: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailableDoctorsQuery {
    pub specialization: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor not found or not available")]
    Unavailable,

    #[error("User not found")]
    UserNotFound,

    #[error("User is not a doctor")]
    NotADoctor,

    #[error("Doctor profile not found")]
    ProfileNotFound,

    #[error("Doctor profile already exists for this user")]
    ProfileExists,

    #[error("License number is already registered")]
    LicenseTaken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound
            | DoctorError::Unavailable
            | DoctorError::UserNotFound
            | DoctorError::ProfileNotFound => AppError::NotFound(err.to_string()),
            DoctorError::NotADoctor => AppError::BadRequest(err.to_string()),
            DoctorError::ProfileExists | DoctorError::LicenseTaken => {
                AppError::Conflict(err.to_string())
            }
            DoctorError::Store(inner) => inner.into(),
        }
    }
}
