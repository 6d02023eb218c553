use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_models::user::UserWithProfile;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserWithProfile,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Only patient and doctor accounts can self-register")]
    RoleNotAllowed,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    Deactivated,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error("User not found")]
    NotFound,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token issuance failed: {0}")]
    Token(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::EmailTaken => AppError::Conflict(err.to_string()),
            AccountError::RoleNotAllowed => AppError::BadRequest(err.to_string()),
            AccountError::InvalidCredentials | AccountError::Deactivated => {
                AppError::Auth(err.to_string())
            }
            AccountError::WrongPassword => AppError::BadRequest(err.to_string()),
            AccountError::NotFound => AppError::NotFound(err.to_string()),
            AccountError::Hashing(_) | AccountError::Token(_) => AppError::Internal(err.to_string()),
            AccountError::Store(inner) => inner.into(),
        }
    }
}
