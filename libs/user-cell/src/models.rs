use serde::Deserialize;
use thiserror::Error;

use shared_database::StoreError;
use shared_models::auth::Role;
use shared_models::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Error)]
pub enum UserAdminError {
    #[error("User not found")]
    NotFound,

    #[error("User with this email already exists")]
    EmailTaken,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UserAdminError> for AppError {
    fn from(err: UserAdminError) -> Self {
        match err {
            UserAdminError::NotFound => AppError::NotFound(err.to_string()),
            UserAdminError::EmailTaken => AppError::Conflict(err.to_string()),
            UserAdminError::Hashing(_) => AppError::Internal(err.to_string()),
            UserAdminError::Store(inner) => inner.into(),
        }
    }
}
