use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{Database, StoreError};
use shared_models::auth::Role;
use shared_models::user::{NewUser, User, UserPatch, UserWithProfile};
use shared_utils::jwt::issue_token;
use shared_utils::AppContext;

use crate::models::{AccountError, AuthResponse, RegisterRequest, UpdateProfileRequest};
use crate::services::password::PasswordService;

pub struct AccountService {
    db: Database,
    jwt_secret: String,
    jwt_expires_in_hours: i64,
}

impl AccountService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            db: ctx.db.clone(),
            jwt_secret: ctx.config.jwt_secret.clone(),
            jwt_expires_in_hours: ctx.config.jwt_expires_in_hours,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AccountError> {
        let role = request.role.unwrap_or(Role::Patient);
        if role == Role::Admin {
            return Err(AccountError::RoleNotAllowed);
        }

        let email = normalize_email(&request.email);
        debug!("Registering {} account for {}", role, email);

        if self.db.users.find_user_by_email(&email).await?.is_some() {
            return Err(AccountError::EmailTaken);
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;

        let user = self
            .db
            .users
            .insert_user(NewUser {
                email,
                password_hash,
                full_name: request.full_name.trim().to_string(),
                phone: request.phone,
                role,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => AccountError::EmailTaken,
                other => AccountError::Store(other),
            })?;

        info!("User {} registered with role {}", user.id, user.role);
        let token = self.token_for(&user)?;
        Ok(AuthResponse {
            user: UserWithProfile {
                user,
                doctor_profile: None,
            },
            token,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AccountError> {
        let email = normalize_email(email);
        let user = self
            .db
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !user.is_active {
            warn!("Login attempt on deactivated account {}", user.id);
            return Err(AccountError::Deactivated);
        }

        let valid = PasswordService::verify_password(password, &user.password_hash)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;
        if !valid {
            debug!("Wrong password for {}", user.id);
            return Err(AccountError::InvalidCredentials);
        }

        let token = self.token_for(&user)?;
        Ok(AuthResponse {
            user: self.with_profile(user).await?,
            token,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<UserWithProfile, AccountError> {
        let user = self
            .db
            .users
            .find_user(user_id)
            .await?
            .ok_or(AccountError::NotFound)?;
        self.with_profile(user).await
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserWithProfile, AccountError> {
        let patch = UserPatch {
            full_name: request.full_name.map(|n| n.trim().to_string()),
            phone: request.phone,
            photo: request.photo,
            ..UserPatch::default()
        };
        let user = self
            .db
            .users
            .update_user(user_id, patch)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AccountError::NotFound,
                other => AccountError::Store(other),
            })?;
        self.with_profile(user).await
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let user = self
            .db
            .users
            .find_user(user_id)
            .await?
            .ok_or(AccountError::NotFound)?;

        let valid = PasswordService::verify_password(current_password, &user.password_hash)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;
        if !valid {
            return Err(AccountError::WrongPassword);
        }

        let password_hash = PasswordService::hash_password(new_password)
            .map_err(|e| AccountError::Hashing(e.to_string()))?;
        self.db
            .users
            .update_user(
                user_id,
                UserPatch {
                    password_hash: Some(password_hash),
                    ..UserPatch::default()
                },
            )
            .await?;

        info!("Password changed for user {}", user_id);
        Ok(())
    }

    async fn with_profile(&self, user: User) -> Result<UserWithProfile, AccountError> {
        let doctor_profile = if user.role == Role::Doctor {
            self.db.doctors.find_profile_by_user(user.id).await?
        } else {
            None
        };
        Ok(UserWithProfile {
            user,
            doctor_profile,
        })
    }

    fn token_for(&self, user: &User) -> Result<String, AccountError> {
        issue_token(user.id, user.role, &self.jwt_secret, self.jwt_expires_in_hours)
            .map_err(AccountError::Token)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
