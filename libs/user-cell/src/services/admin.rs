use tracing::info;
use uuid::Uuid;

use auth_cell::services::account::normalize_email;
use auth_cell::PasswordService;
use shared_database::{Database, StoreError};
use shared_models::user::{NewUser, User, UserFilter, UserPatch, UserWithProfile};
use shared_models::response::Page;
use shared_utils::AppContext;

use crate::models::{AdminUpdateUserRequest, CreateUserRequest, UserAdminError};

pub struct UserAdminService {
    db: Database,
}

impl UserAdminService {
    pub fn new(ctx: &AppContext) -> Self {
        Self { db: ctx.db.clone() }
    }

    pub async fn list(&self, filter: UserFilter, page: Page) -> Result<(Vec<User>, u64), UserAdminError> {
        Ok(self.db.users.list_users(&filter, page).await?)
    }

    /// Unlike self-registration, admins may create accounts of any role.
    pub async fn create(&self, request: CreateUserRequest) -> Result<User, UserAdminError> {
        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| UserAdminError::Hashing(e.to_string()))?;

        let user = self
            .db
            .users
            .insert_user(NewUser {
                email: normalize_email(&request.email),
                password_hash,
                full_name: request.full_name.trim().to_string(),
                phone: request.phone,
                role: request.role,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => UserAdminError::EmailTaken,
                other => UserAdminError::Store(other),
            })?;

        info!("Admin created {} account {}", user.role, user.id);
        Ok(user)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<UserWithProfile, UserAdminError> {
        let user = self
            .db
            .users
            .find_user(user_id)
            .await?
            .ok_or(UserAdminError::NotFound)?;
        let doctor_profile = self.db.doctors.find_profile_by_user(user_id).await?;
        Ok(UserWithProfile { user, doctor_profile })
    }

    pub async fn update(&self, user_id: Uuid, request: AdminUpdateUserRequest) -> Result<User, UserAdminError> {
        self.patch(
            user_id,
            UserPatch {
                full_name: request.full_name,
                phone: request.phone,
                photo: request.photo,
                is_active: request.is_active,
                password_hash: None,
            },
        )
        .await
    }

    /// Accounts are never removed, only switched off.
    pub async fn deactivate(&self, user_id: Uuid) -> Result<User, UserAdminError> {
        let user = self
            .patch(
                user_id,
                UserPatch {
                    is_active: Some(false),
                    ..UserPatch::default()
                },
            )
            .await?;
        info!("User {} deactivated", user_id);
        Ok(user)
    }

    async fn patch(&self, user_id: Uuid, patch: UserPatch) -> Result<User, UserAdminError> {
        self.db
            .users
            .update_user(user_id, patch)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => UserAdminError::NotFound,
                other => UserAdminError::Store(other),
            })
    }
}
