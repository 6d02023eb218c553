use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{Database, StoreError};
use shared_models::auth::Role;
use shared_models::doctor::{DoctorListing, DoctorProfile, DoctorProfilePatch, NewDoctorProfile};
use shared_models::response::Page;
use shared_models::user::User;
use shared_utils::AppContext;

use crate::models::{CreateDoctorProfileRequest, DoctorError, UpdateDoctorProfileRequest};

pub struct DoctorService {
    db: Database,
}

impl DoctorService {
    pub fn new(ctx: &AppContext) -> Self {
        Self { db: ctx.db.clone() }
    }

    /// Admin action. Uniqueness of user and license is left to storage.
    pub async fn create_profile(
        &self,
        user_id: Uuid,
        request: CreateDoctorProfileRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        let user = self
            .db
            .users
            .find_user(user_id)
            .await?
            .ok_or(DoctorError::UserNotFound)?;
        if user.role != Role::Doctor {
            return Err(DoctorError::NotADoctor);
        }

        let profile = self
            .db
            .doctors
            .insert_profile(NewDoctorProfile {
                user_id,
                specialization: request.specialization.trim().to_string(),
                license_number: request.license_number.trim().to_string(),
                experience_years: request.experience_years,
                education: request.education,
                consultation_fee: request.consultation_fee,
                bio: request.bio,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(constraint) if constraint.contains("license") => {
                    DoctorError::LicenseTaken
                }
                StoreError::UniqueViolation(_) => DoctorError::ProfileExists,
                other => DoctorError::Store(other),
            })?;

        info!("Doctor profile {} created for user {}", profile.id, user_id);
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateDoctorProfileRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        let patch = DoctorProfilePatch {
            specialization: request.specialization,
            experience_years: request.experience_years,
            education: request.education,
            consultation_fee: request.consultation_fee,
            is_available: request.is_available,
            bio: request.bio,
        };

        self.db
            .doctors
            .update_profile_by_user(user_id, patch)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => DoctorError::ProfileNotFound,
                other => DoctorError::Store(other),
            })
    }

    pub async fn get_doctor(&self, user_id: Uuid) -> Result<DoctorListing, DoctorError> {
        let (user, profile) = self.load(user_id).await?.ok_or(DoctorError::NotFound)?;
        Ok(DoctorListing {
            user: user.summary(),
            doctor_profile: profile,
        })
    }

    /// The doctor must be active, have a profile, and be marked available.
    pub async fn require_available(&self, user_id: Uuid) -> Result<(User, DoctorProfile), DoctorError> {
        match self.load(user_id).await? {
            Some((user, profile)) if profile.is_available => Ok((user, profile)),
            _ => {
                debug!("Doctor {} is not available for consultations", user_id);
                Err(DoctorError::Unavailable)
            }
        }
    }

    pub async fn list_available(
        &self,
        specialization: Option<&str>,
        page: Page,
    ) -> Result<(Vec<DoctorListing>, u64), DoctorError> {
        Ok(self.db.doctors.list_available_doctors(specialization, page).await?)
    }

    async fn load(&self, user_id: Uuid) -> Result<Option<(User, DoctorProfile)>, DoctorError> {
        let user = match self.db.users.find_user(user_id).await? {
            Some(user) if user.is_active && user.role == Role::Doctor => user,
            _ => return Ok(None),
        };
        let profile = self.db.doctors.find_profile_by_user(user_id).await?;
        Ok(profile.map(|p| (user, p)))
    }
}
