use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::UserSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i32,
    pub education: String,
    /// Whole currency units as charged by the payment gateway.
    pub consultation_fee: i64,
    pub is_available: bool,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDoctorProfile {
    pub user_id: Uuid,
    pub specialization: String,
    pub license_number: String,
    pub experience_years: i32,
    pub education: String,
    pub consultation_fee: i64,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DoctorProfilePatch {
    pub specialization: Option<String>,
    pub experience_years: Option<i32>,
    pub education: Option<String>,
    pub consultation_fee: Option<i64>,
    pub is_available: Option<bool>,
    pub bio: Option<String>,
}

/// A doctor as shown in discovery results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorListing {
    #[serde(flatten)]
    pub user: UserSummary,
    pub doctor_profile: DoctorProfile,
}
