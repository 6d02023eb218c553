use axum::extract::{Extension, State};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::doctor::{DoctorListing, DoctorProfile};
use shared_models::error::AppError;
use shared_models::response::{ApiResponse, Page, Pagination};
use shared_utils::pagination::DEFAULT_PAGE_SIZE;
use shared_utils::{ApiJson, ApiPath, ApiQuery, AppContext, Validator};

use crate::models::{AvailableDoctorsQuery, UpdateDoctorProfileRequest};
use crate::services::doctor::DoctorService;

#[axum::debug_handler]
pub async fn list_available_doctors(
    State(ctx): State<AppContext>,
    ApiQuery(query): ApiQuery<AvailableDoctorsQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let page = Page::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let specialization = query.specialization.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let (doctors, total) = DoctorService::new(&ctx)
        .list_available(specialization, page)
        .await?;

    Ok(ApiResponse::ok(
        json!({
            "doctors": doctors,
            "pagination": Pagination::new(page, total),
        }),
        "Available doctors retrieved successfully",
    ))
}

pub async fn get_doctor(
    State(ctx): State<AppContext>,
    ApiPath(doctor_id): ApiPath<Uuid>,
) -> Result<ApiResponse<DoctorListing>, AppError> {
    let doctor = DoctorService::new(&ctx).get_doctor(doctor_id).await?;
    Ok(ApiResponse::ok(doctor, "Doctor retrieved successfully"))
}

pub async fn update_own_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<UpdateDoctorProfileRequest>,
) -> Result<ApiResponse<DoctorProfile>, AppError> {
    validate_update(&request)?;

    let profile = DoctorService::new(&ctx).update_profile(user.id, request).await?;
    Ok(ApiResponse::ok(profile, "Doctor profile updated successfully"))
}

pub fn validate_update(request: &UpdateDoctorProfileRequest) -> Result<(), AppError> {
    let mut validator = Validator::new();
    if let Some(fee) = request.consultation_fee {
        validator.non_negative("consultationFee", fee);
    }
    if let Some(years) = request.experience_years {
        validator.non_negative("experienceYears", years.into());
    }
    if let Some(specialization) = &request.specialization {
        validator.required("specialization", specialization);
    }
    validator.finish()
}
