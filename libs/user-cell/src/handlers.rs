use axum::extract::State;
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::handlers::validate_update;
use doctor_cell::models::{CreateDoctorProfileRequest, UpdateDoctorProfileRequest};
use doctor_cell::DoctorService;
use shared_models::doctor::DoctorProfile;
use shared_models::error::AppError;
use shared_models::response::{ApiResponse, Page, Pagination};
use shared_models::user::{User, UserFilter, UserWithProfile};
use shared_utils::pagination::DEFAULT_PAGE_SIZE;
use shared_utils::{ApiJson, ApiPath, ApiQuery, AppContext, Validator};

use crate::models::{AdminUpdateUserRequest, CreateUserRequest, ListUsersQuery};
use crate::services::admin::UserAdminService;

pub async fn list_users(
    State(ctx): State<AppContext>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let page = Page::new(query.page, query.limit, DEFAULT_PAGE_SIZE);
    let filter = UserFilter {
        role: query.role,
        search: query.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };

    let (users, total) = UserAdminService::new(&ctx).list(filter, page).await?;
    Ok(ApiResponse::ok(
        json!({
            "users": users,
            "pagination": Pagination::new(page, total),
        }),
        "Users retrieved successfully",
    ))
}

pub async fn create_user(
    State(ctx): State<AppContext>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    Validator::new()
        .email("email", &request.email)
        .min_len("password", &request.password, 6)
        .required("fullName", &request.full_name)
        .phone("phone", request.phone.as_deref())
        .finish()?;

    let user = UserAdminService::new(&ctx).create(request).await?;
    Ok(ApiResponse::created(user, "User created successfully"))
}

pub async fn get_user(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<ApiResponse<UserWithProfile>, AppError> {
    let user = UserAdminService::new(&ctx).get(user_id).await?;
    Ok(ApiResponse::ok(user, "User retrieved successfully"))
}

pub async fn update_user(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<AdminUpdateUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let mut validator = Validator::new();
    if let Some(full_name) = &request.full_name {
        validator.required("fullName", full_name);
    }
    validator.phone("phone", request.phone.as_deref()).finish()?;

    let user = UserAdminService::new(&ctx).update(user_id, request).await?;
    Ok(ApiResponse::ok(user, "User updated successfully"))
}

pub async fn deactivate_user(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<ApiResponse<User>, AppError> {
    let user = UserAdminService::new(&ctx).deactivate(user_id).await?;
    Ok(ApiResponse::ok(user, "User deactivated successfully"))
}

// ==============================================================================
// DOCTOR PROFILE ADMINISTRATION
// ==============================================================================

pub async fn create_doctor_profile(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CreateDoctorProfileRequest>,
) -> Result<ApiResponse<DoctorProfile>, AppError> {
    Validator::new()
        .required("specialization", &request.specialization)
        .required("licenseNumber", &request.license_number)
        .required("education", &request.education)
        .non_negative("experienceYears", request.experience_years.into())
        .non_negative("consultationFee", request.consultation_fee)
        .finish()?;

    let profile = DoctorService::new(&ctx).create_profile(user_id, request).await?;
    Ok(ApiResponse::created(profile, "Doctor profile created successfully"))
}

pub async fn update_doctor_profile(
    State(ctx): State<AppContext>,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateDoctorProfileRequest>,
) -> Result<ApiResponse<DoctorProfile>, AppError> {
    validate_update(&request)?;

    let profile = DoctorService::new(&ctx).update_profile(user_id, request).await?;
    Ok(ApiResponse::ok(profile, "Doctor profile updated successfully"))
}
