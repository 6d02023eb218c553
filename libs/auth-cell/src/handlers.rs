use axum::extract::{Extension, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{AuthUser, TokenResponse};
use shared_models::error::AppError;
use shared_models::response::ApiResponse;
use shared_models::user::UserWithProfile;
use shared_utils::jwt::validate_token;
use shared_utils::{ApiJson, AppContext, Validator};

use crate::models::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
};
use crate::services::account::AccountService;

const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(ctx): State<AppContext>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    Validator::new()
        .email("email", &request.email)
        .min_len("password", &request.password, MIN_PASSWORD_LEN)
        .required("fullName", &request.full_name)
        .phone("phone", request.phone.as_deref())
        .finish()?;

    let response = AccountService::new(&ctx).register(request).await?;
    Ok(ApiResponse::created(response, "User registered successfully"))
}

pub async fn login(
    State(ctx): State<AppContext>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<AuthResponse>, AppError> {
    Validator::new()
        .email("email", &request.email)
        .required("password", &request.password)
        .finish()?;

    let response = AccountService::new(&ctx)
        .login(&request.email, &request.password)
        .await?;
    Ok(ApiResponse::ok(response, "Login successful"))
}

pub async fn get_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<UserWithProfile>, AppError> {
    let profile = AccountService::new(&ctx).profile(user.id).await?;
    Ok(ApiResponse::ok(profile, "Profile retrieved successfully"))
}

pub async fn update_profile(
    State(ctx): State<AppContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<UpdateProfileRequest>,
) -> Result<ApiResponse<UserWithProfile>, AppError> {
    let mut validator = Validator::new();
    if let Some(full_name) = &request.full_name {
        validator.required("fullName", full_name);
    }
    validator.phone("phone", request.phone.as_deref()).finish()?;

    let profile = AccountService::new(&ctx).update_profile(user.id, request).await?;
    Ok(ApiResponse::ok(profile, "Profile updated successfully"))
}

pub async fn change_password(
    State(ctx): State<AppContext>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, AppError> {
    Validator::new()
        .required("currentPassword", &request.current_password)
        .min_len("newPassword", &request.new_password, MIN_PASSWORD_LEN)
        .finish()?;

    AccountService::new(&ctx)
        .change_password(user.id, &request.current_password, &request.new_password)
        .await?;
    Ok(ApiResponse::message_only("Password changed successfully"))
}

/// Signature and expiry check only; does not touch the user table.
pub async fn verify_token(
    State(ctx): State<AppContext>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<ApiResponse<TokenResponse>, AppError> {
    debug!("Verifying token");

    let claims = validate_token(auth.token(), &ctx.config.jwt_secret).map_err(AppError::Auth)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid token subject".to_string()))?;

    Ok(ApiResponse::ok(
        TokenResponse {
            valid: true,
            user_id,
            role: claims.role,
        },
        "Token is valid",
    ))
}
