use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::context::AppContext;
use crate::jwt::validate_token;

pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let user = authenticate(&ctx, token).await?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Access token required".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Verifies the credential and resolves it to a live, active account.
pub async fn authenticate(ctx: &AppContext, token: &str) -> Result<AuthUser, AppError> {
    let claims = validate_token(token, &ctx.config.jwt_secret).map_err(AppError::Auth)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid token subject".to_string()))?;

    let user = ctx
        .db
        .users
        .find_user(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            debug!("Token for unknown or inactive user {}", user_id);
            AppError::Auth("User not found or inactive".to_string())
        })?;

    Ok(AuthUser {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role,
    })
}

pub fn extract_user<B>(request: &Request<B>) -> Result<AuthUser, AppError> {
    request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))
}
