use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use shared_models::auth::RoleSet;
use shared_models::error::AppError;

use crate::extractor::extract_user;

/// Rejects callers whose role is outside the route's declared set.
/// Must sit inside `auth_middleware`.
pub async fn role_gate(
    State(allowed): State<RoleSet>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = extract_user(&request)?;

    if !allowed.permits(user.role) {
        warn!(
            "User {} with role {} denied access to {}",
            user.id,
            user.role,
            request.uri().path()
        );
        return Err(AppError::Forbidden("Insufficient permissions".to_string()));
    }

    Ok(next.run(request).await)
}
