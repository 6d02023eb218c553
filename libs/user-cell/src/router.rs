use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_models::auth::RoleSet;
use shared_utils::{auth_middleware, role_gate, AppContext};

use crate::handlers;

/// Admin-only user management.
pub fn user_routes(state: AppContext) -> Router {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/{user_id}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::deactivate_user),
        )
        .route(
            "/{user_id}/doctor-profile",
            post(handlers::create_doctor_profile).put(handlers::update_doctor_profile),
        )
        .layer(middleware::from_fn_with_state(RoleSet::ADMIN_ONLY, role_gate))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
