use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_models::auth::RoleSet;
use shared_utils::{auth_middleware, role_gate, AppContext};

use crate::handlers;

pub fn doctor_routes(state: AppContext) -> Router {
    let doctor_only = Router::new()
        .route("/profile", put(handlers::update_own_profile))
        .layer(middleware::from_fn_with_state(RoleSet::DOCTOR_ONLY, role_gate));

    Router::new()
        .route("/available", get(handlers::list_available_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .merge(doctor_only)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
