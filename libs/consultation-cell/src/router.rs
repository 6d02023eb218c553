use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_models::auth::RoleSet;
use shared_utils::{auth_middleware, role_gate, AppContext};

use realtime_cell::RoomRelay;

use crate::handlers;

#[derive(Clone)]
pub struct ConsultationState {
    pub ctx: AppContext,
    pub relay: Arc<dyn RoomRelay>,
}

impl ConsultationState {
    pub fn new(ctx: AppContext, relay: Arc<dyn RoomRelay>) -> Self {
        Self { ctx, relay }
    }
}

impl FromRef<ConsultationState> for AppContext {
    fn from_ref(state: &ConsultationState) -> Self {
        state.ctx.clone()
    }
}

pub fn consultation_routes(state: ConsultationState) -> Router {
    let patient_only = Router::new()
        .route("/", post(handlers::create_consultation))
        .layer(middleware::from_fn_with_state(RoleSet::PATIENT_ONLY, role_gate));

    let doctor_only = Router::new()
        .route("/{consultation_id}/status", put(handlers::update_consultation_status))
        .layer(middleware::from_fn_with_state(RoleSet::DOCTOR_ONLY, role_gate));

    Router::new()
        .route("/", get(handlers::list_consultations))
        .route("/doctors/available", get(doctor_cell::handlers::list_available_doctors))
        .route("/{consultation_id}", get(handlers::get_consultation))
        .merge(patient_only)
        .merge(doctor_only)
        .layer(middleware::from_fn_with_state(state.ctx.clone(), auth_middleware))
        .with_state(state)
}
