use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_models::auth::RoleSet;
use shared_utils::{auth_middleware, role_gate, AppContext};

use crate::handlers;
use crate::services::gateway::PaymentGateway;

#[derive(Clone)]
pub struct PaymentState {
    pub ctx: AppContext,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl PaymentState {
    pub fn new(ctx: AppContext, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { ctx, gateway }
    }
}

pub fn payment_routes(state: PaymentState) -> Router {
    let patient_only = Router::new()
        .route("/", post(handlers::create_payment))
        .layer(middleware::from_fn_with_state(RoleSet::PATIENT_ONLY, role_gate));

    // The webhook is added after the auth layer so it stays public.
    Router::new()
        .route("/history", get(handlers::payment_history))
        .route("/{payment_id}/status", get(handlers::payment_status))
        .merge(patient_only)
        .layer(middleware::from_fn_with_state(state.ctx.clone(), auth_middleware))
        .route("/webhook", post(handlers::gateway_webhook))
        .with_state(state)
}
