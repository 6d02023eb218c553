use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_utils::{auth_middleware, AppContext};

use realtime_cell::RoomRelay;

use crate::handlers;

#[derive(Clone)]
pub struct MessagingState {
    pub ctx: AppContext,
    pub relay: Arc<dyn RoomRelay>,
}

impl MessagingState {
    pub fn new(ctx: AppContext, relay: Arc<dyn RoomRelay>) -> Self {
        Self { ctx, relay }
    }
}

/// Every route is open to any authenticated role; the gate checks participation.
pub fn messaging_routes(state: MessagingState) -> Router {
    Router::new()
        .route("/", post(handlers::send_message))
        .route("/consultation/{consultation_id}", get(handlers::get_messages))
        .route("/consultation/{consultation_id}/read", put(handlers::mark_as_read))
        .route("/unread/count", get(handlers::unread_count))
        .route("/{message_id}", delete(handlers::delete_message))
        .layer(middleware::from_fn_with_state(state.ctx.clone(), auth_middleware))
        .with_state(state)
}
