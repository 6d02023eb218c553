use std::sync::Arc;

use axum::{routing::get, Router};

use shared_utils::AppContext;

use crate::handlers;
use crate::services::relay::RoomRelay;

#[derive(Clone)]
pub struct RealtimeState {
    pub ctx: AppContext,
    pub relay: Arc<dyn RoomRelay>,
}

impl RealtimeState {
    pub fn new(ctx: AppContext, relay: Arc<dyn RoomRelay>) -> Self {
        Self { ctx, relay }
    }
}

pub fn realtime_routes(state: RealtimeState) -> Router {
    Router::new()
        .route("/ws", get(handlers::ws_handler))
        .with_state(state)
}
