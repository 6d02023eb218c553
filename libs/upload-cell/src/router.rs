use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware, routing::post, Router};

use shared_utils::{auth_middleware, AppContext};

use crate::handlers;
use crate::services::storage::ObjectStorage;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 16 * 1024;

#[derive(Clone)]
pub struct UploadState {
    pub ctx: AppContext,
    pub storage: Arc<dyn ObjectStorage>,
}

impl UploadState {
    pub fn new(ctx: AppContext, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { ctx, storage }
    }
}

pub fn upload_routes(state: UploadState) -> Router {
    let body_limit = state.storage.max_size() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/", post(handlers::upload_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.ctx.clone(), auth_middleware))
        .with_state(state)
}
