use std::sync::Arc;
use std::time::Instant;

use axum::{response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde_json::json;
use tower_http::services::ServeDir;

use auth_cell::router::auth_routes;
use consultation_cell::{consultation_routes, ConsultationState};
use doctor_cell::router::doctor_routes;
use messaging_cell::{messaging_routes, MessagingState};
use payment_cell::{payment_routes, PaymentGateway, PaymentState};
use realtime_cell::{realtime_routes, RealtimeState, RoomRelay};
use shared_models::error::AppError;
use shared_utils::AppContext;
use upload_cell::{upload_routes, ObjectStorage, UploadState};
use user_cell::router::user_routes;

/// Collaborators built once at startup and injected into the cells.
#[derive(Clone)]
pub struct AppServices {
    pub relay: Arc<dyn RoomRelay>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub storage: Arc<dyn ObjectStorage>,
}

pub fn create_router(ctx: AppContext, services: AppServices) -> Router {
    let started = Instant::now();
    let uploads = ServeDir::new(&ctx.config.upload_dir);

    Router::new()
        .route("/", get(banner))
        .route("/health", get(move || health(started)))
        .nest("/auth", auth_routes(ctx.clone()))
        .nest("/users", user_routes(ctx.clone()))
        .nest("/doctors", doctor_routes(ctx.clone()))
        .nest(
            "/consultations",
            consultation_routes(ConsultationState::new(ctx.clone(), services.relay.clone())),
        )
        .nest(
            "/payments",
            payment_routes(PaymentState::new(ctx.clone(), services.gateway.clone())),
        )
        .nest(
            "/messages",
            messaging_routes(MessagingState::new(ctx.clone(), services.relay.clone())),
        )
        .nest("/upload", upload_routes(UploadState::new(ctx.clone(), services.storage)))
        .merge(realtime_routes(RealtimeState::new(ctx, services.relay)))
        .nest_service("/uploads", uploads)
        .fallback(not_found)
}

async fn banner() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Telehealth Consultation API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": "/auth",
            "users": "/users",
            "doctors": "/doctors",
            "consultations": "/consultations",
            "payments": "/payments",
            "messages": "/messages",
            "upload": "/upload",
            "websocket": "/ws",
            "health": "/health"
        }
    }))
}

async fn health(started: Instant) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": started.elapsed().as_secs_f64(),
    }))
}

async fn not_found() -> AppError {
    AppError::NotFound("Endpoint not found".to_string())
}
