use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payment_cell::MidtransClient;
use realtime_cell::BroadcastRelay;
use shared_config::AppConfig;
use shared_database::Database;
use shared_models::error::set_expose_internal_errors;
use shared_utils::AppContext;
use teleconsult_api::{create_router, AppServices};
use upload_cell::LocalDiskStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting telehealth consultation API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    set_expose_internal_errors(config.is_development());

    let db = Database::from_config(&config)?;
    let ctx = AppContext::new(config.clone(), db);

    let services = AppServices {
        relay: Arc::new(BroadcastRelay::default()),
        gateway: Arc::new(MidtransClient::new(&config)?),
        storage: Arc::new(LocalDiskStorage::new(config.upload_dir.clone(), config.max_file_size)),
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = create_router(ctx, services)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {} ({})", addr, config.environment);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
