use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::{auth_middleware, AppContext};

use crate::handlers;

pub fn auth_routes(state: AppContext) -> Router {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/verify", post(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/profile", get(handlers::get_profile).put(handlers::update_profile))
        .route("/change-password", put(handlers::change_password))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
