use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use realtime_cell::{realtime_routes, BroadcastRelay, RealtimeState};
use shared_models::auth::Role;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn state(config: &TestConfig) -> RealtimeState {
    RealtimeState::new(config.context(), Arc::new(BroadcastRelay::default()))
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = realtime_routes(state(&TestConfig::default()));

    let response = app
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let app = realtime_routes(state(&TestConfig::default()));
    let token = JwtTestUtils::create_invalid_signature_token(uuid::Uuid::new_v4(), Role::Patient);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/ws?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_without_upgrade_headers_is_bad_request() {
    let config = TestConfig::default();
    let state = state(&config);
    let (_, token) = TestUser::patient("ws@example.com").seed(&state.ctx).await;
    let app = realtime_routes(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/ws?token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
