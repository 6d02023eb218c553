use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use consultation_cell::{consultation_routes, ConsultationState};
use realtime_cell::BroadcastRelay;
use shared_models::doctor::NewDoctorProfile;
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::AppContext;

fn app(ctx: &AppContext) -> Router {
    let state = ConsultationState::new(ctx.clone(), Arc::new(BroadcastRelay::default()));
    Router::new().nest("/consultations", consultation_routes(state))
}

async fn call(ctx: &AppContext, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app(ctx).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn seed_doctor(ctx: &AppContext) -> (uuid::Uuid, String) {
    let (doctor, token) = TestUser::doctor("doctor@example.com").seed(ctx).await;
    ctx.db
        .doctors
        .insert_profile(NewDoctorProfile {
            user_id: doctor.id,
            specialization: "Dermatology".to_string(),
            license_number: "STR-200".to_string(),
            experience_years: 8,
            education: "UNAIR".to_string(),
            consultation_fee: 75_000,
            bio: Some("Skin specialist".to_string()),
        })
        .await
        .unwrap();
    (doctor.id, token)
}

#[tokio::test]
async fn requires_authentication() {
    let ctx = TestConfig::default().context();

    let (status, body) = call(&ctx, "GET", "/consultations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn lists_available_doctors_by_specialization() {
    let ctx = TestConfig::default().context();
    seed_doctor(&ctx).await;
    let (_, patient) = TestUser::patient("patient@example.com").seed(&ctx).await;

    let (status, body) = call(
        &ctx,
        "GET",
        "/consultations/doctors/available?specialization=derma",
        Some(&patient),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["totalCount"], 1);

    let (_, body) = call(
        &ctx,
        "GET",
        "/consultations/doctors/available?specialization=cardio",
        Some(&patient),
        None,
    )
    .await;
    assert_eq!(body["data"]["pagination"]["totalCount"], 0);
}

#[tokio::test]
async fn doctors_cannot_create_and_patients_cannot_transition() {
    let ctx = TestConfig::default().context();
    let (doctor_id, doctor) = seed_doctor(&ctx).await;
    let (_, patient) = TestUser::patient("patient@example.com").seed(&ctx).await;
    let request = json!({
        "doctorId": doctor_id,
        "title": "Rash",
        "description": "Itchy rash on the arm"
    });

    let (status, _) = call(&ctx, "POST", "/consultations", Some(&doctor), Some(request.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&ctx, "POST", "/consultations", Some(&patient), Some(request)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "PENDING");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/consultations/{}/status", id);
    let (status, _) = call(&ctx, "PUT", &uri, Some(&patient), Some(json!({"status": "ACTIVE"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&ctx, "PUT", &uri, Some(&doctor), Some(json!({"status": "ACTIVE"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["startedAt"].is_string());

    let (status, _) = call(&ctx, "PUT", &uri, Some(&doctor), Some(json!({"status": "PENDING"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_validates_input() {
    let ctx = TestConfig::default().context();
    let (doctor_id, _) = seed_doctor(&ctx).await;
    let (_, patient) = TestUser::patient("patient@example.com").seed(&ctx).await;

    let (status, body) = call(
        &ctx,
        "POST",
        "/consultations",
        Some(&patient),
        Some(json!({"doctorId": doctor_id, "title": " ", "description": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "title");
}

#[tokio::test]
async fn detail_includes_participants() {
    let ctx = TestConfig::default().context();
    let (doctor_id, doctor) = seed_doctor(&ctx).await;
    let (_, patient) = TestUser::patient("patient@example.com").seed(&ctx).await;

    let (_, body) = call(
        &ctx,
        "POST",
        "/consultations",
        Some(&patient),
        Some(json!({"doctorId": doctor_id, "title": "Acne", "description": "Since March"})),
    )
    .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&ctx, "GET", &format!("/consultations/{}", id), Some(&doctor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["doctor"]["id"], json!(doctor_id));
    assert_eq!(body["data"]["messages"], json!([]));
    assert!(body["data"]["payment"].is_null());

    let (_, body) = call(&ctx, "GET", "/consultations", Some(&doctor), None).await;
    assert_eq!(body["data"]["consultations"][0]["messageCount"], 0);
}

#[tokio::test]
async fn malformed_requests_get_the_error_envelope() {
    let ctx = TestConfig::default().context();
    let (_, token) = TestUser::patient("patient@example.com").seed(&ctx).await;

    let (status, body) = call(&ctx, "POST", "/consultations", Some(&token), Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("doctorId"));
    assert!(body["timestamp"].is_string());

    let (status, body) = call(&ctx, "GET", "/consultations/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = call(&ctx, "GET", "/consultations?page=first", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
