use assert_matches::assert_matches;
use axum::{
    body::Body,
    extract::{Extension, State},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::handlers::*;
use doctor_cell::models::*;
use doctor_cell::{doctor_routes, DoctorService};
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::user::User;
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::{ApiJson as Json, ApiPath as Path, ApiQuery as Query, AppContext};

fn profile_request(license: &str, specialization: &str) -> CreateDoctorProfileRequest {
    CreateDoctorProfileRequest {
        specialization: specialization.to_string(),
        license_number: license.to_string(),
        experience_years: 8,
        education: "Universitas Indonesia".to_string(),
        consultation_fee: 75_000,
        bio: Some("General practitioner".to_string()),
    }
}

async fn seed_doctor(ctx: &AppContext, email: &str, license: &str, specialization: &str) -> (User, String) {
    let (doctor, token) = TestUser::doctor(email).seed(ctx).await;
    DoctorService::new(ctx)
        .create_profile(doctor.id, profile_request(license, specialization))
        .await
        .unwrap();
    (doctor, token)
}

fn auth_user(user: &User) -> Extension<AuthUser> {
    Extension(AuthUser {
        id: user.id,
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        role: user.role,
    })
}

#[tokio::test]
async fn available_doctors_filter_by_specialization() {
    let ctx = TestConfig::default().context();
    seed_doctor(&ctx, "gp@example.com", "LIC-1", "General Practice").await;
    seed_doctor(&ctx, "cardio@example.com", "LIC-2", "Cardiology").await;

    let response = list_available_doctors(
        State(ctx.clone()),
        Query(AvailableDoctorsQuery {
            specialization: Some("cardio".to_string()),
            ..AvailableDoctorsQuery::default()
        }),
    )
    .await
    .unwrap();

    let body = serde_json::to_value(&response).unwrap();
    let doctors = body["data"]["doctors"].as_array().unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0]["email"], "cardio@example.com");
    assert_eq!(doctors[0]["doctorProfile"]["consultationFee"], 75_000);
    assert_eq!(body["data"]["pagination"]["totalCount"], 1);
}

#[tokio::test]
async fn unavailable_doctor_is_hidden_from_discovery() {
    let ctx = TestConfig::default().context();
    let (doctor, _) = seed_doctor(&ctx, "gp@example.com", "LIC-1", "General Practice").await;

    update_own_profile(
        State(ctx.clone()),
        auth_user(&doctor),
        Json(UpdateDoctorProfileRequest {
            is_available: Some(false),
            ..UpdateDoctorProfileRequest::default()
        }),
    )
    .await
    .unwrap();

    let response = list_available_doctors(State(ctx.clone()), Query(AvailableDoctorsQuery::default()))
        .await
        .unwrap();
    let body = serde_json::to_value(&response).unwrap();
    assert!(body["data"]["doctors"].as_array().unwrap().is_empty());

    let err = DoctorService::new(&ctx).require_available(doctor.id).await.unwrap_err();
    assert_matches!(err, DoctorError::Unavailable);
}

#[tokio::test]
async fn duplicate_license_conflicts() {
    let ctx = TestConfig::default().context();
    seed_doctor(&ctx, "a@example.com", "LIC-1", "General Practice").await;
    let (other, _) = TestUser::doctor("b@example.com").seed(&ctx).await;

    let err = DoctorService::new(&ctx)
        .create_profile(other.id, profile_request("LIC-1", "Dermatology"))
        .await
        .unwrap_err();
    assert_matches!(err, DoctorError::LicenseTaken);
    assert_matches!(AppError::from(err), AppError::Conflict(_));
}

#[tokio::test]
async fn second_profile_for_same_doctor_conflicts() {
    let ctx = TestConfig::default().context();
    let (doctor, _) = seed_doctor(&ctx, "a@example.com", "LIC-1", "General Practice").await;

    let err = DoctorService::new(&ctx)
        .create_profile(doctor.id, profile_request("LIC-9", "General Practice"))
        .await
        .unwrap_err();
    assert_matches!(err, DoctorError::ProfileExists);
}

#[tokio::test]
async fn profile_only_for_doctor_accounts() {
    let ctx = TestConfig::default().context();
    let (patient, _) = TestUser::patient("p@example.com").seed(&ctx).await;

    let err = DoctorService::new(&ctx)
        .create_profile(patient.id, profile_request("LIC-1", "General Practice"))
        .await
        .unwrap_err();
    assert_matches!(err, DoctorError::NotADoctor);
}

#[tokio::test]
async fn negative_fee_is_rejected() {
    let ctx = TestConfig::default().context();
    let (doctor, _) = seed_doctor(&ctx, "a@example.com", "LIC-1", "General Practice").await;

    let err = update_own_profile(
        State(ctx),
        auth_user(&doctor),
        Json(UpdateDoctorProfileRequest {
            consultation_fee: Some(-1),
            ..UpdateDoctorProfileRequest::default()
        }),
    )
    .await
    .unwrap_err();
    assert_matches!(err, AppError::Validation(_));
}

#[tokio::test]
async fn get_unknown_doctor_is_not_found() {
    let ctx = TestConfig::default().context();
    let err = get_doctor(State(ctx), Path(Uuid::new_v4())).await.unwrap_err();
    assert_matches!(err, AppError::NotFound(_));
}

#[tokio::test]
async fn patients_cannot_edit_doctor_profiles() {
    let ctx = TestConfig::default().context();
    let (_, token) = TestUser::patient("p@example.com").seed(&ctx).await;
    let app = Router::new().nest("/doctors", doctor_routes(ctx));

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/doctors/profile")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"isAvailable": false}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
