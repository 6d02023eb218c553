use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::repository::{ConsultationRepository, MessageRepository, PaymentRepository, UserRepository};
use shared_database::{PostgrestStore, StoreError};
use shared_models::{
    ConsultationStatus, NewPayment, NewUser, PaymentStatus, PaymentUpdate, Role, StatusChange,
};

fn store_for(server: &MockServer) -> PostgrestStore {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_service_key: "service-key".to_string(),
        ..AppConfig::default()
    };
    PostgrestStore::new(&config).unwrap()
}

fn consultation_row(id: Uuid, status: &str) -> serde_json::Value {
    json!({
        "id": id,
        "patient_id": Uuid::new_v4(),
        "doctor_id": Uuid::new_v4(),
        "title": "Follow-up",
        "description": "Blood pressure review",
        "status": status,
        "started_at": null,
        "ended_at": null,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z"
    })
}

#[tokio::test]
async fn duplicate_email_maps_to_unique_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(header("apikey", "service-key"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"users_email_key\""
        })))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .insert_user(NewUser {
            email: "taken@example.com".to_string(),
            password_hash: "hash".to_string(),
            full_name: "Taken".to_string(),
            phone: None,
            role: Role::Patient,
        })
        .await
        .unwrap_err();

    assert_matches!(err, StoreError::UniqueViolation(detail) if detail.contains("users_email_key"));
}

#[tokio::test]
async fn payment_insert_conflict_is_unique_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"payments_consultation_id_key\""
        })))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .insert_payment(NewPayment {
            consultation_id: Uuid::new_v4(),
            payer_id: Uuid::new_v4(),
            amount: 75_000,
            gateway_order_id: "ORDER-1-ABCDEFGHI".to_string(),
            raw_gateway_payload: json!({}),
        })
        .await
        .unwrap_err();

    assert_matches!(err, StoreError::UniqueViolation(_));
}

#[tokio::test]
async fn conditional_status_update_reports_lost_race() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/consultations"))
        .and(query_param("status", "eq.PENDING"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/consultations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([consultation_row(id, "CANCELLED")])))
        .mount(&server)
        .await;

    let result = store_for(&server)
        .update_consultation_status(
            id,
            StatusChange {
                expected: ConsultationStatus::Pending,
                new_status: ConsultationStatus::Active,
                started_at: None,
                ended_at: None,
            },
        )
        .await
        .unwrap();

    assert!(result.is_none());
}

#[tokio::test]
async fn conditional_payment_update_on_missing_row_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .update_payment_if(
            Uuid::new_v4(),
            PaymentStatus::Pending,
            PaymentUpdate {
                status: Some(PaymentStatus::Paid),
                paid_at: None,
                gateway_transaction_id: None,
                payment_method: None,
                raw_gateway_payload: json!({}),
            },
        )
        .await
        .unwrap_err();

    assert_matches!(err, StoreError::NotFound);
}

#[tokio::test]
async fn unread_count_reads_content_range() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/messages"))
        .and(header("Prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "*/7")
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    let count = store_for(&server)
        .count_unread(&[Uuid::new_v4()], Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(count, 7);
}

#[tokio::test]
async fn unread_count_without_consultations_skips_the_request() {
    let server = MockServer::start().await;
    let count = store_for(&server).count_unread(&[], Uuid::new_v4()).await.unwrap();
    assert_eq!(count, 0);
}
