use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use payment_cell::{GatewayError, PaymentGateway, SessionRequest, SnapSession, TransactionStatus};
use realtime_cell::{BroadcastRelay, RelayEventKind, RoomRelay};
use shared_models::doctor::NewDoctorProfile;
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::AppContext;
use teleconsult_api::{create_router, AppServices};
use upload_cell::LocalDiskStorage;

/// Accepts every session and echoes the notification's own status back as authoritative.
struct ScriptedGateway;

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<SnapSession, GatewayError> {
        Ok(SnapSession {
            token: format!("snap-{}", request.order_id),
            redirect_url: format!("https://pay.example/{}", request.order_id),
            raw: json!({}),
        })
    }

    async fn query_status(&self, order_id: &str) -> Result<TransactionStatus, GatewayError> {
        Ok(status(order_id, "pending"))
    }

    async fn verify_notification(&self, payload: &Value) -> Result<TransactionStatus, GatewayError> {
        let field = |name: &str| payload.get(name).and_then(Value::as_str).unwrap_or_default();
        Ok(status(field("order_id"), field("transaction_status")))
    }
}

fn status(order_id: &str, transaction_status: &str) -> TransactionStatus {
    TransactionStatus {
        order_id: order_id.to_string(),
        transaction_status: transaction_status.to_string(),
        fraud_status: None,
        transaction_id: Some("txn-scripted".to_string()),
        payment_type: Some("bank_transfer".to_string()),
        raw: json!({}),
    }
}

struct Api {
    ctx: AppContext,
    relay: Arc<BroadcastRelay>,
    app: Router,
    _uploads: tempfile::TempDir,
}

impl Api {
    fn new() -> Self {
        let ctx = TestConfig::default().context();
        let relay = Arc::new(BroadcastRelay::default());
        let uploads = tempfile::tempdir().unwrap();
        let services = AppServices {
            relay: relay.clone(),
            gateway: Arc::new(ScriptedGateway),
            storage: Arc::new(LocalDiskStorage::new(uploads.path(), 1024)),
        };
        Self {
            app: create_router(ctx.clone(), services),
            ctx,
            relay,
            _uploads: uploads,
        }
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
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

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Patient and doctor tokens, plus the doctor's user id. The doctor charges 75 000.
    async fn participants(&self) -> (String, String, Uuid) {
        let (_, patient_token) = TestUser::patient("patient@example.com").seed(&self.ctx).await;
        let (doctor, doctor_token) = TestUser::doctor("doctor@example.com").seed(&self.ctx).await;
        self.ctx
            .db
            .doctors
            .insert_profile(NewDoctorProfile {
                user_id: doctor.id,
                specialization: "General Practice".to_string(),
                license_number: "STR-75000".to_string(),
                experience_years: 8,
                education: "UI".to_string(),
                consultation_fee: 75_000,
                bio: None,
            })
            .await
            .unwrap();
        (patient_token, doctor_token, doctor.id)
    }

    async fn open_consultation(&self, patient_token: &str, doctor_id: Uuid) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/consultations",
                Some(patient_token),
                Some(json!({ "doctorId": doctor_id, "title": "Fever", "description": "Three days" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "PENDING");
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn paid_consultation_runs_from_booking_to_completion() {
    let api = Api::new();
    let (patient_token, doctor_token, doctor_id) = api.participants().await;
    let consultation_id = api.open_consultation(&patient_token, doctor_id).await;

    let (status, body) = api
        .call("POST", "/payments", Some(&patient_token), Some(json!({ "consultationId": consultation_id })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["payment"]["status"], "PENDING");
    assert_eq!(body["data"]["payment"]["amount"], 75_000);
    let order_id = body["data"]["payment"]["gatewayOrderId"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("ORDER-"));

    let notification = json!({ "order_id": order_id, "transaction_status": "settlement" });
    let (status, body) = api.call("POST", "/payments/webhook", None, Some(notification)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, detail) = api
        .call("GET", &format!("/consultations/{}", consultation_id), Some(&patient_token), None)
        .await;
    assert_eq!(detail["data"]["status"], "PENDING");
    assert_eq!(detail["data"]["payment"]["status"], "PAID");
    assert!(detail["data"]["payment"]["paidAt"].is_string());

    let (status, body) = api
        .call(
            "PUT",
            &format!("/consultations/{}/status", consultation_id),
            Some(&doctor_token),
            Some(json!({ "status": "ACTIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["startedAt"].is_string());

    let room = consultation_id.parse().unwrap();
    let mut events = api.relay.subscribe(room).await;

    let (status, body) = api
        .call(
            "POST",
            "/messages",
            Some(&patient_token),
            Some(json!({ "consultationId": consultation_id, "content": "Still feverish" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["content"], "Still feverish");
    let relayed = events.recv().await.unwrap();
    assert_eq!(relayed.event, RelayEventKind::NewMessage);

    let (_, unread) = api.call("GET", "/messages/unread/count", Some(&doctor_token), None).await;
    assert_eq!(unread["data"]["unreadCount"], 1);

    let (status, body) = api
        .call(
            "PUT",
            &format!("/consultations/{}/status", consultation_id),
            Some(&doctor_token),
            Some(json!({ "status": "COMPLETED" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["endedAt"].is_string());

    let (status, body) = api
        .call(
            "POST",
            "/messages",
            Some(&patient_token),
            Some(json!({ "consultationId": consultation_id, "content": "One more thing" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Consultation is not active");
}

#[tokio::test]
async fn late_pending_notification_does_not_regress_paid() {
    let api = Api::new();
    let (patient_token, _, doctor_id) = api.participants().await;
    let consultation_id = api.open_consultation(&patient_token, doctor_id).await;

    let (_, body) = api
        .call("POST", "/payments", Some(&patient_token), Some(json!({ "consultationId": consultation_id })))
        .await;
    let payment_id = body["data"]["payment"]["id"].as_str().unwrap().to_string();
    let order_id = body["data"]["payment"]["gatewayOrderId"].as_str().unwrap().to_string();

    for transaction_status in ["settlement", "settlement", "pending"] {
        let notification = json!({ "order_id": order_id, "transaction_status": transaction_status });
        let (status, _) = api.call("POST", "/payments/webhook", None, Some(notification)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = api
        .call("GET", &format!("/payments/{}/status", payment_id), Some(&patient_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PAID");
}

#[tokio::test]
async fn second_initiation_conflicts_and_leaves_one_payment() {
    let api = Api::new();
    let (patient_token, _, doctor_id) = api.participants().await;
    let consultation_id = api.open_consultation(&patient_token, doctor_id).await;
    let body = json!({ "consultationId": consultation_id });

    let (status, _) = api.call("POST", "/payments", Some(&patient_token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = api.call("POST", "/payments", Some(&patient_token), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, history) = api.call("GET", "/payments/history", Some(&patient_token), None).await;
    assert_eq!(history["data"]["payments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unpaid_active_consultation_requires_payment() {
    let api = Api::new();
    let (patient_token, doctor_token, doctor_id) = api.participants().await;
    let consultation_id = api.open_consultation(&patient_token, doctor_id).await;

    let (status, _) = api
        .call(
            "PUT",
            &format!("/consultations/{}/status", consultation_id),
            Some(&doctor_token),
            Some(json!({ "status": "ACTIVE" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = api
        .call(
            "POST",
            "/messages",
            Some(&doctor_token),
            Some(json!({ "consultationId": consultation_id, "content": "Hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Payment required before sending messages");
}

#[tokio::test]
async fn only_register_login_and_webhook_are_public() {
    let api = Api::new();

    for (method, uri) in [
        ("GET", "/auth/profile"),
        ("GET", "/users"),
        ("PUT", "/doctors/profile"),
        ("GET", "/doctors/available"),
        ("GET", "/consultations"),
        ("POST", "/consultations"),
        ("GET", "/payments/history"),
        ("POST", "/payments"),
        ("GET", "/messages/unread/count"),
        ("POST", "/messages"),
        ("POST", "/upload"),
        ("GET", "/ws"),
    ] {
        let (status, _) = api.call(method, uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
    }

    let (status, _) = api
        .call(
            "POST",
            "/auth/register",
            None,
            Some(json!({ "email": "new@example.com", "password": "Passw0rd!", "fullName": "New Patient" })),
        )
        .await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = api
        .call("POST", "/auth/login", None, Some(json!({ "email": "new@example.com", "password": "Passw0rd!" })))
        .await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = api
        .call("POST", "/payments/webhook", None, Some(json!({ "order_id": "ORDER-0-UNKNOWN00" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn service_endpoints() {
    let api = Api::new();

    let (status, body) = api.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Server is running");
    assert!(body["uptime"].is_number());

    let (status, body) = api.call("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["consultations"], "/consultations");

    let (status, body) = api.call("GET", "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Endpoint not found");
}
