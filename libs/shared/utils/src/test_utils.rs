use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::Database;
use shared_models::auth::Role;
use shared_models::user::{NewUser, User};

use crate::context::AppContext;
use crate::jwt::issue_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub client_url: String,
    pub midtrans_server_key: String,
    pub midtrans_api_url: String,
    pub midtrans_snap_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            client_url: "http://localhost:3000".to_string(),
            midtrans_server_key: "SB-Mid-server-test".to_string(),
            midtrans_api_url: "http://localhost:9999".to_string(),
            midtrans_snap_url: "http://localhost:9999".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_gateway_url(url: &str) -> Self {
        Self {
            midtrans_api_url: url.to_string(),
            midtrans_snap_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            environment: "test".to_string(),
            jwt_secret: self.jwt_secret.clone(),
            client_url: self.client_url.clone(),
            midtrans_server_key: self.midtrans_server_key.clone(),
            midtrans_client_key: "SB-Mid-client-test".to_string(),
            midtrans_api_url: self.midtrans_api_url.clone(),
            midtrans_snap_url: self.midtrans_snap_url.clone(),
            outbound_timeout_secs: 2,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    /// Context over a fresh in-memory store.
    pub fn context(&self) -> AppContext {
        AppContext::new(self.to_arc(), Database::in_memory())
    }
}

pub struct TestUser {
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            email: email.to_string(),
            full_name: format!("Test {}", role.as_str().to_lowercase()),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    /// Inserts the account and returns it with a valid bearer token.
    pub async fn seed(&self, ctx: &AppContext) -> (User, String) {
        let user = ctx
            .db
            .users
            .insert_user(NewUser {
                email: self.email.clone(),
                password_hash: "not-a-real-hash".to_string(),
                full_name: self.full_name.clone(),
                phone: None,
                role: self.role,
            })
            .await
            .expect("seed user");
        let token = JwtTestUtils::create_test_token(user.id, user.role, &ctx.config.jwt_secret, None);
        (user, token)
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user_id: Uuid, role: Role, secret: &str, exp_hours: Option<i64>) -> String {
        issue_token(user_id, role, secret, exp_hours.unwrap_or(24)).expect("issue test token")
    }

    pub fn create_expired_token(user_id: Uuid, role: Role, secret: &str) -> String {
        Self::create_test_token(user_id, role, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user_id: Uuid, role: Role) -> String {
        Self::create_test_token(user_id, role, "wrong-secret", Some(24))
    }

    /// Correctly signed, but the claims do not carry a role.
    pub fn create_token_without_role(user_id: Uuid, secret: &str) -> String {
        let now = Utc::now();
        let header = json!({ "alg": "HS256", "typ": "JWT" });
        let payload = json!({
            "sub": user_id,
            "iat": now.timestamp(),
            "exp": (now + Duration::hours(1)).timestamp()
        });

        let signing_input = format!(
            "{}.{}",
            general_purpose::URL_SAFE_NO_PAD.encode(header.to_string()),
            general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string())
        );
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature)
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}
