use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("Invalid client configuration: {0}")]
    Config(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// PostgREST client authenticated with the service-role key.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    headers: HeaderMap,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Result<Self, SupabaseError> {
        let client = Client::builder()
            .timeout(config.outbound_timeout())
            .build()?;

        let key = HeaderValue::from_str(&config.supabase_service_key)
            .map_err(|e| SupabaseError::Config(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.supabase_service_key))
            .map_err(|e| SupabaseError::Config(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            headers,
        })
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, extra_headers).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends with `Prefer: count=exact` and returns the body plus the total
    /// row count reported in `Content-Range`.
    pub async fn request_with_count<T>(
        &self,
        path: &str,
    ) -> Result<(T, u64), SupabaseError>
    where
        T: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.send(Method::GET, path, None, Some(headers)).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0);

        let bytes = response.bytes().await?;
        Ok((serde_json::from_slice(&bytes)?, total))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, SupabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {} {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.headers.clone());

        if let Some(extra) = extra_headers {
            req = req.headers(extra);
        }
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!("PostgREST error ({}): {}", status, error_text);

        Err(match status.as_u16() {
            409 => SupabaseError::Conflict(error_detail(&error_text)),
            400 if error_text.contains("23514") => {
                SupabaseError::Constraint(error_detail(&error_text))
            }
            401 | 403 => SupabaseError::Unauthorized(error_text),
            404 => SupabaseError::NotFound(error_text),
            _ if error_text.contains("23505") => SupabaseError::Conflict(error_detail(&error_text)),
            code => SupabaseError::Api {
                status: code,
                body: error_text,
            },
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit('/').next()?.parse().ok()
}

/// PostgREST error bodies carry the Postgres message under `message`.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-9/*"), None);
    }

    #[test]
    fn error_detail_prefers_message_field() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint \"users_email_key\""}"#;
        assert!(error_detail(body).contains("users_email_key"));
        assert_eq!(error_detail("plain"), "plain");
    }
}
