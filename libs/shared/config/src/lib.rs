use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const MIDTRANS_SANDBOX_SNAP_URL: &str = "https://app.sandbox.midtrans.com";
const MIDTRANS_SANDBOX_API_URL: &str = "https://api.sandbox.midtrans.com";
const MIDTRANS_PRODUCTION_SNAP_URL: &str = "https://app.midtrans.com";
const MIDTRANS_PRODUCTION_API_URL: &str = "https://api.midtrans.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: i64,
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub midtrans_server_key: String,
    pub midtrans_client_key: String,
    pub midtrans_is_production: bool,
    pub midtrans_snap_url: String,
    pub midtrans_api_url: String,
    pub client_url: String,
    pub upload_dir: PathBuf,
    pub max_file_size: usize,
    pub outbound_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let midtrans_is_production = env::var("MIDTRANS_IS_PRODUCTION")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let (default_snap_url, default_api_url) = if midtrans_is_production {
            (MIDTRANS_PRODUCTION_SNAP_URL, MIDTRANS_PRODUCTION_API_URL)
        } else {
            (MIDTRANS_SANDBOX_SNAP_URL, MIDTRANS_SANDBOX_API_URL)
        };

        let config = Self {
            environment: env::var("APP_ENV")
                .unwrap_or_else(|_| {
                    warn!("APP_ENV not set, using development");
                    "development".to_string()
                }),
            port: parse_or("PORT", 4000),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            jwt_expires_in_hours: parse_or("JWT_EXPIRES_IN_HOURS", 168),
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            midtrans_server_key: env::var("MIDTRANS_SERVER_KEY")
                .unwrap_or_else(|_| {
                    warn!("MIDTRANS_SERVER_KEY not set, using empty value");
                    String::new()
                }),
            midtrans_client_key: env::var("MIDTRANS_CLIENT_KEY")
                .unwrap_or_else(|_| {
                    warn!("MIDTRANS_CLIENT_KEY not set, using empty value");
                    String::new()
                }),
            midtrans_is_production,
            midtrans_snap_url: env::var("MIDTRANS_SNAP_URL")
                .unwrap_or_else(|_| default_snap_url.to_string()),
            midtrans_api_url: env::var("MIDTRANS_API_URL")
                .unwrap_or_else(|_| default_api_url.to_string()),
            client_url: env::var("CLIENT_URL")
                .unwrap_or_else(|_| {
                    warn!("CLIENT_URL not set, using default");
                    "http://localhost:3000".to_string()
                }),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            max_file_size: parse_or("MAX_FILE_SIZE", 5_000_000),
            outbound_timeout_secs: parse_or("OUTBOUND_TIMEOUT_SECS", 10),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
            && self.is_database_configured()
            && self.is_payment_configured()
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.midtrans_server_key.is_empty()
            && !self.midtrans_snap_url.is_empty()
            && !self.midtrans_api_url.is_empty()
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn outbound_timeout(&self) -> Duration {
        Duration::from_secs(self.outbound_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 4000,
            jwt_secret: String::new(),
            jwt_expires_in_hours: 168,
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            midtrans_server_key: String::new(),
            midtrans_client_key: String::new(),
            midtrans_is_production: false,
            midtrans_snap_url: MIDTRANS_SANDBOX_SNAP_URL.to_string(),
            midtrans_api_url: MIDTRANS_SANDBOX_API_URL.to_string(),
            client_url: "http://localhost:3000".to_string(),
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: 5_000_000,
            outbound_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value, using default", key);
            default
        }),
        Err(_) => default,
    }
}
