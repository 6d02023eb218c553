use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::Database;

/// Handles every cell needs: configuration and the repositories.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: Database,
}

impl AppContext {
    pub fn new(config: Arc<AppConfig>, db: Database) -> Self {
        Self { config, db }
    }
}
