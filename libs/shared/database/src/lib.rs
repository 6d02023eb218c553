pub mod error;
pub mod memory;
pub mod postgrest;
pub mod repository;
pub mod supabase;

use std::sync::Arc;

use tracing::{info, warn};

use shared_config::AppConfig;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use postgrest::PostgrestStore;
pub use repository::{
    ConsultationRepository, DoctorProfileRepository, MessageRepository, PaymentRepository,
    UserRepository,
};

/// Every repository the services need, behind trait objects so a cell never
/// knows which backend it is talking to.
#[derive(Clone)]
pub struct Database {
    pub users: Arc<dyn UserRepository>,
    pub doctors: Arc<dyn DoctorProfileRepository>,
    pub consultations: Arc<dyn ConsultationRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

impl Database {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: UserRepository
            + DoctorProfileRepository
            + ConsultationRepository
            + PaymentRepository
            + MessageRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            doctors: store.clone(),
            consultations: store.clone(),
            payments: store.clone(),
            messages: store,
        }
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::default()))
    }

    pub fn postgrest(config: &AppConfig) -> StoreResult<Self> {
        Ok(Self::from_store(Arc::new(PostgrestStore::new(config)?)))
    }

    /// PostgREST when Supabase credentials are present, otherwise the in-memory store.
    pub fn from_config(config: &AppConfig) -> StoreResult<Self> {
        if config.is_database_configured() {
            info!("Using PostgREST storage at {}", config.supabase_url);
            Self::postgrest(config)
        } else {
            warn!("Supabase is not configured, falling back to in-memory storage");
            Ok(Self::in_memory())
        }
    }
}
