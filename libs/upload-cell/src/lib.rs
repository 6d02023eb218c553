pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{upload_routes, UploadState};
pub use services::storage::{LocalDiskStorage, ObjectStorage, StoredObject};
