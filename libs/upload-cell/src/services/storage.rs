use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::UploadError;

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "audio/mpeg",
    "audio/wav",
    "audio/mp3",
    "application/pdf",
    "text/plain",
];

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub file_name: String,
    /// Public path under `/uploads`.
    pub url: String,
    pub size: usize,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Rejects mime types outside the allow-list and payloads over the cap.
    async fn store(&self, original_name: &str, mime_type: &str, bytes: Bytes) -> Result<StoredObject, UploadError>;
    fn max_size(&self) -> usize;
}

pub fn is_allowed(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

pub fn subdirectory_for(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image/") {
        "images"
    } else if mime_type.starts_with("audio/") {
        "audio"
    } else if mime_type == "application/pdf" {
        "documents"
    } else {
        "others"
    }
}

/// `.ext` of the client's file name, or empty.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub struct LocalDiskStorage {
    root: PathBuf,
    max_size: usize,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStorage for LocalDiskStorage {
    async fn store(&self, original_name: &str, mime_type: &str, bytes: Bytes) -> Result<StoredObject, UploadError> {
        if !is_allowed(mime_type) {
            debug!("Rejected upload of type {}", mime_type);
            return Err(UploadError::TypeNotAllowed(mime_type.to_string()));
        }
        if bytes.len() > self.max_size {
            return Err(UploadError::TooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }

        let subdir = subdirectory_for(mime_type);
        let dir = self.root.join(subdir);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = format!(
            "{}-{}{}",
            Uuid::new_v4(),
            Utc::now().timestamp_millis(),
            extension_of(original_name)
        );
        tokio::fs::write(dir.join(&file_name), &bytes).await?;
        info!("Stored {} ({} bytes) under {}", file_name, bytes.len(), subdir);

        Ok(StoredObject {
            url: format!("/uploads/{}/{}", subdir, file_name),
            file_name,
            size: bytes.len(),
        })
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}
