use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::debug;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::response::ApiResponse;

use crate::models::{UploadError, UploadedFile};
use crate::router::UploadState;

const FILE_FIELD: &str = "file";

/// Single-file multipart upload under the `file` field.
pub async fn upload_file(
    State(state): State<UploadState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<ApiResponse<UploadedFile>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload").to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        debug!("User {} uploading {} ({})", user.id, original_name, mime_type);

        let stored = state.storage.store(&original_name, &mime_type, bytes).await?;

        return Ok(ApiResponse::created(
            UploadedFile {
                original_name,
                file_name: stored.file_name,
                file_url: stored.url,
                file_size: stored.size,
                mime_type,
                uploaded_at: Utc::now(),
            },
            "File uploaded successfully",
        ));
    }

    Err(UploadError::NoFile.into())
}

fn multipart_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { size: 0, max: 0 }
    } else {
        UploadError::Multipart(err.body_text())
    }
}
