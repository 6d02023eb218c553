use axum::extract::{Extension, State};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::response::{ApiResponse, Page, Pagination};
use shared_utils::{ApiJson, ApiPath, ApiQuery, Validator};

use crate::models::{
    MessagePageQuery, MessageView, SendMessageRequest, UnreadCount, DEFAULT_MESSAGE_PAGE_SIZE,
};
use crate::router::MessagingState;
use crate::services::gate::MessagingGate;

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<MessagingState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<SendMessageRequest>,
) -> Result<ApiResponse<MessageView>, AppError> {
    Validator::new()
        .check(!request.content.trim().is_empty(), "content", "Message content is required")
        .finish()?;

    let message = MessagingGate::new(&state.ctx, state.relay.clone())
        .send(user.id, request)
        .await?;

    Ok(ApiResponse::created(message, "Message sent successfully"))
}

pub async fn get_messages(
    State(state): State<MessagingState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(consultation_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<MessagePageQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let page = Page::new(query.page, query.limit, DEFAULT_MESSAGE_PAGE_SIZE);

    let (messages, total) = MessagingGate::new(&state.ctx, state.relay.clone())
        .list(consultation_id, user.id, page)
        .await?;

    Ok(ApiResponse::ok(
        json!({
            "messages": messages,
            "pagination": Pagination::new(page, total),
        }),
        "Messages retrieved successfully",
    ))
}

pub async fn unread_count(
    State(state): State<MessagingState>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<UnreadCount>, AppError> {
    let unread_count = MessagingGate::new(&state.ctx, state.relay.clone())
        .unread_count(user.id)
        .await?;

    Ok(ApiResponse::ok(UnreadCount { unread_count }, "Unread count retrieved successfully"))
}

pub async fn mark_as_read(
    State(state): State<MessagingState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(consultation_id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    MessagingGate::new(&state.ctx, state.relay.clone())
        .mark_read(consultation_id, user.id)
        .await?;

    Ok(ApiResponse::message_only("Messages marked as read"))
}

pub async fn delete_message(
    State(state): State<MessagingState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(message_id): ApiPath<Uuid>,
) -> Result<ApiResponse<()>, AppError> {
    MessagingGate::new(&state.ctx, state.relay.clone())
        .delete(message_id, user.id)
        .await?;

    Ok(ApiResponse::message_only("Message deleted successfully"))
}
