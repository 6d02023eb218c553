use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use shared_models::payment::Payment;
use shared_models::response::{ApiResponse, Page, Pagination};
use shared_utils::pagination::DEFAULT_PAGE_SIZE;
use shared_utils::{ApiJson, ApiPath, ApiQuery};

use crate::models::{CreatePaymentRequest, InitiatedPayment, PaymentError, PaymentHistoryQuery};
use crate::router::PaymentState;
use crate::services::payment::PaymentService;

#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<PaymentState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreatePaymentRequest>,
) -> Result<ApiResponse<InitiatedPayment>, AppError> {
    let initiated = PaymentService::new(&state.ctx, state.gateway.clone())
        .initiate(user.id, request.consultation_id)
        .await?;

    Ok(ApiResponse::created(initiated, "Payment created successfully"))
}

pub async fn payment_history(
    State(state): State<PaymentState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<PaymentHistoryQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let page = Page::new(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let (payments, total) = PaymentService::new(&state.ctx, state.gateway.clone())
        .history(user.id, query.status, page)
        .await?;

    Ok(ApiResponse::ok(
        json!({
            "payments": payments,
            "pagination": Pagination::new(page, total),
        }),
        "Payment history retrieved successfully",
    ))
}

pub async fn payment_status(
    State(state): State<PaymentState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(payment_id): ApiPath<Uuid>,
) -> Result<ApiResponse<Payment>, AppError> {
    let payment = PaymentService::new(&state.ctx, state.gateway.clone())
        .poll_status(payment_id, user.id)
        .await?;

    Ok(ApiResponse::ok(payment, "Payment status retrieved successfully"))
}

/// Gateway push endpoint. Always acknowledged with 200 so the gateway does
/// not keep retrying; failures are only logged.
pub async fn gateway_webhook(
    State(state): State<PaymentState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Unreadable gateway notification: {}", e);
            return (StatusCode::OK, Json(json!({ "status": "ignored" })));
        }
    };

    let outcome = PaymentService::new(&state.ctx, state.gateway.clone())
        .handle_notification(&payload)
        .await;

    let status = match outcome {
        Ok(_) => "success",
        Err(PaymentError::NotFound) => {
            let order_id = payload.get("order_id").and_then(|v| v.as_str()).unwrap_or("<missing>");
            warn!("Gateway notification for unknown order {}", order_id);
            "ignored"
        }
        Err(PaymentError::Gateway(e)) => {
            warn!("Gateway notification rejected: {}", e);
            "ignored"
        }
        Err(e) => {
            error!("Gateway notification processing failed: {}", e);
            "error"
        }
    };

    (StatusCode::OK, Json(json!({ "status": status })))
}
