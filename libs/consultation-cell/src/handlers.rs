use axum::extract::{Extension, State};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::AuthUser;
use shared_models::consultation::Consultation;
use shared_models::error::AppError;
use shared_models::response::{ApiResponse, Page, Pagination};
use shared_utils::pagination::DEFAULT_PAGE_SIZE;
use shared_utils::{ApiJson, ApiPath, ApiQuery, Validator};

use crate::models::{
    ConsultationDetail, CreateConsultationRequest, ListConsultationsQuery, UpdateStatusRequest,
};
use crate::router::ConsultationState;
use crate::services::consultation::ConsultationService;

// ==============================================================================
// CONSULTATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_consultation(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateConsultationRequest>,
) -> Result<ApiResponse<Consultation>, AppError> {
    Validator::new()
        .required("title", &request.title)
        .required("description", &request.description)
        .finish()?;

    let consultation = ConsultationService::new(&state.ctx, state.relay.clone())
        .create(user.id, request)
        .await?;

    Ok(ApiResponse::created(consultation, "Consultation created successfully"))
}

pub async fn list_consultations(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthUser>,
    ApiQuery(query): ApiQuery<ListConsultationsQuery>,
) -> Result<ApiResponse<Value>, AppError> {
    let page = Page::new(query.page, query.limit, DEFAULT_PAGE_SIZE);

    let (consultations, total) = ConsultationService::new(&state.ctx, state.relay.clone())
        .list(&user, query.status, page)
        .await?;

    Ok(ApiResponse::ok(
        json!({
            "consultations": consultations,
            "pagination": Pagination::new(page, total),
        }),
        "Consultations retrieved successfully",
    ))
}

pub async fn get_consultation(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(consultation_id): ApiPath<Uuid>,
) -> Result<ApiResponse<ConsultationDetail>, AppError> {
    let detail = ConsultationService::new(&state.ctx, state.relay.clone())
        .detail(consultation_id, &user)
        .await?;

    Ok(ApiResponse::ok(detail, "Consultation retrieved successfully"))
}

pub async fn update_consultation_status(
    State(state): State<ConsultationState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(consultation_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateStatusRequest>,
) -> Result<ApiResponse<Consultation>, AppError> {
    let consultation = ConsultationService::new(&state.ctx, state.relay.clone())
        .transition(consultation_id, &user, request.status)
        .await?;

    Ok(ApiResponse::ok(consultation, "Consultation status updated successfully"))
}
