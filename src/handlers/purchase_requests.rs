use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    commands::purchase_requests::{
        CreatePurchaseRequestInput, MaterialReceiptInput, PurchaseRequestChanged,
        PurchaseRequestDetails, UpdatePurchaseRequestInput,
    },
    entities::purchase_request,
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input, PaginationParams},
    models::PurchaseRequestStatus,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize)]
pub struct PurchaseRequestListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub status: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionedRequest {
    pub expected_version: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 500, message = "A rejection reason is required"))]
    pub reason: String,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_amount: Decimal,
    pub expected_version: Option<i32>,
}

pub fn purchase_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/purchase-request",
            post(create_purchase_request).get(list_purchase_requests),
        )
        .route(
            "/purchase-request/:id",
            get(get_purchase_request).put(update_purchase_request),
        )
        .route("/purchase-request/:id/approve", post(approve_purchase_request))
        .route("/purchase-request/:id/reject", post(reject_purchase_request))
        .route("/purchase-request/:id/payment", post(record_payment))
        .route("/purchase-request/:id/intrasite", post(mark_intrasite))
        .route(
            "/purchase-request/:id/material-received",
            post(record_material_received),
        )
        .route("/purchase-request/:id/complete", post(complete_purchase_request))
}

pub async fn create_purchase_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreatePurchaseRequestInput>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseRequestDetails>>), ServiceError> {
    let created = state
        .services
        .purchase_requests
        .create_purchase_request(input, user.user_id)
        .await?;
    Ok(created_response(created))
}

pub async fn list_purchase_requests(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<PurchaseRequestListQuery>,
) -> ApiResult<PaginatedResponse<purchase_request::Model>> {
    let params = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    validate_input(&params)?;
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            PurchaseRequestStatus::from_str(raw.trim()).map_err(|_| {
                ServiceError::InvalidStatus(format!("unknown purchase request status '{}'", raw))
            })
        })
        .transpose()?;

    let (requests, total) = state
        .services
        .purchase_requests
        .list_purchase_requests(params.page, params.per_page, status)
        .await?;
    Ok(success_response(params.paginate(requests, total)))
}

pub async fn get_purchase_request(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseRequestDetails> {
    let details = state
        .services
        .purchase_requests
        .get_purchase_request(id)
        .await?;
    Ok(success_response(details))
}

/// Edits the request. Receiving the PI and paying the vendor go through the
/// same gating rules as the dedicated endpoints.
pub async fn update_purchase_request(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdatePurchaseRequestInput>,
) -> ApiResult<PurchaseRequestChanged> {
    let changed = state
        .services
        .purchase_requests
        .update_purchase_request(id, input)
        .await?;
    Ok(success_response(changed))
}

pub async fn approve_purchase_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<VersionedRequest>>,
) -> ApiResult<PurchaseRequestDetails> {
    let Json(request) = body.unwrap_or_default();
    let approved = state
        .services
        .purchase_requests
        .approve_purchase_request(id, user.user_id, request.expected_version)
        .await?;
    Ok(success_response(approved))
}

pub async fn reject_purchase_request(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> ApiResult<PurchaseRequestDetails> {
    validate_input(&request)?;
    let rejected = state
        .services
        .purchase_requests
        .reject_purchase_request(id, request.reason, request.expected_version)
        .await?;
    Ok(success_response(rejected))
}

pub async fn record_payment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult<PurchaseRequestChanged> {
    let changed = state
        .services
        .purchase_requests
        .record_payment(id, request.payment_amount, request.expected_version)
        .await?;
    Ok(success_response(changed))
}

pub async fn mark_intrasite(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<VersionedRequest>>,
) -> ApiResult<PurchaseRequestChanged> {
    let Json(request) = body.unwrap_or_default();
    let changed = state
        .services
        .purchase_requests
        .mark_intrasite(id, request.expected_version)
        .await?;
    Ok(success_response(changed))
}

pub async fn record_material_received(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<MaterialReceiptInput>,
) -> ApiResult<PurchaseRequestChanged> {
    let changed = state
        .services
        .purchase_requests
        .record_material_received(id, input)
        .await?;
    Ok(success_response(changed))
}

pub async fn complete_purchase_request(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<VersionedRequest>>,
) -> ApiResult<PurchaseRequestDetails> {
    let Json(request) = body.unwrap_or_default();
    let completed = state
        .services
        .purchase_requests
        .complete_purchase_request(id, request.expected_version)
        .await?;
    Ok(success_response(completed))
}
