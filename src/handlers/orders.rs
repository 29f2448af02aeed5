use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    commands::orders::{cancel_order_command::CancelOrderResult, CancelOrderInput, CreateOrderInput, OrderDetails},
    entities::{dispatch_note, order, payment_receipt},
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input, PaginationParams},
    models::OrderStatus,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
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

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
    pub expected_version: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderPaymentRequest {
    pub amount_paid: Decimal,
    pub expected_version: Option<i32>,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_order_status))
        .route("/orders/:id/payment", patch(update_order_payment))
        .route("/orders/:id/cancel", patch(cancel_order))
        .route("/orders/:id/dispatch-notes", get(list_order_dispatch_notes))
        .route("/orders/:id/payment-receipts", get(list_order_payment_receipts))
}

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderDetails>>), ServiceError> {
    let created = state
        .services
        .orders
        .create_order(input, user.user_id)
        .await?;
    Ok(created_response(created))
}

pub async fn list_orders(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let params = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    validate_input(&params)?;
    let status = query.status.as_deref().map(OrderStatus::parse).transpose()?;

    let (orders, total) = state
        .services
        .orders
        .list_orders(params.page, params.per_page, status)
        .await?;
    Ok(success_response(params.paginate(orders, total)))
}

pub async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetails> {
    Ok(success_response(state.services.orders.get_order(id).await?))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<order::Model> {
    let updated = state
        .services
        .orders
        .update_order_status(id, request.status, request.expected_version)
        .await?;
    Ok(success_response(updated))
}

pub async fn update_order_payment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderPaymentRequest>,
) -> ApiResult<order::Model> {
    let updated = state
        .services
        .orders
        .update_order_payment(id, request.amount_paid, request.expected_version)
        .await?;
    Ok(success_response(updated))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> ApiResult<CancelOrderResult> {
    let cancelled = state
        .services
        .orders
        .cancel_order(id, input, user.user_id)
        .await?;
    Ok(success_response(cancelled))
}

pub async fn list_order_dispatch_notes(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<dispatch_note::Model>> {
    state.services.orders.get_order(id).await?;
    let notes = state.services.dispatch.list_dispatch_notes(Some(id)).await?;
    Ok(success_response(notes))
}

pub async fn list_order_payment_receipts(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<payment_receipt::Model>> {
    let receipts = state
        .services
        .payment_receipts
        .list_payment_receipts(id)
        .await?;
    Ok(success_response(receipts))
}
