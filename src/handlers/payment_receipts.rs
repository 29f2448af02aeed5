use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use crate::{
    auth::AuthUser,
    commands::payments::{PaymentReceiptRecorded, RecordPaymentReceiptInput},
    errors::ServiceError,
    handlers::common::created_response,
    ApiResponse, AppState,
};

pub fn payment_receipt_routes() -> Router<AppState> {
    Router::new().route("/payment-receipt", post(record_payment_receipt))
}

pub async fn record_payment_receipt(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<RecordPaymentReceiptInput>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceiptRecorded>>), ServiceError> {
    let recorded = state
        .services
        .payment_receipts
        .record_payment_receipt(input, user.user_id)
        .await?;
    Ok(created_response(recorded))
}
