use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    commands::dispatch::{CreateDispatchNoteInput, DispatchNoteCreated, DispatchNoteDetails},
    entities::{dispatch_note, sell_record},
    errors::ServiceError,
    handlers::common::{created_response, success_response},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
pub struct DispatchListQuery {
    pub order_id: Option<Uuid>,
}

pub fn dispatch_routes() -> Router<AppState> {
    Router::new()
        .route("/dispatch", post(create_dispatch_note).get(list_dispatch_notes))
        .route("/dispatch/:id", get(get_dispatch_note))
        .route("/dispatch/:id/sell-record", post(create_sell_record))
}

/// Ships goods against an order. Lines matched by product alone, or cut
/// down to the outstanding balance, come back as `warnings`.
pub async fn create_dispatch_note(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CreateDispatchNoteInput>,
) -> Result<(StatusCode, Json<ApiResponse<DispatchNoteCreated>>), ServiceError> {
    let created = state
        .services
        .dispatch
        .create_dispatch_note(input, user.user_id)
        .await?;
    Ok(created_response(created))
}

pub async fn list_dispatch_notes(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<DispatchListQuery>,
) -> ApiResult<Vec<dispatch_note::Model>> {
    let notes = state
        .services
        .dispatch
        .list_dispatch_notes(query.order_id)
        .await?;
    Ok(success_response(notes))
}

pub async fn get_dispatch_note(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<DispatchNoteDetails> {
    Ok(success_response(state.services.dispatch.get_dispatch_note(id).await?))
}

pub async fn create_sell_record(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<sell_record::Model>>), ServiceError> {
    let record = state
        .services
        .dispatch
        .create_sell_record(id, user.user_id)
        .await?;
    Ok(created_response(record))
}
