use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{created_response, success_response, validate_input, PaginationParams},
    services::products::{CreateProductInput, ProductView},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/:id", get(get_product))
}

pub async fn create_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductView>>), ServiceError> {
    let created = state.services.products.create_product(input).await?;
    Ok(created_response(created))
}

pub async fn list_products(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<ProductView>> {
    validate_input(&params)?;
    let (products, total) = state
        .services
        .products
        .list_products(params.page, params.per_page)
        .await?;
    Ok(success_response(params.paginate(products, total)))
}

pub async fn get_product(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductView> {
    Ok(success_response(state.services.products.get_product(id).await?))
}
