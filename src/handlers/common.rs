use crate::{errors::ServiceError, ApiResponse, PaginatedResponse};
use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse::success(data))
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input.validate().map_err(ServiceError::from)
}

/// Pagination parameters for list operations
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u64,
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 200))]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    pub fn paginate<T>(&self, items: Vec<T>, total: u64) -> PaginatedResponse<T> {
        PaginatedResponse::new(items, total, self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_apply_to_empty_query() {
        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 20);
    }

    #[test]
    fn total_pages_round_up() {
        let params = PaginationParams {
            page: 2,
            per_page: 20,
        };
        let page = params.paginate(vec![1, 2, 3], 41);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn zero_per_page_is_rejected() {
        let params = PaginationParams {
            page: 1,
            per_page: 0,
        };
        assert!(validate_input(&params).is_err());
    }
}
