use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

use crate::domain::order::OrderError;

// ============================================================================
// API Errors - domain errors mapped onto HTTP responses
// ============================================================================
//
// 400 validation class, 404 missing, 409 conflicts, 500 storage. Storage
// causes are never sent to the client.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Order(error) => match error {
                OrderError::Validation(_)
                | OrderError::EmptyOrder
                | OrderError::ItemUnavailable(_)
                | OrderError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
                OrderError::NotFound(_) | OrderError::ItemNotFound(_) => StatusCode::NOT_FOUND,
                OrderError::BackwardTransition { .. } | OrderError::Conflict(_) => StatusCode::CONFLICT,
                OrderError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Order(OrderError::Validation(issues)) => json!({
                "message": "Invalid order data",
                "issues": { "fieldErrors": issues },
            }),
            ApiError::Order(OrderError::ItemUnavailable(items)) => json!({
                "message": "Some items are unavailable",
                "items": items,
            }),
            // Already logged by the order service.
            ApiError::Order(OrderError::Storage(_)) => json!({ "message": "Internal server error" }),
            ApiError::Internal(cause) => {
                tracing::error!(error = %cause, "Internal error while serving request");
                json!({ "message": "Internal server error" })
            }
            other => json!({ "message": other.to_string() }),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}
