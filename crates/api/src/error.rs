//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError};
use messaging::MessagingError;
use order_store::OrderStoreError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, serde_json::Value) {
    match &err {
        DomainError::OrderNotFound(_) => (StatusCode::NOT_FOUND, error_body(err.to_string())),
        DomainError::Order(OrderError::InvalidStateTransition {
            current_status,
            action,
        }) => (
            StatusCode::CONFLICT,
            serde_json::json!({
                "error": err.to_string(),
                "currentStatus": current_status,
                "attemptedAction": action,
            }),
        ),
        DomainError::Order(OrderError::Validation { .. }) => {
            (StatusCode::BAD_REQUEST, error_body(err.to_string()))
        }
        DomainError::Store(OrderStoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, error_body(err.to_string()))
        }
        _ => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body(err.to_string()),
            )
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Domain(DomainError::Order(err))
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
