//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use projections::ProjectionError;

use crate::auth::AuthError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Authentication failure from the identity verifier.
    Auth(AuthError),
    /// Checkout rejection or failure.
    Checkout(CheckoutError),
    /// History read failure.
    Projection(ProjectionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Auth(AuthError::MissingCredential) => {
                (StatusCode::UNAUTHORIZED, AuthError::MissingCredential.to_string())
            }
            ApiError::Auth(AuthError::InvalidCredential) => {
                (StatusCode::FORBIDDEN, AuthError::InvalidCredential.to_string())
            }
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Projection(err) => {
                tracing::error!(error = %err, "order history read failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to fetch order history".to_string(),
                )
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

/// Business rejections carry their detail to the caller; infra failures
/// are logged and surfaced generically.
fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::InvalidCart(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::UnknownBook(_) | CheckoutError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Conflict(_) | CheckoutError::Storage(_) => {
            tracing::error!(error = %err, "order placement failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Order placement failed".to_string(),
            )
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}
