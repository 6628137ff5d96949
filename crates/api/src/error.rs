//! API error types with HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, CommitError};
use domain::ComposeError;
use roles::{ReconcileError, RoleStoreError};
use serde_json::json;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout pipeline error.
    Checkout(CheckoutError),
    /// Role reconciliation error.
    Roles(ReconcileError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Roles(err) => roles_error_to_response(err),
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    if status.is_server_error() {
        tracing::error!(%status, error = %message, "request failed");
    }
    (status, Json(json!({ "error": message }))).into_response()
}

fn checkout_error_to_response(err: CheckoutError) -> Response {
    let message = err.to_string();
    match err {
        CheckoutError::Validation(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": message, "violations": err.violations })),
        )
            .into_response(),
        CheckoutError::Compose(ComposeError::UnknownProduct {
            product_id,
            variation_id,
        }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": message,
                "productId": product_id,
                "variationId": variation_id,
            })),
        )
            .into_response(),
        CheckoutError::Compose(ComposeError::CatalogUnavailable(_)) => {
            error_body(StatusCode::SERVICE_UNAVAILABLE, message)
        }
        CheckoutError::Compose(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, message),
        CheckoutError::Commit(CommitError::PartialCommit { result }) => {
            (StatusCode::MULTI_STATUS, Json(*result)).into_response()
        }
        CheckoutError::Commit(CommitError::Conflict { .. } | CommitError::InProgress { .. }) => {
            error_body(StatusCode::CONFLICT, message)
        }
        CheckoutError::Commit(CommitError::Aborted {
            order_id, vendor_id, ..
        }) => {
            tracing::warn!(%order_id, ?vendor_id, error = %message, "checkout aborted");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": message,
                    "orderId": order_id,
                    "vendorId": vendor_id,
                })),
            )
                .into_response()
        }
        CheckoutError::Commit(CommitError::Orphaned { order_id, .. }) => {
            tracing::error!(%order_id, error = %message, "checkout left sub-orders behind");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message, "orderId": order_id })),
            )
                .into_response()
        }
        CheckoutError::Commit(_) => error_body(StatusCode::INTERNAL_SERVER_ERROR, message),
    }
}

fn roles_error_to_response(err: ReconcileError) -> Response {
    let message = err.to_string();
    match err {
        ReconcileError::Claims {
            source: RoleStoreError::SubjectNotFound(_),
            ..
        } => error_body(StatusCode::NOT_FOUND, message),
        ReconcileError::Claims { .. } | ReconcileError::Profile { .. } => {
            error_body(StatusCode::SERVICE_UNAVAILABLE, message)
        }
        ReconcileError::Inconsistent { .. } => error_body(StatusCode::CONFLICT, message),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Roles(err)
    }
}
