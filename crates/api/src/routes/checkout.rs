//! Cart submission endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::CommitResult;
use domain::RawCartSubmission;
use order_store::DocumentStore;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /checkout: validate, price and commit a cart.
///
/// Responds 201 with the commit result. A partially committed non-atomic
/// cart is reported as 207 with the same body shape.
#[tracing::instrument(skip(state, raw))]
pub async fn submit<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(raw): Json<RawCartSubmission>,
) -> Result<(StatusCode, Json<CommitResult>), ApiError> {
    let result = state.checkout.checkout(raw).await?;
    Ok((StatusCode::CREATED, Json(result)))
}
