//! Order read endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::OrderRecord;
use common::OrderId;
use domain::VendorSubOrder;
use order_store::DocumentStore;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: OrderRecord,
    /// Persisted sub-order documents, with their line items.
    pub sub_order_details: Vec<VendorSubOrder>,
}

/// GET /orders/{id}: load a persisted order.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = OrderId::parse(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID '{id}': {e}")))?;

    let stored = state
        .checkout
        .get_order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse {
        order: stored.record,
        sub_order_details: stored.sub_orders,
    }))
}
