//! Commit outcomes reported to callers and replayed on retries.

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, OrderStatus, SubOrderStatus, VendorId};
use serde::{Deserialize, Serialize};

/// What happened to one vendor's sub-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubOrderOutcome {
    pub vendor_id: VendorId,
    pub status: SubOrderStatus,
    pub subtotal: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Result of a commit that persisted at least one sub-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub order_id: OrderId,
    /// `Committed` or `Partial`.
    pub status: OrderStatus,
    pub is_atomic: bool,
    pub sub_orders: Vec<SubOrderOutcome>,
    pub delivery_fee: Money,
    pub grand_total: Money,
    /// What is owed for the confirmed sub-orders plus delivery.
    pub confirmed_total: Money,
    pub committed_at: DateTime<Utc>,
}

impl CommitResult {
    pub fn is_partial(&self) -> bool {
        self.status == OrderStatus::Partial
    }

    pub fn failed_vendors(&self) -> impl Iterator<Item = &VendorId> {
        self.sub_orders
            .iter()
            .filter(|s| s.status == SubOrderStatus::Failed)
            .map(|s| &s.vendor_id)
    }
}
