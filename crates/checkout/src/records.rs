//! Stored document shapes and their collections.
//!
//! | collection         | key                      | payload               |
//! |--------------------|--------------------------|-----------------------|
//! | `orders`           | order id                 | [`OrderRecord`]       |
//! | `sub_orders`       | `{orderId}:{vendorId}`   | `VendorSubOrder`      |
//! | `idempotency_keys` | `syncCartId`             | [`IdempotencyRecord`] |

use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, OrderStatus, Payment, Recipient, SubOrderStatus, VendorId, VendorSubOrder};
use order_store::{Document, StoreError};
use serde::{Deserialize, Serialize};

use crate::result::{CommitResult, SubOrderOutcome};

pub const ORDERS: &str = "orders";
pub const SUB_ORDERS: &str = "sub_orders";
pub const IDEMPOTENCY_KEYS: &str = "idempotency_keys";

pub fn sub_order_key(order_id: OrderId, vendor_id: &VendorId) -> String {
    format!("{order_id}:{vendor_id}")
}

/// Builds a document in `collection` with the serialized `payload`.
pub(crate) fn document<T: Serialize>(
    collection: &str,
    key: &str,
    payload: &T,
    order_id: OrderId,
) -> Result<Document, StoreError> {
    Document::builder()
        .collection(collection)
        .key(key)
        .payload(payload)?
        .metadata("order_id", serde_json::Value::String(order_id.to_string()))
        .metadata("writer", serde_json::Value::String("checkout".to_string()))
        .build()
}

pub(crate) fn sub_order_document(sub_order: &VendorSubOrder) -> Result<Document, StoreError> {
    document(
        SUB_ORDERS,
        &sub_order_key(sub_order.order_id(), sub_order.vendor_id()),
        sub_order,
        sub_order.order_id(),
    )
}

/// The parent order as persisted. Line items live in the sub-order documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub recipient: Recipient,
    pub payment: Payment,
    pub delivery_fee: Money,
    pub grand_total: Money,
    pub confirmed_total: Money,
    pub is_atomic: bool,
    pub status: OrderStatus,
    pub sub_orders: Vec<SubOrderOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub committed_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn from_order(
        order: &Order,
        idempotency_key: Option<String>,
        committed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: order.order_id(),
            recipient: order.recipient().clone(),
            payment: order.payment().clone(),
            delivery_fee: order.delivery_fee(),
            grand_total: order.grand_total(),
            confirmed_total: order.confirmed_total(),
            is_atomic: order.is_atomic(),
            status: order.status(),
            sub_orders: order
                .sub_orders()
                .iter()
                .map(|s| SubOrderOutcome {
                    vendor_id: s.vendor_id().clone(),
                    status: s.status(),
                    subtotal: s.subtotal(),
                    failure: s.failure_reason().map(str::to_string),
                })
                .collect(),
            idempotency_key,
            created_at: order.created_at(),
            committed_at,
        }
    }

    pub fn to_result(&self) -> CommitResult {
        CommitResult {
            order_id: self.order_id,
            status: self.status,
            is_atomic: self.is_atomic,
            sub_orders: self.sub_orders.clone(),
            delivery_fee: self.delivery_fee,
            grand_total: self.grand_total,
            confirmed_total: self.confirmed_total,
            committed_at: self.committed_at,
        }
    }

    pub(crate) fn to_document(&self) -> Result<Document, StoreError> {
        document(ORDERS, &self.order_id.to_string(), self, self.order_id)
    }

    /// Vendors whose sub-order document was written.
    pub fn confirmed_vendors(&self) -> impl Iterator<Item = &VendorId> {
        self.sub_orders
            .iter()
            .filter(|s| s.status == SubOrderStatus::Confirmed)
            .map(|s| &s.vendor_id)
    }
}

/// Progress of the commit that owns an idempotency key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotencyState {
    InFlight,
    Completed { result: CommitResult },
}

/// Claim on a `syncCartId`, written before any order document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    pub key: String,
    pub request_digest: String,
    pub order_id: OrderId,
    pub claimed_at: DateTime<Utc>,
    pub state: IdempotencyState,
}

impl IdempotencyRecord {
    pub fn in_flight(key: &str, request_digest: &str, order_id: OrderId) -> Self {
        Self {
            key: key.to_string(),
            request_digest: request_digest.to_string(),
            order_id,
            claimed_at: Utc::now(),
            state: IdempotencyState::InFlight,
        }
    }

    pub fn completed(mut self, result: CommitResult) -> Self {
        self.state = IdempotencyState::Completed { result };
        self
    }

    pub(crate) fn to_document(&self) -> Result<Document, StoreError> {
        document(IDEMPOTENCY_KEYS, &self.key, self, self.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_order_key() {
        let order_id = OrderId::new();
        let key = sub_order_key(order_id, &VendorId::new("vendor-a"));
        assert_eq!(key, format!("{order_id}:vendor-a"));
    }

    #[test]
    fn test_idempotency_record_states_serialize_with_tag() {
        let record = IdempotencyRecord::in_flight("cart-1", "{}", OrderId::new());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["state"]["state"], "IN_FLIGHT");
        assert_eq!(json["requestDigest"], "{}");

        let back: IdempotencyRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_document_carries_order_metadata() {
        let order_id = OrderId::new();
        let record = IdempotencyRecord::in_flight("cart-1", "{}", order_id);
        let doc = record.to_document().unwrap();

        assert_eq!(doc.key.collection, IDEMPOTENCY_KEYS);
        assert_eq!(doc.key.key, "cart-1");
        assert_eq!(doc.metadata["order_id"], order_id.to_string());
    }
}
