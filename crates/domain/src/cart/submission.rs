//! Validated cart types.

use common::SubjectId;
use serde::{Deserialize, Serialize};

use crate::order::{Money, ProductId, VariationId, VendorId};
use crate::payment::Payment;

/// One line of a validated cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variation_id: Option<VariationId>,
    /// Always greater than zero.
    pub quantity: u32,
    pub vendor_id: VendorId,
}

/// Who receives the delivery. `id` is absent for guest checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SubjectId>,
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// A cart that passed validation. Items are non-empty and in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSubmission {
    pub recipient: Recipient,
    pub payment: Payment,
    pub delivery_fee: Money,
    pub is_atomic: bool,
    pub items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_cart_id: Option<String>,
}
