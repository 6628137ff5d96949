//! Untrusted cart payload as received from a client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cart submission before validation.
///
/// Every field is optional or loosely typed so that a malformed submission
/// still deserializes and the validator can report all of its problems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartSubmission {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub recipient_phone: Option<String>,
    #[serde(default)]
    pub recipient_address: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_details: Option<Value>,
    #[serde(default)]
    pub delivery_fee: Option<Value>,
    #[serde(default)]
    pub is_atomic: Option<bool>,
    #[serde(default)]
    pub items: Option<Vec<RawCartItem>>,
    #[serde(default)]
    pub save_payment: Option<bool>,
    #[serde(default)]
    pub sync_cart_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartItem {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub variation_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub vendor_id: Option<String>,
}

impl RawCartItem {
    pub fn new(product_id: &str, vendor_id: &str, quantity: u32) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            variation_id: None,
            quantity: Some(Value::from(quantity)),
            vendor_id: Some(vendor_id.to_string()),
        }
    }

    pub fn with_variation(mut self, variation_id: &str) -> Self {
        self.variation_id = Some(variation_id.to_string());
        self
    }
}
