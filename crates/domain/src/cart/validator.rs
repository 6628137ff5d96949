use std::collections::HashSet;

use common::SubjectId;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{CartValidationError, FieldViolation};
use crate::order::{Money, ProductId, VariationId, VendorId};
use crate::payment::{Payment, PaymentDetails, PaymentMethod};

use super::{CartItem, CartSubmission, RawCartItem, RawCartSubmission, Recipient};

/// Checks and normalizes raw cart submissions.
///
/// Validation is pure. String fields are trimmed and blank optional fields
/// are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct CartValidator {
    known_vendors: Option<HashSet<VendorId>>,
}

impl CartValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts `vendorId` to the given directory.
    pub fn with_known_vendors<I, V>(mut self, vendors: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<VendorId>,
    {
        self.known_vendors = Some(vendors.into_iter().map(Into::into).collect());
        self
    }

    /// Validates a raw submission, reporting every violation at once.
    pub fn validate(&self, raw: RawCartSubmission) -> Result<CartSubmission, CartValidationError> {
        let mut violations = Vec::new();

        let name = required(&raw.recipient_name, "recipientName", &mut violations);
        let phone = required(&raw.recipient_phone, "recipientPhone", &mut violations);
        let address = required(&raw.recipient_address, "recipientAddress", &mut violations);
        let method = required(&raw.payment_method, "paymentMethod", &mut violations);
        let delivery_fee = delivery_fee(raw.delivery_fee.as_ref(), &mut violations);
        if raw.is_atomic.is_none() {
            violations.push(FieldViolation::new("isAtomic", "is required"));
        }

        let mut items = Vec::new();
        match raw.items.as_deref() {
            None | Some([]) => violations.push(FieldViolation::new(
                "items",
                "must contain at least one item",
            )),
            Some(raw_items) => {
                for (index, item) in raw_items.iter().enumerate() {
                    if let Some(item) = self.validate_item(index, item, &mut violations) {
                        items.push(item);
                    }
                }
            }
        }

        if !violations.is_empty() {
            return Err(CartValidationError { violations });
        }

        let (
            Some(name),
            Some(phone),
            Some(address),
            Some(method),
            Some(delivery_fee),
            Some(is_atomic),
        ) = (name, phone, address, method, delivery_fee, raw.is_atomic)
        else {
            return Err(CartValidationError { violations });
        };

        Ok(CartSubmission {
            recipient: Recipient {
                id: optional(&raw.recipient_id).map(SubjectId::new),
                name,
                phone,
                address,
            },
            payment: Payment {
                method: PaymentMethod::parse(&method),
                details: PaymentDetails::new(raw.payment_details.unwrap_or(Value::Null)),
                save: raw.save_payment.unwrap_or(false),
            },
            delivery_fee,
            is_atomic,
            items,
            sync_cart_id: optional(&raw.sync_cart_id),
        })
    }

    fn validate_item(
        &self,
        index: usize,
        raw: &RawCartItem,
        violations: &mut Vec<FieldViolation>,
    ) -> Option<CartItem> {
        let field = |name: &str| format!("items[{index}].{name}");

        let product_id = required(&raw.product_id, &field("productId"), violations);
        let vendor_id = required(&raw.vendor_id, &field("vendorId"), violations).map(VendorId::new);
        let quantity = quantity(raw.quantity.as_ref(), &field("quantity"), violations);

        if let (Some(vendor), Some(known)) = (&vendor_id, &self.known_vendors)
            && !known.contains(vendor)
        {
            violations.push(FieldViolation::new(
                field("vendorId"),
                format!("unknown vendor '{vendor}'"),
            ));
            return None;
        }

        Some(CartItem {
            product_id: ProductId::new(product_id?),
            variation_id: optional(&raw.variation_id).map(VariationId::new),
            quantity: quantity?,
            vendor_id: vendor_id?,
        })
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(
    value: &Option<String>,
    field: &str,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let value = optional(value);
    if value.is_none() {
        violations.push(FieldViolation::new(field, "is required"));
    }
    value
}

fn quantity(value: Option<&Value>, field: &str, violations: &mut Vec<FieldViolation>) -> Option<u32> {
    let reason = match value {
        None | Some(Value::Null) => "is required",
        Some(Value::Number(n)) => match n.as_u64() {
            Some(0) => "must be a positive integer",
            Some(q) => match u32::try_from(q) {
                Ok(q) => return Some(q),
                Err(_) => "exceeds the maximum quantity",
            },
            None => "must be a positive integer",
        },
        Some(_) => "must be a positive integer",
    };
    violations.push(FieldViolation::new(field, reason));
    None
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn delivery_fee(value: Option<&Value>, violations: &mut Vec<FieldViolation>) -> Option<Money> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        violations.push(FieldViolation::new("deliveryFee", "is required"));
        return None;
    };

    let reason = match parse_decimal(value) {
        None => "must be a number",
        Some(fee) if fee.is_sign_negative() && !fee.is_zero() => "must not be negative",
        Some(fee) => match Money::try_from_decimal(fee) {
            Some(money) => return Some(money),
            None => "is too large",
        },
    };
    violations.push(FieldViolation::new("deliveryFee", reason));
    None
}
