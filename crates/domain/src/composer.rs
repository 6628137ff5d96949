//! Turns a validated cart into an immutable commit plan.

use std::collections::HashMap;

use serde::Serialize;

use crate::cart::{CartItem, CartSubmission, Recipient};
use crate::catalog::{Catalog, CatalogEntry};
use crate::error::ComposeError;
use crate::order::{Money, OrderLine, ProductId, VendorId};
use crate::payment::Payment;
use crate::pricing::PricingCalculator;

/// The items one vendor fulfils, priced.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedSubOrder {
    vendor_id: VendorId,
    lines: Vec<OrderLine>,
    subtotal: Money,
}

impl PlannedSubOrder {
    pub fn vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Σ `unit_price × quantity` over the lines.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }
}

/// One parent order plus one sub-order per distinct vendor.
///
/// Fields are private; a plan cannot change once composed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    recipient: Recipient,
    payment: Payment,
    delivery_fee: Money,
    sub_orders: Vec<PlannedSubOrder>,
    grand_total: Money,
    is_atomic: bool,
    idempotency_key: Option<String>,
    request_digest: String,
}

impl OrderPlan {
    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    /// Charged once on the parent order, never split across vendors.
    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    /// Sub-orders in the order their vendor first appears in the cart.
    pub fn sub_orders(&self) -> &[PlannedSubOrder] {
        &self.sub_orders
    }

    pub fn grand_total(&self) -> Money {
        self.grand_total
    }

    pub fn is_atomic(&self) -> bool {
        self.is_atomic
    }

    /// The cart's `syncCartId`, if any.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.idempotency_key.as_deref()
    }

    /// Canonical JSON of the request that produced this plan.
    ///
    /// Two submissions with the same digest asked for the same thing. Prices
    /// are excluded so a catalog change between retries does not count as a
    /// different request.
    pub fn request_digest(&self) -> &str {
        &self.request_digest
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestDigest<'a> {
    recipient: &'a Recipient,
    payment: &'a Payment,
    delivery_fee: Money,
    is_atomic: bool,
    items: &'a [CartItem],
}

/// Partitions carts by vendor and prices every line.
#[derive(Debug, Clone)]
pub struct OrderComposer<C> {
    catalog: C,
    pricing: PricingCalculator,
}

impl<C: Catalog> OrderComposer<C> {
    pub fn new(catalog: C, pricing: PricingCalculator) -> Self {
        Self { catalog, pricing }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn pricing(&self) -> &PricingCalculator {
        &self.pricing
    }

    /// Composes an order plan.
    ///
    /// Fails on the first item the catalog cannot price. Nothing is written
    /// anywhere, so dropping the future at any point is safe.
    #[tracing::instrument(skip(self, cart), fields(items = cart.items.len()))]
    pub async fn compose(&self, cart: &CartSubmission) -> Result<OrderPlan, ComposeError> {
        let request_digest = serde_json::to_string(&RequestDigest {
            recipient: &cart.recipient,
            payment: &cart.payment,
            delivery_fee: cart.delivery_fee,
            is_atomic: cart.is_atomic,
            items: &cart.items,
        })?;

        let mut groups: Vec<(VendorId, Vec<&CartItem>)> = Vec::new();
        let mut index: HashMap<&VendorId, usize> = HashMap::new();
        for item in &cart.items {
            match index.get(&item.vendor_id) {
                Some(&i) => groups[i].1.push(item),
                None => {
                    index.insert(&item.vendor_id, groups.len());
                    groups.push((item.vendor_id.clone(), vec![item]));
                }
            }
        }

        let mut sub_orders = Vec::with_capacity(groups.len());
        let mut grand_total = cart.delivery_fee;
        for (vendor_id, items) in groups {
            let mut lines = Vec::with_capacity(items.len());
            let mut subtotal = Money::zero();
            for item in items {
                let line = self.price_item(item).await?;
                subtotal = subtotal
                    .checked_add(line.line_total)
                    .ok_or_else(|| overflow(&item.product_id))?;
                grand_total = grand_total
                    .checked_add(line.line_total)
                    .ok_or_else(|| overflow(&item.product_id))?;
                lines.push(line);
            }

            sub_orders.push(PlannedSubOrder {
                vendor_id,
                lines,
                subtotal,
            });
        }

        tracing::debug!(
            vendors = sub_orders.len(),
            grand_total = %grand_total,
            "order plan composed"
        );

        Ok(OrderPlan {
            recipient: cart.recipient.clone(),
            payment: cart.payment.clone(),
            delivery_fee: cart.delivery_fee,
            sub_orders,
            grand_total,
            is_atomic: cart.is_atomic,
            idempotency_key: cart.sync_cart_id.clone(),
            request_digest,
        })
    }

    async fn price_item(&self, item: &CartItem) -> Result<OrderLine, ComposeError> {
        let entry = self
            .catalog
            .lookup(&item.product_id, item.variation_id.as_ref())
            .await?;
        check_entry(&item.product_id, &entry)?;

        let price = self.pricing.breakdown(
            entry.base_price,
            entry.weight_kg,
            &entry.origin,
            entry.markup_percent,
        );
        let unit_price =
            Money::try_from_decimal(price.selling_price).ok_or_else(|| overflow(&item.product_id))?;
        let line_total = unit_price
            .checked_multiply(item.quantity)
            .ok_or_else(|| overflow(&item.product_id))?;

        Ok(OrderLine {
            item: item.clone(),
            price,
            unit_price,
            line_total,
        })
    }
}

fn overflow(product_id: &ProductId) -> ComposeError {
    ComposeError::AmountOverflow {
        product_id: product_id.clone(),
    }
}

fn check_entry(product_id: &ProductId, entry: &CatalogEntry) -> Result<(), ComposeError> {
    let negative = [
        ("basePrice", entry.base_price),
        ("weightKg", entry.weight_kg),
        ("markupPercent", entry.markup_percent),
    ]
    .into_iter()
    .find(|(_, value)| value.is_sign_negative() && !value.is_zero());

    match negative {
        Some((field, value)) => Err(ComposeError::InvalidCatalogEntry {
            product_id: product_id.clone(),
            reason: format!("{field} is negative ({value})"),
        }),
        None => Ok(()),
    }
}
