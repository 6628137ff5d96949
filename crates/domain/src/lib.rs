//! Domain layer for the multi-vendor checkout engine.
//!
//! This crate provides:
//! - Pricing: landed cost and selling price from an injected rate schedule
//! - Cart validation: raw submissions into typed carts
//! - Order composition: per-vendor sub-orders and an immutable commit plan
//! - The order model with its status machine

pub mod cart;
pub mod catalog;
pub mod composer;
pub mod error;
pub mod order;
pub mod payment;
pub mod pricing;

pub use cart::{
    CartItem, CartSubmission, CartValidator, RawCartItem, RawCartSubmission, Recipient,
};
pub use catalog::{Catalog, CatalogEntry, CatalogError, InMemoryCatalog};
pub use composer::{OrderComposer, OrderPlan, PlannedSubOrder};
pub use error::{CartValidationError, ComposeError, FieldViolation};
pub use order::{
    Money, Order, OrderError, OrderLine, OrderStatus, ProductId, SubOrderStatus, VariationId,
    VendorId, VendorSubOrder,
};
pub use payment::{Payment, PaymentDetails, PaymentError, PaymentInstruction, PaymentMethod};
pub use pricing::{PriceBreakdown, PricingCalculator, PricingConfig, ShippingOrigin};
