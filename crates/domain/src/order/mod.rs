//! Order model and related types.

mod model;
mod state;
mod value_objects;

pub use model::{Order, OrderLine, VendorSubOrder};
pub use state::{OrderStatus, SubOrderStatus};
pub use value_objects::{Money, ProductId, VariationId, VendorId};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Sub-order is not in the expected state.
    #[error("Invalid sub-order transition for {vendor_id}: cannot {action} from {current_status}")]
    InvalidSubOrderTransition {
        vendor_id: VendorId,
        current_status: SubOrderStatus,
        action: &'static str,
    },

    /// No sub-order exists for the vendor.
    #[error("Sub-order not found: {vendor_id}")]
    SubOrderNotFound { vendor_id: VendorId },

    /// A sub-order has not reached the status the transition needs.
    #[error("Sub-order {vendor_id} is {status}")]
    SubOrderNotConfirmed {
        vendor_id: VendorId,
        status: SubOrderStatus,
    },

    /// A partial outcome needs both confirmed and failed sub-orders.
    #[error("Order is not partial: {confirmed} confirmed, {failed} failed")]
    NotPartial { confirmed: usize, failed: usize },
}
