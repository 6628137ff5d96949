//! Checkout error types.

use common::OrderId;
use domain::{CartValidationError, ComposeError, OrderError, VendorId};
use order_store::StoreError;
use thiserror::Error;

use crate::result::CommitResult;

/// Errors returned by the commit coordinator.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The idempotency key was already used for a different request.
    #[error("Idempotency key '{key}' was already used for a different request")]
    Conflict { key: String },

    /// Another commit holds the idempotency key and did not finish in time.
    #[error("Commit for idempotency key '{key}' is still in progress")]
    InProgress { key: String },

    /// Nothing was persisted for the order.
    #[error("Commit of order {order_id} aborted{}: {cause}", vendor_suffix(.vendor_id))]
    Aborted {
        order_id: OrderId,
        vendor_id: Option<VendorId>,
        #[source]
        cause: StoreError,
    },

    /// The parent order of a non-atomic commit could not be written, and
    /// some of the sub-orders already persisted for it could not be removed.
    ///
    /// The idempotency key stays claimed, so a retry cannot create a second
    /// set of sub-orders.
    #[error(
        "Commit of order {order_id} failed with {} sub-order(s) left behind: {cause}",
        .sub_orders.len()
    )]
    Orphaned {
        order_id: OrderId,
        /// Keys of the sub-order documents still in the store.
        sub_orders: Vec<String>,
        #[source]
        cause: StoreError,
    },

    /// Non-atomic commit where some sub-orders failed. The order exists
    /// with status `PARTIAL`.
    #[error("{}", partial_summary(.result))]
    PartialCommit { result: Box<CommitResult> },

    /// Store error outside of the order write set.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Order state machine violation.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// The detached commit task panicked or was cancelled by the runtime.
    #[error("Commit task failed: {0}")]
    TaskFailed(String),
}

fn vendor_suffix(vendor_id: &Option<VendorId>) -> String {
    vendor_id
        .as_ref()
        .map(|v| format!(" at vendor {v}"))
        .unwrap_or_default()
}

fn partial_summary(result: &CommitResult) -> String {
    format!(
        "Order {} partially committed: {} of {} sub-orders failed",
        result.order_id,
        result.failed_vendors().count(),
        result.sub_orders.len()
    )
}

impl CommitError {
    /// The per-sub-order result of a partial commit.
    pub fn partial_result(&self) -> Option<&CommitResult> {
        match self {
            CommitError::PartialCommit { result } => Some(result),
            _ => None,
        }
    }
}

/// Errors from the validate → compose → commit pipeline.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(#[from] CartValidationError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// Convenience type alias for commit results.
pub type Result<T> = std::result::Result<T, CommitError>;
