//! Order and sub-order status machines.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Draft ──┬──► Committed
///         ├──► Partial
///         └──► Aborted
/// ```
///
/// Every transition leaves `Draft` and happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Composed but not yet committed.
    #[default]
    Draft,

    /// Every sub-order was persisted (terminal state).
    Committed,

    /// Nothing was persisted (terminal state).
    Aborted,

    /// Non-atomic commit where some sub-orders failed (terminal state).
    Partial,
}

impl OrderStatus {
    /// Returns true if the order can be committed in this status.
    pub fn can_commit(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    /// Returns true if the order can be aborted in this status.
    pub fn can_abort(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    /// Returns true if the order can be marked partial in this status.
    pub fn can_mark_partial(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Draft)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Committed => "COMMITTED",
            OrderStatus::Aborted => "ABORTED",
            OrderStatus::Partial => "PARTIAL",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of one vendor's sub-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubOrderStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

impl SubOrderStatus {
    pub fn can_confirm(&self) -> bool {
        matches!(self, SubOrderStatus::Pending)
    }

    pub fn can_fail(&self) -> bool {
        matches!(self, SubOrderStatus::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubOrderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubOrderStatus::Pending => "PENDING",
            SubOrderStatus::Confirmed => "CONFIRMED",
            SubOrderStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for SubOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
