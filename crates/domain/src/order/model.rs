//! Order and vendor sub-order records.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::cart::{CartItem, Recipient};
use crate::composer::{OrderPlan, PlannedSubOrder};
use crate::payment::Payment;
use crate::pricing::PriceBreakdown;

use super::{Money, OrderError, OrderStatus, SubOrderStatus, VendorId};

/// A priced cart item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item: CartItem,
    pub price: PriceBreakdown,
    /// Selling price of one unit in cents.
    pub unit_price: Money,
    /// `unit_price × quantity`.
    pub line_total: Money,
}

/// The part of an order fulfilled by a single vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorSubOrder {
    vendor_id: VendorId,
    order_id: OrderId,
    lines: Vec<OrderLine>,
    subtotal: Money,
    status: SubOrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
}

impl VendorSubOrder {
    /// Creates a pending sub-order for a planned vendor group.
    pub fn pending(order_id: OrderId, planned: &PlannedSubOrder) -> Self {
        Self {
            vendor_id: planned.vendor_id().clone(),
            order_id,
            lines: planned.lines().to_vec(),
            subtotal: planned.subtotal(),
            status: SubOrderStatus::Pending,
            failure_reason: None,
        }
    }

    pub fn vendor_id(&self) -> &VendorId {
        &self.vendor_id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn status(&self) -> SubOrderStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn confirm(&mut self) -> Result<(), OrderError> {
        if !self.status.can_confirm() {
            return Err(self.invalid_transition("confirm"));
        }
        self.status = SubOrderStatus::Confirmed;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), OrderError> {
        if !self.status.can_fail() {
            return Err(self.invalid_transition("fail"));
        }
        self.status = SubOrderStatus::Failed;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    fn invalid_transition(&self, action: &'static str) -> OrderError {
        OrderError::InvalidSubOrderTransition {
            vendor_id: self.vendor_id.clone(),
            current_status: self.status,
            action,
        }
    }
}

/// A multi-vendor order.
///
/// Created in [`OrderStatus::Draft`] from an [`OrderPlan`] and moved to a
/// terminal status exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    order_id: OrderId,
    recipient: Recipient,
    payment: Payment,
    delivery_fee: Money,
    sub_orders: Vec<VendorSubOrder>,
    grand_total: Money,
    is_atomic: bool,
    created_at: DateTime<Utc>,
    status: OrderStatus,
}

impl Order {
    /// Creates a draft order with one pending sub-order per planned vendor.
    pub fn draft(order_id: OrderId, plan: &OrderPlan, created_at: DateTime<Utc>) -> Self {
        Self {
            order_id,
            recipient: plan.recipient().clone(),
            payment: plan.payment().clone(),
            delivery_fee: plan.delivery_fee(),
            sub_orders: plan
                .sub_orders()
                .iter()
                .map(|planned| VendorSubOrder::pending(order_id, planned))
                .collect(),
            grand_total: plan.grand_total(),
            is_atomic: plan.is_atomic(),
            created_at,
            status: OrderStatus::Draft,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn recipient(&self) -> &Recipient {
        &self.recipient
    }

    pub fn payment(&self) -> &Payment {
        &self.payment
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn sub_orders(&self) -> &[VendorSubOrder] {
        &self.sub_orders
    }

    pub fn sub_order(&self, vendor_id: &VendorId) -> Option<&VendorSubOrder> {
        self.sub_orders.iter().find(|s| &s.vendor_id == vendor_id)
    }

    /// Σ sub-order subtotals + delivery fee.
    pub fn grand_total(&self) -> Money {
        self.grand_total
    }

    /// Confirmed subtotals plus the delivery fee. Equal to the grand total
    /// unless some sub-orders failed.
    pub fn confirmed_total(&self) -> Money {
        self.sub_orders
            .iter()
            .filter(|s| s.status == SubOrderStatus::Confirmed)
            .map(|s| s.subtotal)
            .sum::<Money>()
            + self.delivery_fee
    }

    pub fn is_atomic(&self) -> bool {
        self.is_atomic
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn confirm_sub_order(&mut self, vendor_id: &VendorId) -> Result<(), OrderError> {
        self.ensure_draft("confirm sub-order")?;
        self.sub_order_mut(vendor_id)?.confirm()
    }

    pub fn fail_sub_order(
        &mut self,
        vendor_id: &VendorId,
        reason: impl Into<String>,
    ) -> Result<(), OrderError> {
        self.ensure_draft("fail sub-order")?;
        self.sub_order_mut(vendor_id)?.fail(reason)
    }

    /// Moves to `Committed`. Every sub-order must be confirmed.
    pub fn commit(&mut self) -> Result<(), OrderError> {
        if !self.status.can_commit() {
            return Err(self.invalid_transition("commit"));
        }
        if let Some(unconfirmed) = self
            .sub_orders
            .iter()
            .find(|s| s.status != SubOrderStatus::Confirmed)
        {
            return Err(OrderError::SubOrderNotConfirmed {
                vendor_id: unconfirmed.vendor_id.clone(),
                status: unconfirmed.status,
            });
        }
        self.status = OrderStatus::Committed;
        Ok(())
    }

    /// Moves to `Aborted`.
    pub fn abort(&mut self) -> Result<(), OrderError> {
        if !self.status.can_abort() {
            return Err(self.invalid_transition("abort"));
        }
        self.status = OrderStatus::Aborted;
        Ok(())
    }

    /// Moves to `Partial`. Needs at least one confirmed and one failed
    /// sub-order, and none pending.
    pub fn mark_partial(&mut self) -> Result<(), OrderError> {
        if !self.status.can_mark_partial() {
            return Err(self.invalid_transition("mark partial"));
        }
        self.ensure_settled()?;
        let confirmed = self.count(SubOrderStatus::Confirmed);
        let failed = self.count(SubOrderStatus::Failed);
        if confirmed == 0 || failed == 0 {
            return Err(OrderError::NotPartial { confirmed, failed });
        }
        self.status = OrderStatus::Partial;
        Ok(())
    }

    /// Picks the terminal status from the sub-order outcomes: all confirmed
    /// commits, none confirmed aborts, anything else is partial.
    pub fn settle(&mut self) -> Result<OrderStatus, OrderError> {
        self.ensure_settled()?;
        let confirmed = self.count(SubOrderStatus::Confirmed);

        if confirmed == self.sub_orders.len() {
            self.commit()?;
        } else if confirmed == 0 {
            self.abort()?;
        } else {
            self.mark_partial()?;
        }
        Ok(self.status)
    }

    fn count(&self, status: SubOrderStatus) -> usize {
        self.sub_orders.iter().filter(|s| s.status == status).count()
    }

    fn ensure_settled(&self) -> Result<(), OrderError> {
        match self
            .sub_orders
            .iter()
            .find(|s| s.status == SubOrderStatus::Pending)
        {
            Some(pending) => Err(OrderError::SubOrderNotConfirmed {
                vendor_id: pending.vendor_id.clone(),
                status: pending.status,
            }),
            None => Ok(()),
        }
    }

    fn ensure_draft(&self, action: &'static str) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(self.invalid_transition(action));
        }
        Ok(())
    }

    fn sub_order_mut(&mut self, vendor_id: &VendorId) -> Result<&mut VendorSubOrder, OrderError> {
        self.sub_orders
            .iter_mut()
            .find(|s| &s.vendor_id == vendor_id)
            .ok_or_else(|| OrderError::SubOrderNotFound {
                vendor_id: vendor_id.clone(),
            })
    }

    fn invalid_transition(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}
