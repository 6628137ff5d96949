//! Commit of multi-vendor order plans.
//!
//! An [`OrderPlan`](domain::OrderPlan) is persisted as one parent order plus
//! one sub-order document per vendor. Atomic plans become visible all at once
//! or not at all. Non-atomic plans keep whichever sub-orders succeeded and are
//! reported as partial. Submissions carrying a `syncCartId` are idempotent.

pub mod coordinator;
pub mod error;
mod idempotency;
pub mod publisher;
pub mod records;
pub mod result;
pub mod retry;
pub mod service;

pub use coordinator::{CommitConfig, CommitCoordinator, StoredOrder};
pub use error::{CheckoutError, CommitError, Result};
pub use publisher::{InMemoryOrderPublisher, OrderCommitted, OrderPublisher, PublishError, TracingPublisher};
pub use records::{IdempotencyRecord, IdempotencyState, OrderRecord};
pub use result::{CommitResult, SubOrderOutcome};
pub use retry::RetryPolicy;
pub use service::CheckoutService;
