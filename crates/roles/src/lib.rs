//! Role grants mirrored between identity claims and profile records.
//!
//! The identity provider's claims are authoritative. [`RoleReconciler`]
//! writes them first and mirrors the role into the profile store, reporting
//! rather than hiding a failed mirror write.

pub mod error;
pub mod reconciler;
pub mod role;
pub mod stores;

pub use error::{ReconcileError, RoleStoreError};
pub use reconciler::{ReconcileResult, RepairOutcome, RoleAudit, RoleReconciler};
pub use role::{Role, UnknownRole};
pub use stores::{ClaimsStore, InMemoryClaimsStore, InMemoryProfileStore, ProfileStore};
