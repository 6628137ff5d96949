//! Shared types used across the checkout workspace.

pub mod types;

pub use types::{OrderId, SubjectId};
