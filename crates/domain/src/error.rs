//! Domain error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::order::{ProductId, VariationId};

/// A single problem with one field of a cart submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Path of the offending field, e.g. `items[1].quantity`.
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every violation found in a cart submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cart: {}", join_violations(.violations))]
pub struct CartValidationError {
    pub violations: Vec<FieldViolation>,
}

impl CartValidationError {
    /// Returns true if `field` has at least one violation.
    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while turning a cart into an order plan.
///
/// Composition never touches the store, so none of these leave state behind.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("unknown product {product_id}")]
    UnknownProduct {
        product_id: ProductId,
        variation_id: Option<VariationId>,
    },

    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("invalid catalog entry for {product_id}: {reason}")]
    InvalidCatalogEntry {
        product_id: ProductId,
        reason: String,
    },

    #[error("amount overflow while pricing {product_id}")]
    AmountOverflow { product_id: ProductId },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CatalogError> for ComposeError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownProduct {
                product_id,
                variation_id,
            } => ComposeError::UnknownProduct {
                product_id,
                variation_id,
            },
            CatalogError::Unavailable(reason) => ComposeError::CatalogUnavailable(reason),
        }
    }
}
