//! Catalog lookup capability used during order composition.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::{ProductId, VariationId};
use crate::pricing::ShippingOrigin;

/// Pricing inputs for one product (or product variation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub base_price: Decimal,
    pub weight_kg: Decimal,
    pub origin: ShippingOrigin,
    pub markup_percent: Decimal,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown product {product_id}{}", variation_suffix(.variation_id))]
    UnknownProduct {
        product_id: ProductId,
        variation_id: Option<VariationId>,
    },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

fn variation_suffix(variation_id: &Option<VariationId>) -> String {
    variation_id
        .as_ref()
        .map(|v| format!(" (variation {v})"))
        .unwrap_or_default()
}

/// Looks up pricing inputs for a product.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns the entry for the exact product/variation pair.
    async fn lookup(
        &self,
        product_id: &ProductId,
        variation_id: Option<&VariationId>,
    ) -> Result<CatalogEntry, CatalogError>;
}

#[async_trait]
impl<C: Catalog + ?Sized> Catalog for Arc<C> {
    async fn lookup(
        &self,
        product_id: &ProductId,
        variation_id: Option<&VariationId>,
    ) -> Result<CatalogEntry, CatalogError> {
        (**self).lookup(product_id, variation_id).await
    }
}

/// One row of a catalog JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogRecord {
    product_id: ProductId,
    #[serde(default)]
    variation_id: Option<VariationId>,
    #[serde(flatten)]
    entry: CatalogEntry,
}

type EntryKey = (ProductId, Option<VariationId>);

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    entries: HashMap<EntryKey, CatalogEntry>,
    lookups: usize,
    fail_lookups: bool,
}

/// In-memory catalog for tests and the development server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads entries from a JSON array of
    /// `{productId, variationId?, basePrice, weightKg, origin, markupPercent}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let records: Vec<CatalogRecord> = serde_json::from_str(json)?;
        let catalog = Self::new();
        for record in records {
            catalog.insert(record.product_id, record.variation_id, record.entry);
        }
        Ok(catalog)
    }

    /// Adds or replaces an entry.
    pub fn insert(
        &self,
        product_id: impl Into<ProductId>,
        variation_id: Option<VariationId>,
        entry: CatalogEntry,
    ) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state
            .entries
            .insert((product_id.into(), variation_id), entry);
    }

    /// Makes every lookup fail with [`CatalogError::Unavailable`].
    pub fn set_fail_lookups(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .fail_lookups = fail;
    }

    /// Number of lookups served so far.
    pub fn lookup_count(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).lookups
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn lookup(
        &self,
        product_id: &ProductId,
        variation_id: Option<&VariationId>,
    ) -> Result<CatalogEntry, CatalogError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.lookups += 1;

        if state.fail_lookups {
            return Err(CatalogError::Unavailable(
                "catalog lookups disabled".to_string(),
            ));
        }

        let key = (product_id.clone(), variation_id.cloned());
        state
            .entries
            .get(&key)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownProduct {
                product_id: key.0,
                variation_id: key.1,
            })
    }
}
