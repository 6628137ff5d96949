//! Outbound publication of committed orders.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::Order;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Published once per order that reached `COMMITTED` or `PARTIAL`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCommitted {
    pub order: Order,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),
}

/// Hands committed orders to downstream consumers (fulfilment, notifications).
#[async_trait]
pub trait OrderPublisher: Send + Sync {
    async fn publish(&self, event: &OrderCommitted) -> Result<(), PublishError>;
}

/// Publisher that only emits a log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl OrderPublisher for TracingPublisher {
    async fn publish(&self, event: &OrderCommitted) -> Result<(), PublishError> {
        tracing::info!(
            order_id = %event.order.order_id(),
            status = %event.order.status(),
            sub_orders = event.order.sub_orders().len(),
            "order published"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<OrderCommitted>,
    fail_on_publish: bool,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryOrderPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every publish call.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .fail_on_publish = fail;
    }

    /// Returns every event published so far.
    pub fn published(&self) -> Vec<OrderCommitted> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .published
            .clone()
    }

    pub fn published_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .published
            .len()
    }
}

#[async_trait]
impl OrderPublisher for InMemoryOrderPublisher {
    async fn publish(&self, event: &OrderCommitted) -> Result<(), PublishError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if state.fail_on_publish {
            return Err(PublishError::Unavailable("broker offline".to_string()));
        }

        state.published.push(event.clone());
        Ok(())
    }
}
