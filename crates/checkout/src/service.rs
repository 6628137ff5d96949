//! The validate → compose → commit pipeline.

use common::OrderId;
use domain::{Catalog, CartValidator, OrderComposer, RawCartSubmission};
use order_store::DocumentStore;

use crate::coordinator::{CommitCoordinator, StoredOrder};
use crate::error::CheckoutError;
use crate::publisher::OrderPublisher;
use crate::result::CommitResult;

/// Turns raw cart submissions into committed orders.
pub struct CheckoutService<C, S, P> {
    validator: CartValidator,
    composer: OrderComposer<C>,
    coordinator: CommitCoordinator<S, P>,
}

impl<C, S, P> CheckoutService<C, S, P>
where
    C: Catalog,
    S: DocumentStore + 'static,
    P: OrderPublisher + 'static,
{
    pub fn new(
        validator: CartValidator,
        composer: OrderComposer<C>,
        coordinator: CommitCoordinator<S, P>,
    ) -> Self {
        Self {
            validator,
            composer,
            coordinator,
        }
    }

    /// Validates, prices and commits a cart.
    ///
    /// Validation and catalog errors are returned before anything is written.
    #[tracing::instrument(skip(self, raw), fields(sync_cart_id = raw.sync_cart_id.as_deref()))]
    pub async fn checkout(&self, raw: RawCartSubmission) -> Result<CommitResult, CheckoutError> {
        let cart = self.validator.validate(raw).inspect_err(|err| {
            tracing::info!(violations = err.violations.len(), "cart rejected");
        })?;

        let plan = self.composer.compose(&cart).await?;
        tracing::debug!(
            vendors = plan.sub_orders().len(),
            grand_total = %plan.grand_total(),
            "cart composed"
        );

        Ok(self.coordinator.commit(plan).await?)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>, CheckoutError> {
        Ok(self.coordinator.get_order(order_id).await?)
    }

    pub fn validator(&self) -> &CartValidator {
        &self.validator
    }

    pub fn composer(&self) -> &OrderComposer<C> {
        &self.composer
    }

    pub fn coordinator(&self) -> &CommitCoordinator<S, P> {
        &self.coordinator
    }
}
