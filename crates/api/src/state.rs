//! Shared application state.

use std::sync::Arc;

use checkout::{CheckoutService, CommitCoordinator, TracingPublisher};
use domain::{CartValidator, InMemoryCatalog, OrderComposer, PricingCalculator};
use order_store::DocumentStore;
use roles::{InMemoryClaimsStore, InMemoryProfileStore, RoleReconciler};

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub checkout: CheckoutService<InMemoryCatalog, S, TracingPublisher>,
    pub roles: RoleReconciler<InMemoryClaimsStore, InMemoryProfileStore>,
}

/// Wires the checkout pipeline and the role reconciler from configuration.
pub fn create_state<S: DocumentStore + 'static>(
    config: &Config,
    store: S,
    catalog: InMemoryCatalog,
) -> Arc<AppState<S>> {
    let validator = match &config.known_vendors {
        Some(vendors) => CartValidator::new().with_known_vendors(vendors.iter().map(String::as_str)),
        None => CartValidator::new(),
    };
    let composer = OrderComposer::new(catalog, PricingCalculator::new(config.pricing.clone()));
    let coordinator = CommitCoordinator::with_config(store, TracingPublisher, config.commit.clone());

    let claims = InMemoryClaimsStore::new();
    for subject in &config.known_subjects {
        claims.add_identity(subject.as_str());
    }

    Arc::new(AppState {
        checkout: CheckoutService::new(validator, composer, coordinator),
        roles: RoleReconciler::new(claims, InMemoryProfileStore::new()),
    })
}
