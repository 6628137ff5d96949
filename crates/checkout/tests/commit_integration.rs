//! Integration tests for the checkout pipeline.

use std::time::Duration;

use checkout::{
    CheckoutError, CheckoutService, CommitConfig, CommitCoordinator, CommitError,
    InMemoryOrderPublisher, RetryPolicy,
};
use domain::{
    CartValidator, InMemoryCatalog, OrderComposer, OrderStatus, PricingCalculator, RawCartItem,
    RawCartSubmission, SubOrderStatus, VendorId,
};
use order_store::{FailPoint, InMemoryDocumentStore, InjectedFailure};
use serde_json::json;

type TestService = CheckoutService<InMemoryCatalog, InMemoryDocumentStore, InMemoryOrderPublisher>;

const CATALOG: &str = r#"[
    {"productId": "PHONE", "basePrice": "100", "weightKg": "1", "origin": "AMAZON_UAE", "markupPercent": "20"},
    {"productId": "CASE", "basePrice": "8.40", "weightKg": "0.2", "origin": "ALIEXPRESS", "markupPercent": "35"},
    {"productId": "LAMP", "basePrice": "45", "weightKg": "3", "origin": "ALIBABA", "markupPercent": "10"}
]"#;

struct TestHarness {
    service: TestService,
    store: InMemoryDocumentStore,
    publisher: InMemoryOrderPublisher,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(CommitConfig::default())
    }

    fn with_config(config: CommitConfig) -> Self {
        let store = InMemoryDocumentStore::new();
        let publisher = InMemoryOrderPublisher::new();

        let composer = OrderComposer::new(
            InMemoryCatalog::from_json(CATALOG).unwrap(),
            PricingCalculator::default(),
        );
        let coordinator = CommitCoordinator::with_config(store.clone(), publisher.clone(), config);
        let service = CheckoutService::new(CartValidator::new(), composer, coordinator);

        Self {
            service,
            store,
            publisher,
        }
    }

    fn cart(&self, atomic: bool, sync_cart_id: Option<&str>) -> RawCartSubmission {
        RawCartSubmission {
            recipient_name: Some("Amina".to_string()),
            recipient_phone: Some("+971500000000".to_string()),
            recipient_address: Some("Dubai Marina".to_string()),
            payment_method: Some("COD".to_string()),
            delivery_fee: Some(json!(15)),
            is_atomic: Some(atomic),
            items: Some(vec![
                RawCartItem::new("PHONE", "vendor-a", 1),
                RawCartItem::new("CASE", "vendor-b", 2),
                RawCartItem::new("LAMP", "vendor-a", 1),
            ]),
            sync_cart_id: sync_cart_id.map(str::to_string),
            ..Default::default()
        }
    }

    fn fail_second_sub_order(&self) {
        self.store
            .inject_failure(FailPoint::new("sub_orders", 2, InjectedFailure::Rejected));
    }

    async fn orders(&self) -> usize {
        self.store.count("orders").await
    }

    async fn sub_orders(&self) -> usize {
        self.store.count("sub_orders").await
    }
}

fn into_commit_error(err: CheckoutError) -> CommitError {
    match err {
        CheckoutError::Commit(err) => err,
        other => panic!("expected commit error, got {other:?}"),
    }
}

mod atomic {
    use super::*;

    #[tokio::test]
    async fn commits_every_sub_order() {
        let h = TestHarness::new();

        let result = h.service.checkout(h.cart(true, None)).await.unwrap();

        assert_eq!(result.status, OrderStatus::Committed);
        assert_eq!(result.sub_orders.len(), 2);
        assert!(
            result
                .sub_orders
                .iter()
                .all(|s| s.status == SubOrderStatus::Confirmed)
        );
        assert_eq!(h.orders().await, 1);
        assert_eq!(h.sub_orders().await, 2);
    }

    #[tokio::test]
    async fn failure_on_second_sub_order_persists_nothing() {
        let h = TestHarness::new();
        h.fail_second_sub_order();

        let err = into_commit_error(
            h.service
                .checkout(h.cart(true, Some("cart-1")))
                .await
                .unwrap_err(),
        );

        match err {
            CommitError::Aborted { vendor_id, .. } => {
                assert_eq!(vendor_id, Some(VendorId::new("vendor-b")));
            }
            other => panic!("expected abort, got {other:?}"),
        }
        assert!(h.store.is_empty().await);
        assert_eq!(h.publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn aborted_commit_can_be_retried_with_same_key() {
        let h = TestHarness::new();
        h.fail_second_sub_order();

        h.service
            .checkout(h.cart(true, Some("cart-1")))
            .await
            .unwrap_err();
        let result = h
            .service
            .checkout(h.cart(true, Some("cart-1")))
            .await
            .unwrap();

        assert_eq!(result.status, OrderStatus::Committed);
        assert_eq!(h.orders().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_opening_transaction_is_retried() {
        let h = TestHarness::new();
        h.store.fail_next_begins(1);

        let result = h.service.checkout(h.cart(true, None)).await.unwrap();

        assert_eq!(result.status, OrderStatus::Committed);
        assert_eq!(h.sub_orders().await, 2);
    }

    #[tokio::test]
    async fn transient_failure_after_a_write_is_not_retried() {
        let h = TestHarness::with_config(CommitConfig {
            retry: RetryPolicy {
                max_attempts: 5,
                ..RetryPolicy::default()
            },
            ..CommitConfig::default()
        });
        h.store
            .inject_failure(FailPoint::new("sub_orders", 2, InjectedFailure::Transient));

        let err = into_commit_error(h.service.checkout(h.cart(true, None)).await.unwrap_err());

        assert!(matches!(err, CommitError::Aborted { .. }));
        assert!(h.store.is_empty().await);
    }
}

mod non_atomic {
    use super::*;

    #[tokio::test]
    async fn failure_on_second_sub_order_yields_partial() {
        let h = TestHarness::new();
        h.fail_second_sub_order();

        let err = into_commit_error(h.service.checkout(h.cart(false, None)).await.unwrap_err());
        let result = err.partial_result().unwrap().clone();

        assert_eq!(result.status, OrderStatus::Partial);
        assert_eq!(result.failed_vendors().count(), 1);
        assert_eq!(h.orders().await, 1);
        assert_eq!(h.sub_orders().await, 1);

        let stored = h.service.get_order(result.order_id).await.unwrap().unwrap();
        assert_eq!(stored.record.status, OrderStatus::Partial);
        assert_eq!(stored.sub_orders.len(), 1);
        let failed = stored
            .record
            .sub_orders
            .iter()
            .find(|s| s.status == SubOrderStatus::Failed)
            .unwrap();
        assert!(failed.failure.as_deref().unwrap().contains("injected failure"));
    }

    #[tokio::test]
    async fn partial_order_is_published() {
        let h = TestHarness::new();
        h.fail_second_sub_order();

        h.service
            .checkout(h.cart(false, None))
            .await
            .unwrap_err();

        let published = h.publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].order.status(), OrderStatus::Partial);
    }

    #[tokio::test]
    async fn failed_parent_write_removes_sub_orders_and_allows_retry() {
        let h = TestHarness::new();
        h.store
            .inject_failure(FailPoint::new("orders", 1, InjectedFailure::Rejected));

        let err = into_commit_error(
            h.service
                .checkout(h.cart(false, Some("cart-9")))
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, CommitError::Aborted { vendor_id: None, .. }));
        assert_eq!(h.orders().await, 0);
        assert_eq!(h.sub_orders().await, 0);

        let retried = h
            .service
            .checkout(h.cart(false, Some("cart-9")))
            .await
            .unwrap();

        assert_eq!(retried.status, OrderStatus::Committed);
        assert_eq!(h.orders().await, 1);
        assert_eq!(h.sub_orders().await, 2);
    }

    #[tokio::test]
    async fn orphaned_sub_order_blocks_retry_with_same_key() {
        let h = TestHarness::with_config(CommitConfig {
            idempotency_wait: Duration::from_millis(50),
            idempotency_poll: Duration::from_millis(10),
            ..CommitConfig::default()
        });
        h.store
            .inject_failure(FailPoint::new("orders", 1, InjectedFailure::Rejected));
        h.store
            .inject_failure(FailPoint::new("sub_orders", 3, InjectedFailure::Rejected));

        let err = into_commit_error(
            h.service
                .checkout(h.cart(false, Some("cart-9")))
                .await
                .unwrap_err(),
        );
        assert!(matches!(err, CommitError::Orphaned { .. }));

        let retry = into_commit_error(
            h.service
                .checkout(h.cart(false, Some("cart-9")))
                .await
                .unwrap_err(),
        );

        assert!(matches!(retry, CommitError::InProgress { .. }));
        assert_eq!(h.orders().await, 0);
        assert_eq!(h.sub_orders().await, 1);
    }

    #[tokio::test]
    async fn partial_replay_reports_partial_again() {
        let h = TestHarness::new();
        h.fail_second_sub_order();

        let first = into_commit_error(
            h.service
                .checkout(h.cart(false, Some("cart-7")))
                .await
                .unwrap_err(),
        );
        let second = into_commit_error(
            h.service
                .checkout(h.cart(false, Some("cart-7")))
                .await
                .unwrap_err(),
        );

        assert_eq!(first.partial_result(), second.partial_result());
        assert_eq!(h.orders().await, 1);
    }
}

mod idempotency {
    use super::*;

    #[tokio::test]
    async fn same_sync_cart_id_replays_result() {
        let h = TestHarness::new();

        let first = h
            .service
            .checkout(h.cart(true, Some("cart-42")))
            .await
            .unwrap();
        let second = h
            .service
            .checkout(h.cart(true, Some("cart-42")))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(h.orders().await, 1);
        assert_eq!(h.publisher.published_count(), 1);
    }

    #[tokio::test]
    async fn reused_key_with_different_cart_conflicts() {
        let h = TestHarness::new();
        h.service
            .checkout(h.cart(true, Some("cart-42")))
            .await
            .unwrap();

        let mut changed = h.cart(true, Some("cart-42"));
        changed.delivery_fee = Some(json!(20));
        let err = into_commit_error(h.service.checkout(changed).await.unwrap_err());

        assert!(matches!(err, CommitError::Conflict { ref key } if key == "cart-42"));
        assert_eq!(h.orders().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_commits_with_same_key_create_one_order() {
        let h = TestHarness::new();
        h.store.set_write_latency(Some(Duration::from_millis(20)));

        let (a, b) = tokio::join!(
            h.service.checkout(h.cart(true, Some("cart-9"))),
            h.service.checkout(h.cart(true, Some("cart-9"))),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(h.orders().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_for_in_flight_commit_times_out() {
        let h = TestHarness::with_config(CommitConfig {
            idempotency_wait: Duration::from_millis(50),
            ..CommitConfig::default()
        });
        h.store.set_write_latency(Some(Duration::from_millis(500)));

        let (a, b) = tokio::join!(
            h.service.checkout(h.cart(true, Some("cart-9"))),
            async {
                tokio::time::sleep(Duration::from_millis(600)).await;
                h.service.checkout(h.cart(true, Some("cart-9"))).await
            },
        );

        assert!(a.is_ok());
        let err = into_commit_error(b.unwrap_err());
        assert!(matches!(err, CommitError::InProgress { .. }));
    }
}

mod cancellation {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn dropping_the_caller_does_not_interrupt_commit() {
        let h = TestHarness::new();
        h.store.set_write_latency(Some(Duration::from_millis(100)));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), h.service.checkout(h.cart(true, None)))
                .await;
        assert!(cancelled.is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.orders().await, 1);
        assert_eq!(h.sub_orders().await, 2);
    }
}

mod pipeline {
    use super::*;

    #[tokio::test]
    async fn invalid_cart_writes_nothing() {
        let h = TestHarness::new();
        let mut cart = h.cart(true, None);
        cart.recipient_name = None;

        let err = h.service.checkout(cart).await.unwrap_err();

        match err {
            CheckoutError::Validation(err) => assert!(err.has_violation("recipientName")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn unknown_product_writes_nothing() {
        let h = TestHarness::new();
        let mut cart = h.cart(true, None);
        cart.items = Some(vec![RawCartItem::new("GHOST", "vendor-a", 1)]);

        let err = h.service.checkout(cart).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Compose(_)));
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn publisher_failure_does_not_change_outcome() {
        let h = TestHarness::new();
        h.publisher.set_fail_on_publish(true);

        let result = h.service.checkout(h.cart(true, None)).await.unwrap();

        assert_eq!(result.status, OrderStatus::Committed);
        assert_eq!(h.orders().await, 1);
        assert_eq!(h.publisher.published_count(), 0);
    }

    #[tokio::test]
    async fn get_order_returns_sub_orders() {
        let h = TestHarness::new();
        let result = h.service.checkout(h.cart(true, None)).await.unwrap();

        let stored = h.service.get_order(result.order_id).await.unwrap().unwrap();

        assert_eq!(stored.record.to_result(), result);
        assert_eq!(stored.sub_orders.len(), 2);
        let vendor_a = stored
            .sub_orders
            .iter()
            .find(|s| s.vendor_id() == &VendorId::new("vendor-a"))
            .unwrap();
        assert_eq!(vendor_a.lines().len(), 2);
    }
}
