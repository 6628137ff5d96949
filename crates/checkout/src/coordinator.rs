//! Commit coordinator for multi-vendor order plans.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use common::OrderId;
use domain::{Order, OrderPlan, OrderStatus, VendorId, VendorSubOrder};
use futures_util::future::join_all;
use order_store::{
    Document, DocumentStore, DocumentStoreExt, StoreError, StoreTransaction, Version, WriteOptions,
};

use crate::error::{CommitError, Result};
use crate::idempotency::{Claim, ClaimedKey, IdempotencyKeys};
use crate::publisher::{OrderCommitted, OrderPublisher};
use crate::records::{self, ORDERS, OrderRecord, SUB_ORDERS, sub_order_key};
use crate::result::CommitResult;
use crate::retry::{RetryPolicy, retry_transient};

/// Tuning for the commit protocol.
#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Retries for transient failures before anything has been written.
    pub retry: RetryPolicy,
    /// How long to wait for another commit holding the same idempotency key.
    pub idempotency_wait: Duration,
    /// First polling interval while waiting. Doubles up to one second.
    pub idempotency_poll: Duration,
    /// Age after which an in-flight claim is considered abandoned.
    pub idempotency_lease: Duration,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            idempotency_wait: Duration::from_secs(5),
            idempotency_poll: Duration::from_millis(25),
            idempotency_lease: Duration::from_secs(60),
        }
    }
}

/// A persisted order with the sub-orders that were written for it.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub record: OrderRecord,
    pub sub_orders: Vec<VendorSubOrder>,
}

/// First write failure of an atomic attempt.
struct AttemptFailure {
    vendor_id: Option<VendorId>,
    cause: StoreError,
    /// A write was accepted earlier in the same attempt.
    wrote: bool,
}

impl AttemptFailure {
    fn is_retryable(&self) -> bool {
        !self.wrote && self.cause.is_transient()
    }
}

/// Executes order plans against a transactional document store.
///
/// Atomic plans are written in a single store transaction: every sub-order,
/// the parent order and the idempotency record become visible together or
/// not at all. Non-atomic plans write each sub-order independently and
/// record the outcome on the parent. If the parent cannot be written, the
/// sub-orders are deleted again.
///
/// Commits run on a detached task. Dropping the future returned by
/// [`commit`](Self::commit) does not interrupt a commit in progress.
pub struct CommitCoordinator<S, P> {
    inner: Arc<Inner<S, P>>,
}

struct Inner<S, P> {
    store: S,
    publisher: P,
    config: CommitConfig,
}

impl<S, P> Clone for CommitCoordinator<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, P> CommitCoordinator<S, P>
where
    S: DocumentStore + 'static,
    P: OrderPublisher + 'static,
{
    /// Creates a coordinator with the default configuration.
    pub fn new(store: S, publisher: P) -> Self {
        Self::with_config(store, publisher, CommitConfig::default())
    }

    pub fn with_config(store: S, publisher: P, config: CommitConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                publisher,
                config,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn publisher(&self) -> &P {
        &self.inner.publisher
    }

    pub fn config(&self) -> &CommitConfig {
        &self.inner.config
    }

    /// Commits a plan.
    ///
    /// Returns `Err(CommitError::PartialCommit)` when a non-atomic plan was
    /// only partly persisted; the error carries the per-vendor result.
    pub async fn commit(&self, plan: OrderPlan) -> Result<CommitResult> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run(plan).await })
            .await
            .map_err(|e| CommitError::TaskFailed(e.to_string()))?
    }

    /// Loads a persisted order and its written sub-orders.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>> {
        let store = &self.inner.store;
        let Some((record, _)) = store
            .get_as::<OrderRecord>(ORDERS, &order_id.to_string())
            .await?
        else {
            return Ok(None);
        };

        let mut sub_orders = Vec::new();
        for vendor_id in record.confirmed_vendors() {
            let key = sub_order_key(order_id, vendor_id);
            match store.get_as::<VendorSubOrder>(SUB_ORDERS, &key).await? {
                Some((sub_order, _)) => sub_orders.push(sub_order),
                None => tracing::warn!(%order_id, %vendor_id, "confirmed sub-order document missing"),
            }
        }

        Ok(Some(StoredOrder { record, sub_orders }))
    }
}

impl<S: DocumentStore, P: OrderPublisher> Inner<S, P> {
    #[tracing::instrument(
        skip(self, plan),
        fields(
            atomic = plan.is_atomic(),
            vendors = plan.sub_orders().len(),
            idempotency_key = plan.idempotency_key()
        )
    )]
    async fn run(&self, plan: OrderPlan) -> Result<CommitResult> {
        metrics::counter!("checkout_commits_total").increment(1);
        let started = Instant::now();

        let order_id = OrderId::new();
        let keys = IdempotencyKeys::new(&self.store, &self.config);

        let claimed = match plan.idempotency_key() {
            Some(key) => match keys.claim(key, plan.request_digest(), order_id).await? {
                Claim::Acquired(claimed) => Some(claimed),
                Claim::Replay(result) => {
                    metrics::counter!("checkout_commit_replayed_total").increment(1);
                    tracing::info!(order_id = %result.order_id, status = %result.status, "replaying recorded commit");
                    return outcome(result);
                }
            },
            None => None,
        };

        let order = Order::draft(order_id, &plan, Utc::now());
        let committed = if plan.is_atomic() {
            self.commit_atomic(order, claimed.as_ref()).await
        } else {
            self.commit_independent(order, claimed.as_ref()).await
        };

        metrics::histogram!("checkout_commit_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match committed {
            Ok(committed) => outcome(self.finish(committed).await),
            Err(err) => {
                match &err {
                    CommitError::Orphaned { order_id, .. } => {
                        metrics::counter!("checkout_commit_orphaned_total").increment(1);
                        tracing::error!(%order_id, "commit failed, idempotency key kept claimed");
                    }
                    CommitError::Aborted {
                        order_id,
                        vendor_id,
                        cause,
                    } => {
                        metrics::counter!("checkout_commit_aborted_total").increment(1);
                        tracing::warn!(%order_id, vendor_id = ?vendor_id, error = %cause, "commit aborted");
                    }
                    _ => {}
                }
                let keep_claim = matches!(err, CommitError::Orphaned { .. });
                if let Some(claimed) = claimed.as_ref().filter(|_| !keep_claim) {
                    keys.release(claimed).await;
                }
                Err(err)
            }
        }
    }

    /// Writes every document of the order in one transaction.
    async fn commit_atomic(
        &self,
        mut draft: Order,
        claimed: Option<&ClaimedKey>,
    ) -> Result<(Order, CommitResult)> {
        let mut order = draft.clone();
        let vendors: Vec<VendorId> = order
            .sub_orders()
            .iter()
            .map(|s| s.vendor_id().clone())
            .collect();
        for vendor_id in &vendors {
            order.confirm_sub_order(vendor_id)?;
        }
        order.commit()?;

        let record = OrderRecord::from_order(&order, claimed.map(|c| c.key().to_string()), Utc::now());
        let result = record.to_result();

        let mut attempt = 1;
        loop {
            match self.write_atomic(&order, &record, &result, claimed).await {
                Ok(()) => return Ok((order, result)),
                Err(failure) if failure.is_retryable() && self.config.retry.allows_retry(attempt) => {
                    let delay = self.config.retry.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, error = %failure.cause, "transient failure before any write, retrying");
                    metrics::counter!("checkout_store_retries_total", "operation" => "atomic_commit")
                        .increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    draft.abort()?;
                    return Err(CommitError::Aborted {
                        order_id: draft.order_id(),
                        vendor_id: failure.vendor_id,
                        cause: failure.cause,
                    });
                }
            }
        }
    }

    async fn write_atomic(
        &self,
        order: &Order,
        record: &OrderRecord,
        result: &CommitResult,
        claimed: Option<&ClaimedKey>,
    ) -> std::result::Result<(), AttemptFailure> {
        let writes = atomic_write_set(order, record, result, claimed).map_err(|cause| AttemptFailure {
            vendor_id: None,
            cause,
            wrote: false,
        })?;

        let mut tx = self.store.begin().await.map_err(|cause| AttemptFailure {
            vendor_id: None,
            cause,
            wrote: false,
        })?;

        let mut wrote = false;
        for write in writes {
            if let Err(cause) = tx.put(write.document, write.options).await {
                rollback(tx).await;
                return Err(AttemptFailure {
                    vendor_id: write.vendor_id,
                    cause,
                    wrote,
                });
            }
            wrote = true;
        }

        tx.commit().await.map_err(|cause| AttemptFailure {
            vendor_id: None,
            cause,
            wrote,
        })
    }

    /// Writes each sub-order on its own, then records the outcome on the parent.
    async fn commit_independent(
        &self,
        mut order: Order,
        claimed: Option<&ClaimedKey>,
    ) -> Result<(Order, CommitResult)> {
        let mut documents = Vec::with_capacity(order.sub_orders().len());
        for sub_order in order.sub_orders() {
            let mut confirmed = sub_order.clone();
            confirmed.confirm()?;
            documents.push((
                sub_order.vendor_id().clone(),
                records::sub_order_document(&confirmed),
            ));
        }

        let writes = documents.into_iter().map(|(vendor_id, document)| async move {
            let written = match document {
                Ok(document) => self.store.put(document, WriteOptions::expect_new()).await,
                Err(err) => Err(err),
            };
            (vendor_id, written)
        });

        let mut persisted = Vec::new();
        let mut first_failure = None;
        for (vendor_id, written) in join_all(writes).await {
            match written {
                Ok(version) => {
                    order.confirm_sub_order(&vendor_id)?;
                    persisted.push((sub_order_key(order.order_id(), &vendor_id), version));
                }
                Err(cause) => {
                    tracing::warn!(%vendor_id, error = %cause, "sub-order write failed");
                    order.fail_sub_order(&vendor_id, cause.to_string())?;
                    first_failure.get_or_insert((vendor_id, cause));
                }
            }
        }

        if let (OrderStatus::Aborted, Some((vendor_id, cause))) = (order.settle()?, first_failure) {
            return Err(CommitError::Aborted {
                order_id: order.order_id(),
                vendor_id: Some(vendor_id),
                cause,
            });
        }

        let record = OrderRecord::from_order(&order, claimed.map(|c| c.key().to_string()), Utc::now());
        let result = record.to_result();

        let parent = retry_transient(&self.config.retry, "write_parent", || {
            self.write_parent(&record, &result, claimed)
        })
        .await;
        if let Err(cause) = parent {
            tracing::warn!(order_id = %order.order_id(), error = %cause, "parent order write failed, removing persisted sub-orders");
            let orphaned = self.remove_sub_orders(persisted).await;
            if !orphaned.is_empty() {
                tracing::error!(order_id = %order.order_id(), ?orphaned, "sub-orders left without a parent order");
                return Err(CommitError::Orphaned {
                    order_id: order.order_id(),
                    sub_orders: orphaned,
                    cause,
                });
            }
            return Err(CommitError::Aborted {
                order_id: order.order_id(),
                vendor_id: None,
                cause,
            });
        }

        Ok((order, result))
    }

    /// Deletes sub-orders written by this commit. Returns the keys that could
    /// not be deleted.
    async fn remove_sub_orders(&self, persisted: Vec<(String, Version)>) -> Vec<String> {
        let deletes = persisted.into_iter().map(|(key, version)| async move {
            let deleted = retry_transient(&self.config.retry, "remove_sub_order", || {
                self.store
                    .delete(SUB_ORDERS, &key, WriteOptions::expect_version(version))
            })
            .await;
            (key, deleted)
        });

        let mut orphaned = Vec::new();
        for (key, deleted) in join_all(deletes).await {
            if let Err(err) = deleted {
                tracing::warn!(%key, error = %err, "failed to remove sub-order");
                orphaned.push(key);
            }
        }
        orphaned
    }

    /// Writes the parent order and completes the idempotency claim together.
    async fn write_parent(
        &self,
        record: &OrderRecord,
        result: &CommitResult,
        claimed: Option<&ClaimedKey>,
    ) -> std::result::Result<(), StoreError> {
        let mut writes = vec![(record.to_document()?, WriteOptions::expect_new())];
        if let Some(claimed) = claimed {
            let completed = claimed.record.clone().completed(result.clone());
            writes.push((completed.to_document()?, claimed.write_options()));
        }

        let mut tx = self.store.begin().await?;
        for (document, options) in writes {
            if let Err(err) = tx.put(document, options).await {
                rollback(tx).await;
                return Err(err);
            }
        }
        tx.commit().await
    }

    /// Publishes the order and reports the commit.
    async fn finish(&self, (order, result): (Order, CommitResult)) -> CommitResult {
        match result.status {
            OrderStatus::Partial => {
                metrics::counter!("checkout_commit_partial_total").increment(1);
                tracing::warn!(
                    order_id = %result.order_id,
                    failed = result.failed_vendors().count(),
                    "order partially committed"
                );
            }
            _ => tracing::info!(
                order_id = %result.order_id,
                grand_total = %result.grand_total,
                "order committed"
            ),
        }

        let event = OrderCommitted {
            order,
            committed_at: result.committed_at,
        };
        if let Err(err) = self.publisher.publish(&event).await {
            metrics::counter!("checkout_publish_failures_total").increment(1);
            tracing::warn!(order_id = %result.order_id, error = %err, "failed to publish committed order");
        }

        result
    }
}

struct StagedWrite {
    vendor_id: Option<VendorId>,
    document: Document,
    options: WriteOptions,
}

/// Every document of an atomic commit, sub-orders first.
fn atomic_write_set(
    order: &Order,
    record: &OrderRecord,
    result: &CommitResult,
    claimed: Option<&ClaimedKey>,
) -> std::result::Result<Vec<StagedWrite>, StoreError> {
    let mut writes = Vec::with_capacity(order.sub_orders().len() + 2);
    for sub_order in order.sub_orders() {
        writes.push(StagedWrite {
            vendor_id: Some(sub_order.vendor_id().clone()),
            document: records::sub_order_document(sub_order)?,
            options: WriteOptions::expect_new(),
        });
    }
    writes.push(StagedWrite {
        vendor_id: None,
        document: record.to_document()?,
        options: WriteOptions::expect_new(),
    });
    if let Some(claimed) = claimed {
        let completed = claimed.record.clone().completed(result.clone());
        writes.push(StagedWrite {
            vendor_id: None,
            document: completed.to_document()?,
            options: claimed.write_options(),
        });
    }
    Ok(writes)
}

async fn rollback(tx: Box<dyn StoreTransaction>) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "rollback failed");
    }
}

fn outcome(result: CommitResult) -> Result<CommitResult> {
    if result.is_partial() {
        Err(CommitError::PartialCommit {
            result: Box::new(result),
        })
    } else {
        Ok(result)
    }
}
