//! Idempotency-key claims.
//!
//! A commit with a `syncCartId` first inserts an in-flight record under that
//! key with a uniqueness precondition. Exactly one concurrent commit wins the
//! insert; the others wait for its outcome and replay it.

use std::time::Duration;

use chrono::Utc;
use common::OrderId;
use order_store::{DocumentStore, DocumentStoreExt, StoreError, Version, WriteOptions};
use tokio::time::Instant;

use crate::coordinator::CommitConfig;
use crate::error::{CommitError, Result};
use crate::records::{IDEMPOTENCY_KEYS, IdempotencyRecord, IdempotencyState};
use crate::result::CommitResult;
use crate::retry::retry_transient;

/// A key this commit owns, and the version its claim was written at.
#[derive(Debug, Clone)]
pub(crate) struct ClaimedKey {
    pub record: IdempotencyRecord,
    pub version: Version,
}

impl ClaimedKey {
    pub fn key(&self) -> &str {
        &self.record.key
    }

    /// Precondition for replacing the claim: nobody took it over meanwhile.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions::expect_version(self.version)
    }
}

pub(crate) enum Claim {
    Acquired(ClaimedKey),
    Replay(CommitResult),
}

pub(crate) struct IdempotencyKeys<'a, S> {
    store: &'a S,
    config: &'a CommitConfig,
}

impl<'a, S: DocumentStore> IdempotencyKeys<'a, S> {
    pub fn new(store: &'a S, config: &'a CommitConfig) -> Self {
        Self { store, config }
    }

    /// Claims `key` for `order_id`, or returns the outcome of the commit that
    /// already owns it.
    ///
    /// Waits for an in-flight owner up to the configured wait, polling with
    /// backoff. Claims older than the lease are taken over.
    pub async fn claim(&self, key: &str, request_digest: &str, order_id: OrderId) -> Result<Claim> {
        let store = self.store;
        let deadline = Instant::now() + self.config.idempotency_wait;
        let mut poll = self.config.idempotency_poll;

        loop {
            let record = IdempotencyRecord::in_flight(key, request_digest, order_id);
            let document = record.to_document()?;
            let inserted = retry_transient(&self.config.retry, "claim_idempotency_key", || {
                store.put(document.clone(), WriteOptions::expect_new())
            })
            .await;

            match inserted {
                Ok(version) => return Ok(Claim::Acquired(ClaimedKey { record, version })),
                Err(StoreError::Conflict { .. }) => {}
                Err(err) => return Err(err.into()),
            }

            let existing = retry_transient(&self.config.retry, "read_idempotency_key", || {
                store.get_as::<IdempotencyRecord>(IDEMPOTENCY_KEYS, key)
            })
            .await?;

            if let Some((existing, version)) = existing {
                // A retried insert whose first attempt did commit.
                if existing.order_id == order_id
                    && matches!(existing.state, IdempotencyState::InFlight)
                {
                    return Ok(Claim::Acquired(ClaimedKey {
                        record: existing,
                        version,
                    }));
                }

                let abandoned = self.is_abandoned(&existing);
                if existing.request_digest != request_digest {
                    return Err(CommitError::Conflict {
                        key: key.to_string(),
                    });
                }

                match existing.state {
                    IdempotencyState::Completed { result } => return Ok(Claim::Replay(result)),
                    IdempotencyState::InFlight if abandoned => {
                        if let Some(claimed) = self.take_over(record, version).await? {
                            tracing::warn!(
                                key,
                                previous_order_id = %existing.order_id,
                                "took over abandoned idempotency claim"
                            );
                            return Ok(Claim::Acquired(claimed));
                        }
                    }
                    IdempotencyState::InFlight => {}
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CommitError::InProgress {
                    key: key.to_string(),
                });
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
            poll = (poll * 2).min(Duration::from_secs(1));
        }
    }

    /// Deletes a claim so the caller can retry after an aborted commit.
    /// Failures are logged, never returned.
    pub async fn release(&self, claimed: &ClaimedKey) {
        match self
            .store
            .delete(IDEMPOTENCY_KEYS, claimed.key(), claimed.write_options())
            .await
        {
            Ok(_) => tracing::debug!(key = claimed.key(), "idempotency claim released"),
            Err(err) => tracing::warn!(
                key = claimed.key(),
                error = %err,
                "failed to release idempotency claim"
            ),
        }
    }

    fn is_abandoned(&self, record: &IdempotencyRecord) -> bool {
        (Utc::now() - record.claimed_at)
            .to_std()
            .is_ok_and(|age| age > self.config.idempotency_lease)
    }

    async fn take_over(
        &self,
        record: IdempotencyRecord,
        version: Version,
    ) -> Result<Option<ClaimedKey>> {
        let written = self
            .store
            .put(record.to_document()?, WriteOptions::expect_version(version))
            .await;

        match written {
            Ok(version) => Ok(Some(ClaimedKey { record, version })),
            Err(StoreError::Conflict { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use order_store::InMemoryDocumentStore;

    fn config() -> CommitConfig {
        CommitConfig {
            idempotency_wait: Duration::from_millis(200),
            idempotency_poll: Duration::from_millis(10),
            ..CommitConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_claim_wins() {
        let store = InMemoryDocumentStore::new();
        let config = config();
        let keys = IdempotencyKeys::new(&store, &config);

        let claim = keys.claim("cart-1", "digest", OrderId::new()).await.unwrap();
        assert!(matches!(claim, Claim::Acquired(ref c) if c.version == Version::first()));
        assert_eq!(store.count(IDEMPOTENCY_KEYS).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_digest_conflicts() {
        let store = InMemoryDocumentStore::new();
        let config = config();
        let keys = IdempotencyKeys::new(&store, &config);

        keys.claim("cart-1", "digest-a", OrderId::new()).await.unwrap();
        let err = keys
            .claim("cart-1", "digest-b", OrderId::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CommitError::Conflict { ref key } if key == "cart-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_claim_times_out() {
        let store = InMemoryDocumentStore::new();
        let config = config();
        let keys = IdempotencyKeys::new(&store, &config);

        keys.claim("cart-1", "digest", OrderId::new()).await.unwrap();
        let err = keys
            .claim("cart-1", "digest", OrderId::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CommitError::InProgress { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_claim_can_be_reclaimed() {
        let store = InMemoryDocumentStore::new();
        let config = config();
        let keys = IdempotencyKeys::new(&store, &config);

        let Claim::Acquired(first) = keys.claim("cart-1", "digest", OrderId::new()).await.unwrap()
        else {
            panic!("expected to acquire the key");
        };
        keys.release(&first).await;
        assert_eq!(store.count(IDEMPOTENCY_KEYS).await, 0);

        let again = keys.claim("cart-1", "digest", OrderId::new()).await.unwrap();
        assert!(matches!(again, Claim::Acquired(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_committed_claim_is_recognised() {
        let store = InMemoryDocumentStore::new();
        let config = config();
        let keys = IdempotencyKeys::new(&store, &config);
        let order_id = OrderId::new();
        let own = IdempotencyRecord::in_flight("cart-1", "digest", order_id);
        store
            .put(own.to_document().unwrap(), WriteOptions::expect_new())
            .await
            .unwrap();

        let Claim::Acquired(claimed) = keys.claim("cart-1", "digest", order_id).await.unwrap()
        else {
            panic!("expected the existing claim to be ours");
        };
        assert_eq!(claimed.version, Version::first());
        assert_eq!(claimed.record, own);
    }

    #[tokio::test]
    async fn test_abandoned_claim_is_taken_over() {
        let store = InMemoryDocumentStore::new();
        let config = config();
        let keys = IdempotencyKeys::new(&store, &config);

        let mut stale = IdempotencyRecord::in_flight("cart-1", "digest", OrderId::new());
        stale.claimed_at = Utc::now() - ChronoDuration::hours(1);
        store
            .put(stale.to_document().unwrap(), WriteOptions::expect_new())
            .await
            .unwrap();

        let order_id = OrderId::new();
        let Claim::Acquired(claimed) = keys.claim("cart-1", "digest", order_id).await.unwrap()
        else {
            panic!("expected takeover");
        };
        assert_eq!(claimed.version, Version::new(2));
        assert_eq!(claimed.record.order_id, order_id);
    }
}
