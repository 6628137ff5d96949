use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Document, DocumentKey, Result, StoreError, StoredDocument, Version,
    store::{DocumentStore, StoreTransaction, WriteOptions},
};

/// Kind of failure produced by a [`FailPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Fails with [`StoreError::Rejected`].
    Rejected,
    /// Fails with [`StoreError::Transient`].
    Transient,
}

impl InjectedFailure {
    fn to_error(self, key: &DocumentKey) -> StoreError {
        match self {
            InjectedFailure::Rejected => StoreError::Rejected(format!("injected failure on {key}")),
            InjectedFailure::Transient => {
                StoreError::Transient(format!("injected timeout on {key}"))
            }
        }
    }
}

/// Makes the n-th write (1-based) to a collection fail, counted from the
/// moment the fail point is installed. Deletes count as writes. Fires once.
#[derive(Debug, Clone)]
pub struct FailPoint {
    pub collection: String,
    pub nth: usize,
    pub failure: InjectedFailure,
}

impl FailPoint {
    pub fn new(collection: impl Into<String>, nth: usize, failure: InjectedFailure) -> Self {
        Self {
            collection: collection.into(),
            nth,
            failure,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    points: Vec<(FailPoint, usize)>,
    failing_begins: usize,
    latency: Option<Duration>,
}

impl Faults {
    /// Counts a write against the installed fail points and returns the
    /// error to produce, if any.
    fn on_write(&mut self, key: &DocumentKey) -> Option<StoreError> {
        let mut fired = None;
        for (index, (point, seen)) in self.points.iter_mut().enumerate() {
            if point.collection == key.collection {
                *seen += 1;
                if *seen == point.nth && fired.is_none() {
                    fired = Some((index, point.failure));
                }
            }
        }
        let (index, failure) = fired?;
        self.points.remove(index);
        Some(failure.to_error(key))
    }
}

type Documents = HashMap<DocumentKey, StoredDocument>;

/// In-memory document store for tests and local development.
///
/// Provides the same guarantees as the PostgreSQL implementation: writes
/// staged in a transaction are applied under a single write lock, after
/// every precondition has been re-checked, so readers see all of them or
/// none. Failures and latency can be injected to exercise the commit
/// coordinator's error paths.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Documents>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a fail point.
    pub fn inject_failure(&self, point: FailPoint) {
        self.lock_faults().points.push((point, 0));
    }

    /// Makes the next `times` calls to `begin` fail with a transient error.
    pub fn fail_next_begins(&self, times: usize) {
        self.lock_faults().failing_begins = times;
    }

    /// Delays every write by `latency`.
    pub fn set_write_latency(&self, latency: Option<Duration>) {
        self.lock_faults().latency = latency;
    }

    /// Removes every fail point and latency setting.
    pub fn clear_faults(&self) {
        *self.lock_faults() = Faults::default();
    }

    /// Returns the number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|k| k.collection == collection)
            .count()
    }

    /// Returns the total number of documents stored.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns true if the store holds no documents.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        // A panicking test thread cannot leave the fault table half-updated.
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Counts the write for fault injection and applies configured latency.
    async fn before_write(&self, key: &DocumentKey) -> Result<()> {
        let (failure, latency) = {
            let mut faults = self.lock_faults();
            (faults.on_write(key), faults.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn current_version(documents: &Documents, key: &DocumentKey) -> Version {
    documents
        .get(key)
        .map(|d| d.version)
        .unwrap_or(Version::initial())
}

fn check_precondition(key: &DocumentKey, current: Version, options: WriteOptions) -> Result<()> {
    if let Some(expected) = options.expected_version
        && current != expected
    {
        return Err(StoreError::Conflict {
            key: key.clone(),
            expected,
            actual: current,
        });
    }
    Ok(())
}

fn apply(documents: &mut Documents, document: Document, version: Version) {
    let stored = StoredDocument {
        key: document.key.clone(),
        version,
        written_at: Utc::now(),
        payload: document.payload,
        metadata: document.metadata,
    };
    documents.insert(document.key, stored);
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        {
            let mut faults = self.lock_faults();
            if faults.failing_begins > 0 {
                faults.failing_begins -= 1;
                return Err(StoreError::Transient(
                    "injected failure opening transaction".to_string(),
                ));
            }
        }

        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            staged: Vec::new(),
        }))
    }

    async fn put(&self, document: Document, options: WriteOptions) -> Result<Version> {
        self.before_write(&document.key).await?;

        let mut documents = self.documents.write().await;
        let current = current_version(&documents, &document.key);
        check_precondition(&document.key, current, options)?;

        let version = current.next();
        apply(&mut documents, document, version);
        Ok(version)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>> {
        let documents = self.documents.read().await;
        Ok(documents.get(&DocumentKey::new(collection, key)).cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let documents = self.documents.read().await;
        let mut found: Vec<_> = documents
            .values()
            .filter(|d| d.key.collection == collection)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.written_at.cmp(&b.written_at).then(a.key.cmp(&b.key)));
        Ok(found)
    }

    async fn delete(&self, collection: &str, key: &str, options: WriteOptions) -> Result<bool> {
        let key = DocumentKey::new(collection, key);
        self.before_write(&key).await?;
        let mut documents = self.documents.write().await;
        let current = current_version(&documents, &key);
        if current == Version::initial() {
            return Ok(false);
        }
        check_precondition(&key, current, options)?;
        documents.remove(&key);
        Ok(true)
    }
}

struct InMemoryTransaction {
    store: InMemoryDocumentStore,
    staged: Vec<(Document, WriteOptions)>,
}

impl InMemoryTransaction {
    /// Version a key will have given the committed state plus earlier
    /// staged writes of this transaction.
    fn staged_version(&self, committed: Version, key: &DocumentKey) -> Version {
        let staged = self.staged.iter().filter(|(d, _)| &d.key == key).count();
        Version::new(committed.as_i64() + staged as i64)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn put(&mut self, document: Document, options: WriteOptions) -> Result<Version> {
        self.store.before_write(&document.key).await?;

        let committed = {
            let documents = self.store.documents.read().await;
            current_version(&documents, &document.key)
        };
        let current = self.staged_version(committed, &document.key);
        check_precondition(&document.key, current, options)?;

        self.staged.push((document, options));
        Ok(current.next())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTransaction { store, staged } = *self;
        let mut documents = store.documents.write().await;

        // Re-check every precondition under the write lock so a concurrent
        // commit that got there first turns into a conflict, not a lost write.
        let mut versions: HashMap<DocumentKey, Version> = HashMap::new();
        let mut planned = Vec::with_capacity(staged.len());
        for (document, options) in &staged {
            let current = versions
                .get(&document.key)
                .copied()
                .unwrap_or_else(|| current_version(&documents, &document.key));
            check_precondition(&document.key, current, *options)?;
            versions.insert(document.key.clone(), current.next());
            planned.push(current.next());
        }

        let writes = planned.len();
        for ((document, _), version) in staged.into_iter().zip(planned) {
            apply(&mut documents, document, version);
        }

        tracing::trace!(writes, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::trace!(writes = self.staged.len(), "in-memory transaction rolled back");
        Ok(())
    }
}
