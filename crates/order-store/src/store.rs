use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{Document, Result, StoredDocument, Version};

/// Preconditions for a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Version the document must currently be at.
    /// If None, the write is an unconditional upsert.
    pub expected_version: Option<Version>,
}

impl WriteOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the document to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the document not to exist.
    ///
    /// This is the store's uniqueness constraint: of several concurrent
    /// writers using it for the same key, exactly one succeeds.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A group of writes that become visible together or not at all.
///
/// Dropping a transaction without calling [`StoreTransaction::commit`]
/// discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Stages a write. Preconditions are checked against the committed state
    /// and against earlier writes of this transaction.
    ///
    /// Returns the version the document will have once committed.
    async fn put(&mut self, document: Document, options: WriteOptions) -> Result<Version>;

    /// Makes every staged write visible atomically.
    ///
    /// Fails with `Conflict` if a concurrent commit invalidated one of the
    /// preconditions, in which case nothing is applied.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged write.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Writes a single document outside of any transaction.
    ///
    /// Returns the new version of the document.
    async fn put(&self, document: Document, options: WriteOptions) -> Result<Version>;

    /// Retrieves a document, or None if it does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>>;

    /// Retrieves every document of a collection, oldest write first.
    async fn list(&self, collection: &str) -> Result<Vec<StoredDocument>>;

    /// Deletes a document.
    ///
    /// Returns false if it did not exist. With an expected version, fails
    /// with `Conflict` if the document is at another version.
    async fn delete(&self, collection: &str, key: &str, options: WriteOptions) -> Result<bool>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Loads a document and deserializes its payload.
    async fn get_as<T: DeserializeOwned + Send>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<(T, Version)>> {
        match self.get(collection, key).await? {
            Some(document) => Ok(Some((document.decode()?, document.version))),
            None => Ok(None),
        }
    }

    /// Gets the current version of a document, or None if it does not exist.
    async fn version_of(&self, collection: &str, key: &str) -> Result<Option<Version>> {
        Ok(self.get(collection, key).await?.map(|d| d.version))
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

