//! Transactional document store used by the checkout commit coordinator.
//!
//! Documents are JSON payloads addressed by `(collection, key)` and carry a
//! version for optimistic concurrency. Writing with
//! [`WriteOptions::expect_new`] acts as a uniqueness constraint, and a
//! [`StoreTransaction`] makes a group of writes visible all at once or not at
//! all.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use document::{Document, DocumentBuilder, DocumentKey, StoredDocument, Version};
pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryDocumentStore, InjectedFailure};
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt, StoreTransaction, WriteOptions};
