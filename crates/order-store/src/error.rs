use thiserror::Error;

use crate::{DocumentKey, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write precondition failed. The document was created or modified
    /// by someone else since it was read.
    #[error("Write conflict on {key}: expected version {expected}, found {actual}")]
    Conflict {
        key: DocumentKey,
        expected: Version,
        actual: Version,
    },

    /// The document does not exist.
    #[error("Document not found: {0}")]
    NotFound(DocumentKey),

    /// A temporary failure (timeout, contention). Safe to retry if nothing
    /// has been written yet.
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// The store refused the write permanently.
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// A document was built without one of its required fields.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true when the failure is temporary and the operation may be
    /// attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transient(_) => true,
            StoreError::Database(sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => true,
            StoreError::Database(sqlx::Error::Database(db_err)) => {
                // serialization_failure, deadlock_detected
                matches!(db_err.code().as_deref(), Some("40001" | "40P01"))
            }
            _ => false,
        }
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
