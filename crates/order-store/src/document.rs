use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Version number of a stored document, used for optimistic concurrency.
///
/// A document that does not exist is at version 0. The first write produces
/// version 1 and every later write increments it by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version of a document that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version produced by the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Address of a document: its collection and its key within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub key: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.key)
    }
}

/// A document to be written.
///
/// The store assigns the version and write timestamp; see [`StoredDocument`]
/// for the persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Where the document lives.
    pub key: DocumentKey,

    /// The document body as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata (correlation ids, writer name).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Document {
    /// Creates a new document builder.
    pub fn builder() -> DocumentBuilder {
        DocumentBuilder::default()
    }
}

/// A document as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub key: DocumentKey,
    pub version: Version,
    pub written_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl StoredDocument {
    /// Deserializes the payload into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Builder for constructing documents.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    collection: Option<String>,
    key: Option<String>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl DocumentBuilder {
    /// Sets the collection.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets the key within the collection.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Builds the document, failing if collection, key or payload is missing
    /// or the collection/key is empty.
    pub fn build(self) -> Result<Document, StoreError> {
        let collection = self
            .collection
            .filter(|c| !c.is_empty())
            .ok_or_else(|| StoreError::InvalidDocument("collection is required".to_string()))?;
        let key = self
            .key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StoreError::InvalidDocument("key is required".to_string()))?;
        let payload = self
            .payload
            .ok_or_else(|| StoreError::InvalidDocument("payload is required".to_string()))?;

        Ok(Document {
            key: DocumentKey::new(collection, key),
            payload,
            metadata: self.metadata,
        })
    }

    /// Tries to build the document, returning None if required fields are missing.
    pub fn try_build(self) -> Option<Document> {
        self.build().ok()
    }
}
