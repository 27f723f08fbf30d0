//! Types for object store operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            key: key.into(),
            source,
        }
    }
}

/// Metadata about a stored object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Full object key, including its prefix.
    pub key: String,
    /// Object size in bytes.
    pub size_bytes: u64,
    /// When the object was last written.
    pub last_modified: DateTime<Utc>,
}

/// Event published by a store when an object is created or overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectCreated {
    /// Key of the new object.
    pub key: String,
    /// When the write completed.
    pub created_at: DateTime<Utc>,
}

/// Trait for object store backends.
///
/// Keys are `/`-separated paths relative to the store root; writers use the
/// fixed prefixes defined in this module. Writes replace any existing object
/// at the same key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name for logging/audit.
    fn name(&self) -> &str;

    /// Write an object, replacing any existing object at `key`.
    async fn put(&self, key: &str, data: &[u8]) -> Result<ObjectMeta, StoreError>;

    /// Read a whole object.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Metadata for a single object.
    async fn head(&self, key: &str) -> Result<ObjectMeta, StoreError>;

    /// List objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_meta_serialization() {
        let meta = ObjectMeta {
            key: "aggregated/part-000.jsonl".to_string(),
            size_bytes: 1024,
            last_modified: Utc::now(),
        };

        let json = serde_json::to_string(&meta).unwrap();
        let parsed: ObjectMeta = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.key, "aggregated/part-000.jsonl");
        assert_eq!(parsed.size_bytes, 1024);
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound("clean/missing".to_string());
        assert_eq!(err.to_string(), "object not found: clean/missing");

        let err = StoreError::InvalidKey("../escape".to_string());
        assert_eq!(err.to_string(), "invalid object key: ../escape");
    }
}
