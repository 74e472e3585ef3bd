//! Record storage.
//!
//! Records are JSON documents addressed by a `(namespace, index)` pair. The
//! namespace is fixed for this service, so its records cannot collide with
//! other data sharing the same backend.

mod memory;
mod spanner;

pub use memory::MemoryStore;
pub use spanner::SpannerStore;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

use crate::config::StoreBackend;

/// Data partition owned by this service
pub const NAMESPACE: &str = "zst";

/// Composite key of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    namespace: &'static str,
    index: String,
}

impl RecordKey {
    /// Builds a key in this service's namespace.
    ///
    /// Returns `None` for an empty index; such requests must never reach a store.
    pub fn new(index: impl Into<String>) -> Option<Self> {
        let index = index.into();
        if index.is_empty() {
            return None;
        }
        Some(Self {
            namespace: NAMESPACE,
            index,
        })
    }

    pub fn namespace(&self) -> &str {
        self.namespace
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.index)
    }
}

/// Point get/set over JSON records
///
/// Implementations must be safe to share across concurrent requests. A `set`
/// replaces whatever was stored under the key; there is no merge and no
/// version check.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the value stored under `key`, or `None` if nothing was ever written
    async fn get(&self, key: &RecordKey) -> Result<Option<JsonValue>>;

    /// Store `value` under `key`, overwriting any previous value
    async fn set(&self, key: &RecordKey, value: JsonValue) -> Result<()>;

    /// Cheap liveness check used by the health endpoint
    async fn health_check(&self) -> Result<()>;
}

/// Open the store selected by configuration
pub async fn connect(backend: &StoreBackend) -> Result<Arc<dyn RecordStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Spanner(config) => Ok(Arc::new(SpannerStore::from_config(config).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rejects_empty_index() {
        assert!(RecordKey::new("").is_none());
    }

    #[test]
    fn test_key_is_namespaced() {
        let key = RecordKey::new("42").unwrap();
        assert_eq!(key.namespace(), NAMESPACE);
        assert_eq!(key.index(), "42");
        assert_eq!(key.to_string(), "zst/42");
    }

    #[test]
    fn test_keys_with_same_index_are_equal() {
        assert_eq!(RecordKey::new("a"), RecordKey::new(String::from("a")));
        assert_ne!(RecordKey::new("a"), RecordKey::new("b"));
    }

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let store = connect(&StoreBackend::Memory).await.unwrap();
        let key = RecordKey::new("1").unwrap();
        store.set(&key, serde_json::json!([1, 2])).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(serde_json::json!([1, 2])));
    }
}
