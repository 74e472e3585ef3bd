use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RecordKey, RecordStore};

/// Process-local record store
///
/// Backs local development (`STORE_BACKEND=memory`) and the handler tests.
/// Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<JsonValue>> {
        let value = self.records.read().await.get(key).cloned();
        tracing::debug!("Read record {} (found: {})", key, value.is_some());
        Ok(value)
    }

    async fn set(&self, key: &RecordKey, value: JsonValue) -> Result<()> {
        self.records.write().await.insert(key.clone(), value);
        tracing::debug!("Stored record {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
