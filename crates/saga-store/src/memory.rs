//! In-memory Saga State Store for tests and the seed-test harness.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::SagaId;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::record::SagaRecord;
use crate::store::{Expected, SagaStateStore};

/// `RwLock`-guarded map, mirroring the teacher's `InMemoryEventStore` shape.
#[derive(Clone, Default)]
pub struct InMemorySagaStateStore {
    rows: Arc<RwLock<HashMap<SagaId, SagaRecord>>>,
}

impl InMemorySagaStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of sagas currently persisted (terminal sagas are
    /// deleted, so this reflects in-flight sagas only).
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SagaStateStore for InMemorySagaStateStore {
    async fn create(&self, record: SagaRecord) -> Result<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.saga_id) {
            return Err(StoreError::AlreadyExists(record.saga_id));
        }
        rows.insert(record.saga_id, record);
        Ok(())
    }

    async fn load(&self, saga_id: &SagaId) -> Result<Option<SagaRecord>> {
        Ok(self.rows.read().await.get(saga_id).cloned())
    }

    async fn update(&self, record: SagaRecord, expected: Expected) -> Result<()> {
        let mut rows = self.rows.write().await;
        match rows.get(&record.saga_id) {
            None => return Err(StoreError::AlreadyExists(record.saga_id)),
            Some(current) => {
                if let Expected::Updated(expected_updated_at) = expected
                    && current.updated_at != expected_updated_at
                {
                    return Err(StoreError::ConcurrencyConflict(record.saga_id));
                }
            }
        }
        rows.insert(record.saga_id, record);
        Ok(())
    }

    async fn delete(&self, saga_id: &SagaId) -> Result<()> {
        self.rows.write().await.remove(saga_id);
        Ok(())
    }
}
