//! In-memory Order Record Store for tests and the seed-test harness.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use tokio::sync::RwLock;

use crate::error::{OrderRecordError, Result};
use crate::status::OrderStatus;
use crate::store::OrderRecordStore;

/// `RwLock`-guarded map, mirroring [`saga_store::InMemorySagaStateStore`].
#[derive(Clone, Default)]
pub struct InMemoryOrderRecordStore {
    rows: Arc<RwLock<HashMap<OrderId, OrderStatus>>>,
}

impl InMemoryOrderRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRecordStore for InMemoryOrderRecordStore {
    async fn create(&self, order_id: OrderId) -> Result<()> {
        self.rows.write().await.entry(order_id).or_insert(OrderStatus::Pending);
        Ok(())
    }

    async fn status(&self, order_id: OrderId) -> Result<Option<OrderStatus>> {
        Ok(self.rows.read().await.get(&order_id).copied())
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        let mut rows = self.rows.write().await;
        let current = rows.get(&order_id).copied().unwrap_or(OrderStatus::Pending);
        if current == status {
            return Ok(());
        }
        if current.is_terminal() && !status.is_terminal() {
            return Err(OrderRecordError::NonMonotonicTransition {
                order_id,
                current: current.as_str(),
                attempted: status.as_str(),
            });
        }
        rows.insert(order_id, status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_status_roundtrips() {
        let store = InMemoryOrderRecordStore::new();
        let order_id = OrderId::new();
        store.create(order_id).await.unwrap();
        assert_eq!(store.status(order_id).await.unwrap(), Some(OrderStatus::Pending));
    }

    #[tokio::test]
    async fn create_is_idempotent_and_does_not_reset_status() {
        let store = InMemoryOrderRecordStore::new();
        let order_id = OrderId::new();
        store.create(order_id).await.unwrap();
        store.set_status(order_id, OrderStatus::Completed).await.unwrap();
        store.create(order_id).await.unwrap();
        assert_eq!(store.status(order_id).await.unwrap(), Some(OrderStatus::Completed));
    }

    #[tokio::test]
    async fn terminal_status_cannot_be_overwritten_by_pending() {
        let store = InMemoryOrderRecordStore::new();
        let order_id = OrderId::new();
        store.create(order_id).await.unwrap();
        store.set_status(order_id, OrderStatus::Cancelled).await.unwrap();

        let err = store.set_status(order_id, OrderStatus::Pending).await.unwrap_err();
        assert!(matches!(err, OrderRecordError::NonMonotonicTransition { .. }));
        assert_eq!(store.status(order_id).await.unwrap(), Some(OrderStatus::Cancelled));
    }

    #[tokio::test]
    async fn writing_the_same_terminal_status_twice_is_a_noop() {
        let store = InMemoryOrderRecordStore::new();
        let order_id = OrderId::new();
        store.create(order_id).await.unwrap();
        store.set_status(order_id, OrderStatus::Failed).await.unwrap();
        store.set_status(order_id, OrderStatus::Failed).await.unwrap();
        assert_eq!(store.status(order_id).await.unwrap(), Some(OrderStatus::Failed));
    }

    #[tokio::test]
    async fn status_of_unknown_order_is_none() {
        let store = InMemoryOrderRecordStore::new();
        assert_eq!(store.status(OrderId::new()).await.unwrap(), None);
    }
}
