//! The `SagaStateStore` trait: transactional single-row upsert keyed by `saga_id` (§2, §5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaId;

use crate::error::Result;
use crate::record::SagaRecord;

/// What the caller expects the stored row's `updated_at` to be, used for
/// optimistic-concurrency checks on update. See design note "Single-writer
/// discipline for Saga State": retry-on-conflict is acceptable.
#[derive(Debug, Clone, Copy)]
pub enum Expected {
    /// No row should exist yet.
    New,
    /// The caller last observed this `updated_at` when it loaded the row.
    Updated(DateTime<Utc>),
}

/// Durable key-value store for Saga State rows, single-writer per update.
#[async_trait]
pub trait SagaStateStore: Send + Sync {
    /// Creates a new row. Fails with `StoreError::AlreadyExists` if one
    /// already exists for `record.saga_id`.
    async fn create(&self, record: SagaRecord) -> Result<()>;

    /// Loads a row by id, or `None` if absent (sagas are deleted on
    /// terminal cleanup, so "absent" is an expected, common case — see
    /// `UnknownSagaError` in spec §7).
    async fn load(&self, saga_id: &SagaId) -> Result<Option<SagaRecord>>;

    /// Updates an existing row, guarded by `expected`. Returns
    /// `StoreError::ConcurrencyConflict` if another writer updated the row
    /// first, in which case the caller should reload and retry.
    async fn update(&self, record: SagaRecord, expected: Expected) -> Result<()>;

    /// Deletes a row. Called once a saga reaches a terminal status (§3, §4.2).
    async fn delete(&self, saga_id: &SagaId) -> Result<()>;
}

/// Convenience helper: read-modify-write with a bounded number of retries
/// on optimistic-concurrency conflicts, per design note "Optimistic
/// concurrency (retry on version conflict) is acceptable".
pub async fn update_with_retry<S, F>(
    store: &S,
    saga_id: &SagaId,
    max_attempts: u32,
    mut mutate: F,
) -> Result<Option<SagaRecord>>
where
    S: SagaStateStore + ?Sized,
    F: FnMut(&mut SagaRecord),
{
    for _ in 0..max_attempts.max(1) {
        let Some(mut record) = store.load(saga_id).await? else {
            return Ok(None);
        };
        let expected = Expected::Updated(record.updated_at);
        mutate(&mut record);
        record.updated_at = Utc::now();
        match store.update(record.clone(), expected).await {
            Ok(()) => return Ok(Some(record)),
            Err(crate::error::StoreError::ConcurrencyConflict(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(crate::error::StoreError::ConcurrencyConflict(*saga_id))
}
