use std::collections::HashSet;

use async_trait::async_trait;
use common::{OrderId, SagaId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::record::{SagaRecord, SagaStatus};
use crate::store::{Expected, SagaStateStore};

/// PostgreSQL-backed Saga State Store.
#[derive(Clone)]
pub struct PostgresSagaStateStore {
    pool: PgPool,
}

impl PostgresSagaStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<SagaRecord> {
        let status: String = row.try_get("status")?;
        let status = match status.as_str() {
            "Running" => SagaStatus::Running,
            "Compensating" => SagaStatus::Compensating,
            "Completed" => SagaStatus::Completed,
            "Compensated" => SagaStatus::Compensated,
            "Failed" => SagaStatus::Failed,
            other => {
                return Err(StoreError::Database(sqlx::Error::Decode(
                    format!("unknown saga status {other}").into(),
                )));
            }
        };
        let compensated_steps_json: serde_json::Value = row.try_get("compensated_steps")?;
        let compensated_steps: HashSet<String> = serde_json::from_value(compensated_steps_json)?;

        Ok(SagaRecord {
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            email: row.try_get("email")?,
            status,
            compensated_steps,
            total_to_compensate: row.try_get::<i32, _>("total_to_compensate")? as u32,
            last_step: row.try_get("last_step")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SagaStateStore for PostgresSagaStateStore {
    async fn create(&self, record: SagaRecord) -> Result<()> {
        let compensated_steps = serde_json::to_value(&record.compensated_steps)?;
        let result = sqlx::query(
            r#"
            INSERT INTO saga_state
                (saga_id, order_id, user_id, email, status, compensated_steps, total_to_compensate,
                 last_step, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.saga_id.as_uuid())
        .bind(record.order_id.as_uuid())
        .bind(record.user_id.as_uuid())
        .bind(&record.email)
        .bind(record.status.as_str())
        .bind(compensated_steps)
        .bind(record.total_to_compensate as i32)
        .bind(&record.last_step)
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(ref db_err)) if db_err.constraint().is_some() => {
                Err(StoreError::AlreadyExists(record.saga_id))
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    async fn load(&self, saga_id: &SagaId) -> Result<Option<SagaRecord>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT saga_id, order_id, user_id, email, status, compensated_steps, total_to_compensate,
                   last_step, error_message, created_at, updated_at
            FROM saga_state
            WHERE saga_id = $1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn update(&self, record: SagaRecord, expected: Expected) -> Result<()> {
        let compensated_steps = serde_json::to_value(&record.compensated_steps)?;

        let rows_affected = match expected {
            Expected::New => {
                return Err(StoreError::Database(sqlx::Error::Protocol(
                    "update called with Expected::New; use create instead".into(),
                )));
            }
            Expected::Updated(expected_updated_at) => {
                sqlx::query(
                    r#"
                    UPDATE saga_state
                    SET status = $1, compensated_steps = $2, total_to_compensate = $3,
                        last_step = $4, error_message = $5, updated_at = $6
                    WHERE saga_id = $7 AND updated_at = $8
                    "#,
                )
                .bind(record.status.as_str())
                .bind(compensated_steps)
                .bind(record.total_to_compensate as i32)
                .bind(&record.last_step)
                .bind(&record.error_message)
                .bind(record.updated_at)
                .bind(record.saga_id.as_uuid())
                .bind(expected_updated_at)
                .execute(&self.pool)
                .await?
                .rows_affected()
            }
        };

        if rows_affected == 0 {
            return Err(StoreError::ConcurrencyConflict(record.saga_id));
        }
        Ok(())
    }

    async fn delete(&self, saga_id: &SagaId) -> Result<()> {
        sqlx::query("DELETE FROM saga_state WHERE saga_id = $1")
            .bind(saga_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

