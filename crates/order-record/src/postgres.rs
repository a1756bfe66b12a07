//! PostgreSQL-backed Order Record Store.

use async_trait::async_trait;
use common::OrderId;
use sqlx::PgPool;

use crate::error::{OrderRecordError, Result};
use crate::status::OrderStatus;
use crate::store::OrderRecordStore;

/// `sqlx`-backed Order Record Store, mirroring
/// [`saga_store::PostgresSagaStateStore`]'s shape.
#[derive(Clone)]
pub struct PostgresOrderRecordStore {
    pool: PgPool,
}

impl PostgresOrderRecordStore {
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

    fn parse_status(raw: &str) -> std::result::Result<OrderStatus, sqlx::Error> {
        match raw {
            "Pending" => Ok(OrderStatus::Pending),
            "Completed" => Ok(OrderStatus::Completed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "Failed" => Ok(OrderStatus::Failed),
            other => Err(sqlx::Error::Decode(format!("unknown order status {other}").into())),
        }
    }
}

#[async_trait]
impl OrderRecordStore for PostgresOrderRecordStore {
    async fn create(&self, order_id: OrderId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO order_record (order_id, status)
            VALUES ($1, 'Pending')
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(order_id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn status(&self, order_id: OrderId) -> Result<Option<OrderStatus>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM order_record WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(status,)| Self::parse_status(&status).map_err(OrderRecordError::Database))
            .transpose()
    }

    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()> {
        // Single statement, guarded in SQL: a terminal row only accepts a
        // write that repeats its own status, never a regression to Pending.
        let rows_affected = sqlx::query(
            r#"
            UPDATE order_record
            SET status = $2, updated_at = now()
            WHERE order_id = $1
              AND (status = 'Pending' OR status = $2)
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            let current = self.status(order_id).await?;
            return match current {
                None => Err(OrderRecordError::NotFound(order_id)),
                Some(current) if current == status => Ok(()),
                Some(current) => Err(OrderRecordError::NonMonotonicTransition {
                    order_id,
                    current: current.as_str(),
                    attempted: status.as_str(),
                }),
            };
        }
        Ok(())
    }
}
