//! The `OrderRecordStore` trait: external collaborator storing the order's
//! user-visible status (§2).

use async_trait::async_trait;
use common::OrderId;

use crate::error::Result;
use crate::status::OrderStatus;

/// External collaborator owning the order row's user-visible status.
///
/// Multi-writer, but guarded so monotonic status transitions can't be
/// undone by a re-ordered `Pending` write (§5). This engine's own Non-goals
/// keep full order CRUD out of scope (§1); only the status column and the
/// narrow `set_status` operation the orchestrator needs are modeled here.
#[async_trait]
pub trait OrderRecordStore: Send + Sync {
    /// Creates the order row at intake time, status `Pending`. Idempotent:
    /// creating an order id that already exists is a no-op.
    async fn create(&self, order_id: OrderId) -> Result<()>;

    /// Reads the current status, or `None` if the order row is unknown.
    async fn status(&self, order_id: OrderId) -> Result<Option<OrderStatus>>;

    /// Writes a new status. Rejects moving a terminal row back to `Pending`;
    /// writing the same terminal status again is a harmless no-op (Orchestrator
    /// retries after a crash may replay the same terminal write).
    async fn set_status(&self, order_id: OrderId, status: OrderStatus) -> Result<()>;
}
