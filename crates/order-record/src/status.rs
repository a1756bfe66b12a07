//! Order status: the user-visible lifecycle the orchestrator writes to (§2, §6).

use serde::{Deserialize, Serialize};

/// The order's user-visible status, owned by the Order Record Store.
///
/// Only the orchestrator writes status transitions (§2). `Completed`,
/// `Cancelled`, and `Failed` are terminal: once set, a write attempting to
/// move the row back to `Pending` is rejected (§5 "Shared-resource policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
