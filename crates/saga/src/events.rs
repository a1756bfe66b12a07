//! Auxiliary order lifecycle events published to the `order_events` exchange
//! (§6), consumed by notification and other downstream systems.

use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

/// Routing key for the order-cancelled event.
pub const ORDER_CANCELLED_KEY: &str = "order.cancelled";

/// Routing key for the order-failed event.
pub const ORDER_FAILED_KEY: &str = "order.failed";

/// The `{type, order_id, user_id, email, reason}` payload shared by both
/// auxiliary order events (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLifecycleEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub reason: String,
}

impl OrderLifecycleEvent {
    /// Published once compensation completes a saga (§4.2 step 1).
    pub fn cancelled(order_id: OrderId, user_id: UserId, email: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            event_type: "order.cancelled".to_string(),
            order_id,
            user_id,
            email: email.into(),
            reason: reason.into(),
        }
    }

    /// Published when compensation is initiated due to a step failure
    /// (§4.2 step 3).
    pub fn failed(order_id: OrderId, user_id: UserId, email: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            event_type: "order.failed".to_string(),
            order_id,
            user_id,
            email: email.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_event_carries_the_type_tag() {
        let event = OrderLifecycleEvent::cancelled(OrderId::new(), UserId::new(), "a@b.com", "insufficient funds");
        assert_eq!(event.event_type, "order.cancelled");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"order.cancelled\""));
    }

    #[test]
    fn failed_event_carries_the_type_tag() {
        let event = OrderLifecycleEvent::failed(OrderId::new(), UserId::new(), "a@b.com", "reason");
        assert_eq!(event.event_type, "order.failed");
    }
}
