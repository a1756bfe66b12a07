//! Notification participant: the saga's non-compensatable tail, sending the
//! customer an order-confirmation message (§4.3, SMTP delivery itself is
//! out of scope per spec.md §1 "Out of scope").

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use common::{OrderId, SagaPayload};
use participant_sdk::{Outcome, ParticipantHandler};
use saga::step_names;

/// Trait for the customer-notification service.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Sends an order-confirmation notification. Repeating the same
    /// `order_id` must not send a second notification.
    async fn notify(&self, order_id: OrderId, email: &str) -> Result<(), String>;
}

/// In-memory notification sink for tests and local development; records
/// which orders were notified rather than delivering mail (§1 Non-goals).
#[derive(Debug, Default)]
pub struct InMemoryNotificationService {
    notified: RwLock<HashSet<OrderId>>,
}

impl InMemoryNotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn was_notified(&self, order_id: OrderId) -> bool {
        self.notified.read().unwrap().contains(&order_id)
    }
}

#[async_trait]
impl NotificationService for InMemoryNotificationService {
    async fn notify(&self, order_id: OrderId, _email: &str) -> Result<(), String> {
        self.notified.write().unwrap().insert(order_id);
        Ok(())
    }
}

/// Adapts a [`NotificationService`] to the `notify_customer` step. This is
/// the saga's tail: `compensate_on_error = false` in
/// `SagaDefinition::reference_sequence`, so `handle_compensate` is never
/// invoked in practice, but still answers correctly under replay.
pub struct NotifyParticipant<N> {
    notifications: N,
}

impl<N: NotificationService> NotifyParticipant<N> {
    pub fn new(notifications: N) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl<N: NotificationService + Send + Sync> ParticipantHandler for NotifyParticipant<N> {
    fn step_name(&self) -> &str {
        step_names::NOTIFY_CUSTOMER
    }

    async fn handle_execute(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        match self.notifications.notify(payload.order_id, &payload.email).await {
            Ok(()) => Outcome::Success(payload),
            Err(reason) => Outcome::Failure(reason),
        }
    }

    async fn handle_compensate(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        Outcome::Success(payload)
    }
}
