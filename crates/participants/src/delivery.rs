//! Delivery participant: reserves a courier/time-slot for the order,
//! compensated by cancelling the reservation (§4.3).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use common::{DeliveryInfo, DeliveryRequest, OrderId, SagaPayload};
use participant_sdk::{Outcome, ParticipantHandler};
use saga::step_names;

/// Trait for the delivery/courier scheduling service.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Schedules a courier for `request`. Repeating the same `order_id`
    /// returns the original booking rather than double-booking.
    async fn schedule(&self, order_id: OrderId, request: Option<&DeliveryRequest>) -> Result<DeliveryResult, String>;

    /// Cancels a prior booking for `order_id`. A no-op success if there is
    /// no booking on file.
    async fn cancel(&self, order_id: OrderId) -> Result<(), String>;
}

/// Result of a successful booking.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub delivery_id: String,
}

#[derive(Debug, Default)]
struct State {
    /// `(zone, time_slot) -> count booked`, to model a slot's capacity.
    slot_load: HashMap<(u32, u32), u32>,
    bookings: HashMap<OrderId, String>,
    next_id: u32,
}

/// In-memory delivery service for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryDeliveryService {
    state: RwLock<State>,
    capacity_per_slot: u32,
}

impl InMemoryDeliveryService {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            capacity_per_slot: u32::MAX,
        }
    }

    /// Caps how many orders may share a `(zone, time_slot)` pair, for tests
    /// that want to exercise the `execute/failed` path.
    pub fn with_capacity_per_slot(capacity: u32) -> Self {
        Self {
            state: RwLock::new(State::default()),
            capacity_per_slot: capacity,
        }
    }

    pub fn has_booking(&self, order_id: OrderId) -> bool {
        self.state.read().unwrap().bookings.contains_key(&order_id)
    }
}

#[async_trait]
impl DeliveryService for InMemoryDeliveryService {
    async fn schedule(&self, order_id: OrderId, request: Option<&DeliveryRequest>) -> Result<DeliveryResult, String> {
        let mut state = self.state.write().unwrap();
        if let Some(id) = state.bookings.get(&order_id) {
            return Ok(DeliveryResult { delivery_id: id.clone() });
        }

        if let Some(request) = request {
            let slot_key = (request.zone, request.time_slot);
            let load = state.slot_load.get(&slot_key).copied().unwrap_or(0);
            if load >= self.capacity_per_slot {
                return Err(format!("no capacity for zone {} slot {}", request.zone, request.time_slot));
            }
            state.slot_load.insert(slot_key, load + 1);
        }

        state.next_id += 1;
        let delivery_id = format!("DLV-{:04}", state.next_id);
        state.bookings.insert(order_id, delivery_id.clone());
        Ok(DeliveryResult { delivery_id })
    }

    async fn cancel(&self, order_id: OrderId) -> Result<(), String> {
        self.state.write().unwrap().bookings.remove(&order_id);
        Ok(())
    }
}

/// Adapts a [`DeliveryService`] to the `schedule_delivery` step.
pub struct DeliveryParticipant<D> {
    delivery: D,
}

impl<D: DeliveryService> DeliveryParticipant<D> {
    pub fn new(delivery: D) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl<D: DeliveryService + Send + Sync> ParticipantHandler for DeliveryParticipant<D> {
    fn step_name(&self) -> &str {
        step_names::SCHEDULE_DELIVERY
    }

    async fn handle_execute(&self, _saga_id: &str, mut payload: SagaPayload) -> Outcome {
        match self.delivery.schedule(payload.order_id, payload.delivery.as_ref()).await {
            Ok(result) => {
                payload.delivery_info = Some(DeliveryInfo {
                    delivery_id: result.delivery_id,
                });
                Outcome::Success(payload)
            }
            Err(reason) => Outcome::Failure(reason),
        }
    }

    async fn handle_compensate(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        match self.delivery.cancel(payload.order_id).await {
            Ok(()) => Outcome::Success(payload),
            Err(reason) => Outcome::Failure(reason),
        }
    }
}
