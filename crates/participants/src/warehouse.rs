//! Warehouse participant: reserves stock for the order's line items,
//! compensated by releasing the reservation (§4.3).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use common::{OrderId, OrderItem, SagaPayload, WarehouseInfo};
use participant_sdk::{Outcome, ParticipantHandler};
use saga::step_names;

/// Trait for the warehouse stock-reservation service.
#[async_trait]
pub trait WarehouseService: Send + Sync {
    /// Reserves stock for every line item. Repeating the same `order_id`
    /// returns the original reservation rather than reserving twice.
    async fn reserve(&self, order_id: OrderId, items: &[OrderItem]) -> Result<WarehouseResult, String>;

    /// Releases a prior reservation for `order_id`. A no-op success if
    /// there is nothing reserved under that id.
    async fn release(&self, order_id: OrderId) -> Result<(), String>;
}

/// Result of a successful reservation.
#[derive(Debug, Clone)]
pub struct WarehouseResult {
    pub reservation_id: String,
}

#[derive(Debug, Default)]
struct State {
    /// Per-product units reserved, so a quantity beyond what is on hand
    /// surfaces as an `execute/failed` reply (spec §8 "Warehouse-failure").
    stock: HashMap<String, u32>,
    reservations: HashMap<OrderId, String>,
    next_id: u32,
}

/// In-memory warehouse service for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseService {
    state: RwLock<State>,
}

impl InMemoryWarehouseService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the on-hand quantity for a product, for test setup. Products
    /// not configured are assumed to have effectively unlimited stock.
    pub fn set_stock(&self, product_id: impl Into<String>, quantity: u32) {
        self.state.write().unwrap().stock.insert(product_id.into(), quantity);
    }

    pub fn has_reservation(&self, order_id: OrderId) -> bool {
        self.state.read().unwrap().reservations.contains_key(&order_id)
    }
}

#[async_trait]
impl WarehouseService for InMemoryWarehouseService {
    async fn reserve(&self, order_id: OrderId, items: &[OrderItem]) -> Result<WarehouseResult, String> {
        let mut state = self.state.write().unwrap();
        if let Some(id) = state.reservations.get(&order_id) {
            return Ok(WarehouseResult { reservation_id: id.clone() });
        }

        for item in items {
            if let Some(&on_hand) = state.stock.get(&item.product_id)
                && item.quantity > on_hand
            {
                return Err(format!("insufficient stock for {}", item.product_id));
            }
        }

        for item in items {
            if let Some(on_hand) = state.stock.get_mut(&item.product_id) {
                *on_hand -= item.quantity;
            }
        }

        state.next_id += 1;
        let reservation_id = format!("RES-{:04}", state.next_id);
        state.reservations.insert(order_id, reservation_id.clone());
        Ok(WarehouseResult { reservation_id })
    }

    async fn release(&self, order_id: OrderId) -> Result<(), String> {
        self.state.write().unwrap().reservations.remove(&order_id);
        Ok(())
    }
}

/// Adapts a [`WarehouseService`] to the `reserve_warehouse` step.
pub struct WarehouseParticipant<W> {
    warehouse: W,
}

impl<W: WarehouseService> WarehouseParticipant<W> {
    pub fn new(warehouse: W) -> Self {
        Self { warehouse }
    }
}

#[async_trait]
impl<W: WarehouseService + Send + Sync> ParticipantHandler for WarehouseParticipant<W> {
    fn step_name(&self) -> &str {
        step_names::RESERVE_WAREHOUSE
    }

    async fn handle_execute(&self, _saga_id: &str, mut payload: SagaPayload) -> Outcome {
        match self.warehouse.reserve(payload.order_id, &payload.items).await {
            Ok(result) => {
                payload.warehouse = Some(WarehouseInfo {
                    reservation_id: result.reservation_id,
                });
                Outcome::Success(payload)
            }
            Err(reason) => Outcome::Failure(reason),
        }
    }

    async fn handle_compensate(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        match self.warehouse.release(payload.order_id).await {
            Ok(()) => Outcome::Success(payload),
            Err(reason) => Outcome::Failure(reason),
        }
    }
}
