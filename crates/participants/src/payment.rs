//! Payment participant: charges the gateway for the order total,
//! compensated by a refund (§4.3).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use common::{Money, OrderId, PaymentInfo, SagaPayload};
use participant_sdk::{Outcome, ParticipantHandler};
use saga::step_names;

/// Trait for the payment gateway: charge an order, refund a prior charge.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges `amount` against `order_id`. Repeating the same `order_id`
    /// returns the original charge rather than charging twice.
    async fn charge(&self, order_id: OrderId, amount: Money) -> Result<PaymentResult, String>;

    /// Refunds a prior charge for `order_id`, marking it `refunded`. A
    /// no-op success if there is no charge on file for `order_id`.
    async fn refund(&self, order_id: OrderId) -> Result<(), String>;
}

/// Result of a successful charge.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub payment_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChargeStatus {
    Charged,
    Refunded,
}

#[derive(Debug, Default)]
struct State {
    charges: HashMap<OrderId, (String, ChargeStatus)>,
    next_id: u32,
}

/// In-memory payment gateway for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryPaymentGateway {
    state: RwLock<State>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gateway's current view of `order_id`'s charge, if any.
    pub fn charge_status(&self, order_id: OrderId) -> Option<&'static str> {
        self.state.read().unwrap().charges.get(&order_id).map(|(_, status)| match status {
            ChargeStatus::Charged => "charged",
            ChargeStatus::Refunded => "refunded",
        })
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(&self, order_id: OrderId, _amount: Money) -> Result<PaymentResult, String> {
        let mut state = self.state.write().unwrap();
        if let Some((id, _)) = state.charges.get(&order_id) {
            return Ok(PaymentResult { payment_id: id.clone() });
        }

        state.next_id += 1;
        let payment_id = format!("PAY-{:04}", state.next_id);
        state.charges.insert(order_id, (payment_id.clone(), ChargeStatus::Charged));
        Ok(PaymentResult { payment_id })
    }

    async fn refund(&self, order_id: OrderId) -> Result<(), String> {
        let mut state = self.state.write().unwrap();
        if let Some(entry) = state.charges.get_mut(&order_id) {
            entry.1 = ChargeStatus::Refunded;
        }
        Ok(())
    }
}

/// Adapts a [`PaymentGateway`] to the `process_payment` step.
pub struct PaymentParticipant<P> {
    gateway: P,
}

impl<P: PaymentGateway> PaymentParticipant<P> {
    pub fn new(gateway: P) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl<P: PaymentGateway + Send + Sync> ParticipantHandler for PaymentParticipant<P> {
    fn step_name(&self) -> &str {
        step_names::PROCESS_PAYMENT
    }

    async fn handle_execute(&self, _saga_id: &str, mut payload: SagaPayload) -> Outcome {
        match self.gateway.charge(payload.order_id, payload.amount).await {
            Ok(result) => {
                payload.payment = Some(PaymentInfo {
                    payment_id: result.payment_id,
                });
                Outcome::Success(payload)
            }
            Err(reason) => Outcome::Failure(reason),
        }
    }

    async fn handle_compensate(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        match self.gateway.refund(payload.order_id).await {
            Ok(()) => Outcome::Success(payload),
            Err(reason) => Outcome::Failure(reason),
        }
    }
}
