//! Billing participant: debits a user's account balance for the order
//! total, compensated by crediting it back (§4.3).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use common::{BillingInfo, Money, OrderId, SagaPayload, UserId};
use participant_sdk::{Outcome, ParticipantHandler};
use saga::step_names;

/// Trait for the billing domain service: debit/credit a user's account
/// balance. Mirrors `PaymentService`/`InventoryService` in shape — a single
/// forward operation and its undo.
#[async_trait]
pub trait BillingService: Send + Sync {
    /// Debits `amount` from `user_id`'s balance, recording the debit under
    /// `order_id`. Repeating the same `order_id` without an intervening
    /// `credit` returns the original result rather than debiting twice.
    async fn debit(&self, order_id: OrderId, user_id: UserId, amount: Money) -> Result<BillingResult, String>;

    /// Reverses a prior debit for `order_id`. A no-op success if there was
    /// nothing to undo (§4.3 "Compensate must be idempotent").
    async fn credit(&self, order_id: OrderId) -> Result<(), String>;
}

/// Result of a successful debit.
#[derive(Debug, Clone)]
pub struct BillingResult {
    pub billing_transaction_id: String,
}

#[derive(Debug, Default)]
struct State {
    balances: HashMap<UserId, Money>,
    debits: HashMap<OrderId, (UserId, Money, String)>,
    next_id: u32,
}

/// In-memory billing ledger for tests and local development.
#[derive(Debug, Default)]
pub struct InMemoryBillingService {
    state: RwLock<State>,
}

impl InMemoryBillingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits a starting balance onto a user's account, for test setup.
    pub fn fund(&self, user_id: UserId, amount: Money) {
        let mut state = self.state.write().unwrap();
        let balance = state.balances.entry(user_id).or_insert_with(Money::zero);
        *balance = balance.add(amount);
    }

    /// Returns the current balance for a user (zero if never funded).
    pub fn balance(&self, user_id: UserId) -> Money {
        self.state.read().unwrap().balances.get(&user_id).copied().unwrap_or_else(Money::zero)
    }

    /// Returns true if `order_id` has an outstanding (uncredited) debit.
    pub fn has_debit(&self, order_id: OrderId) -> bool {
        self.state.read().unwrap().debits.contains_key(&order_id)
    }
}

#[async_trait]
impl BillingService for InMemoryBillingService {
    async fn debit(&self, order_id: OrderId, user_id: UserId, amount: Money) -> Result<BillingResult, String> {
        let mut state = self.state.write().unwrap();
        if let Some((_, _, id)) = state.debits.get(&order_id) {
            return Ok(BillingResult {
                billing_transaction_id: id.clone(),
            });
        }

        let balance = state.balances.get(&user_id).copied().unwrap_or_else(Money::zero);
        let Some(remaining) = balance.checked_sub(amount) else {
            return Err("insufficient funds".to_string());
        };

        state.next_id += 1;
        let billing_transaction_id = format!("BILL-{:04}", state.next_id);
        state.balances.insert(user_id, remaining);
        state.debits.insert(order_id, (user_id, amount, billing_transaction_id.clone()));
        Ok(BillingResult { billing_transaction_id })
    }

    async fn credit(&self, order_id: OrderId) -> Result<(), String> {
        let mut state = self.state.write().unwrap();
        if let Some((user_id, amount, _)) = state.debits.remove(&order_id) {
            let balance = state.balances.entry(user_id).or_insert_with(Money::zero);
            *balance = balance.add(amount);
        }
        Ok(())
    }
}

/// Adapts a [`BillingService`] to the `process_billing` step.
pub struct BillingParticipant<B> {
    billing: B,
}

impl<B: BillingService> BillingParticipant<B> {
    pub fn new(billing: B) -> Self {
        Self { billing }
    }
}

#[async_trait]
impl<B: BillingService + Send + Sync> ParticipantHandler for BillingParticipant<B> {
    fn step_name(&self) -> &str {
        step_names::PROCESS_BILLING
    }

    async fn handle_execute(&self, _saga_id: &str, mut payload: SagaPayload) -> Outcome {
        match self.billing.debit(payload.order_id, payload.user_id, payload.amount).await {
            Ok(result) => {
                payload.billing = Some(BillingInfo {
                    billing_transaction_id: result.billing_transaction_id,
                });
                Outcome::Success(payload)
            }
            Err(reason) => Outcome::Failure(reason),
        }
    }

    async fn handle_compensate(&self, _saga_id: &str, payload: SagaPayload) -> Outcome {
        match self.billing.credit(payload.order_id).await {
            Ok(()) => Outcome::Success(payload),
            Err(reason) => Outcome::Failure(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_payload;

    #[tokio::test]
    async fn debit_succeeds_with_sufficient_balance() {
        let service = InMemoryBillingService::new();
        let user_id = UserId::new();
        service.fund(user_id, Money::from_cents(1000));

        let result = service.debit(OrderId::new(), user_id, Money::from_cents(500)).await.unwrap();
        assert!(result.billing_transaction_id.starts_with("BILL-"));
        assert_eq!(service.balance(user_id), Money::from_cents(500));
    }

    #[tokio::test]
    async fn debit_fails_with_insufficient_balance() {
        let service = InMemoryBillingService::new();
        let user_id = UserId::new();
        service.fund(user_id, Money::from_cents(1000));

        let err = service.debit(OrderId::new(), user_id, Money::from_cents(5000)).await.unwrap_err();
        assert_eq!(err, "insufficient funds");
        assert_eq!(service.balance(user_id), Money::from_cents(1000));
    }

    #[tokio::test]
    async fn repeated_debit_for_the_same_order_is_idempotent() {
        let service = InMemoryBillingService::new();
        let user_id = UserId::new();
        let order_id = OrderId::new();
        service.fund(user_id, Money::from_cents(1000));

        let first = service.debit(order_id, user_id, Money::from_cents(500)).await.unwrap();
        let second = service.debit(order_id, user_id, Money::from_cents(500)).await.unwrap();
        assert_eq!(first.billing_transaction_id, second.billing_transaction_id);
        assert_eq!(service.balance(user_id), Money::from_cents(500));
    }

    #[tokio::test]
    async fn credit_reverses_a_debit_and_is_idempotent() {
        let service = InMemoryBillingService::new();
        let user_id = UserId::new();
        let order_id = OrderId::new();
        service.fund(user_id, Money::from_cents(1000));
        service.debit(order_id, user_id, Money::from_cents(500)).await.unwrap();

        service.credit(order_id).await.unwrap();
        assert_eq!(service.balance(user_id), Money::from_cents(1000));
        assert!(!service.has_debit(order_id));

        // nothing left to undo; still a success per the participant contract.
        service.credit(order_id).await.unwrap();
        assert_eq!(service.balance(user_id), Money::from_cents(1000));
    }

    #[tokio::test]
    async fn participant_handle_execute_enriches_the_payload() {
        let service = InMemoryBillingService::new();
        let mut payload = sample_payload();
        payload.amount = Money::from_cents(500);
        service.fund(payload.user_id, Money::from_cents(1000));
        let participant = BillingParticipant::new(service);

        let outcome = participant.handle_execute("saga-1", payload).await;
        match outcome {
            Outcome::Success(payload) => assert!(payload.billing.is_some()),
            Outcome::Failure(reason) => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn participant_handle_execute_surfaces_insufficient_funds() {
        let service = InMemoryBillingService::new();
        let mut payload = sample_payload();
        payload.amount = Money::from_cents(5000);
        service.fund(payload.user_id, Money::from_cents(1000));
        let participant = BillingParticipant::new(service);

        let outcome = participant.handle_execute("saga-1", payload).await;
        assert!(matches!(outcome, Outcome::Failure(reason) if reason == "insufficient funds"));
    }

    #[tokio::test]
    async fn participant_handle_compensate_credits_back() {
        let service = InMemoryBillingService::new();
        let payload = sample_payload();
        service.fund(payload.user_id, Money::from_cents(1000));
        service.debit(payload.order_id, payload.user_id, payload.amount).await.unwrap();
        let balance_before_compensate = service.balance(payload.user_id);

        let participant = BillingParticipant::new(service);
        let outcome = participant.handle_compensate("saga-1", payload.clone()).await;
        assert!(matches!(outcome, Outcome::Success(_)));
        assert!(participant.billing.balance(payload.user_id).cents() > balance_before_compensate.cents());
    }
}
