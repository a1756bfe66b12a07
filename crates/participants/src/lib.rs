//! Concrete participants for the reference five-domain saga
//! (`SagaDefinition::reference_sequence`): the non-compensatable
//! `create_order` head and `notify_customer` tail, and the four
//! compensatable mutating steps in between (§4.3, §9 "Saga definition as
//! data, not inheritance" — each participant only knows its own step name).
//!
//! Every domain service here is a small trait plus an in-memory
//! implementation, in the shape of the billing/payment/warehouse/delivery
//! services this engine's teacher models for its own saga
//! (`InventoryService`, `PaymentService`, `ShippingService`): a uniqueness
//! constraint keyed by `order_id` makes `handle_execute` idempotent, and the
//! undo releases that same row (§4.3 "Participant contract").

pub mod billing;
pub mod create_order;
pub mod delivery;
pub mod notify;
pub mod payment;
pub mod warehouse;

#[cfg(test)]
mod test_support;

pub use billing::{BillingParticipant, BillingService, InMemoryBillingService};
pub use create_order::CreateOrderParticipant;
pub use delivery::{DeliveryParticipant, DeliveryService, InMemoryDeliveryService};
pub use notify::{InMemoryNotificationService, NotifyParticipant, NotificationService};
pub use payment::{InMemoryPaymentGateway, PaymentGateway, PaymentParticipant};
pub use warehouse::{InMemoryWarehouseService, WarehouseParticipant, WarehouseService};
