//! Shared identifiers, money value type, and the saga payload shape used
//! across the order saga engine's crates.

pub mod ids;
pub mod money;
pub mod payload;

pub use ids::{OrderId, SagaId, UserId};
pub use money::Money;
pub use payload::{
    BillingInfo, DeliveryInfo, DeliveryRequest, OrderItem, PaymentInfo, SagaPayload, WarehouseInfo,
};
