//! Shared fixtures for participant unit tests.

use common::{Money, OrderId, OrderItem, SagaPayload, UserId};

pub fn sample_payload() -> SagaPayload {
    SagaPayload::new(
        OrderId::new(),
        UserId::new(),
        "buyer@example.com",
        vec![OrderItem {
            product_id: "SKU-1".into(),
            quantity: 2,
            price: Money::from_cents(500),
        }],
        Money::from_cents(1000),
        None,
    )
}
