//! The Saga Payload — in-flight order data carried inside every message body.
//!
//! The orchestrator treats the payload as opaque for routing purposes; it is
//! co-owned with participants, who append their own outputs before
//! republishing it in a Result. See design note "No back-references between
//! steps": each participant only fills its own optional sub-record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, UserId};
use crate::money::Money;

/// A line item on the order, copied from the Order Intake request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: u32,
    pub price: Money,
}

/// Optional delivery request supplied at intake time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub address: String,
    pub time_slot: u32,
    pub zone: u32,
}

/// Billing participant's output (account debit reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub billing_transaction_id: String,
}

/// Payment participant's output (gateway charge reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub payment_id: String,
}

/// Warehouse participant's output (stock reservation reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseInfo {
    pub reservation_id: String,
}

/// Delivery participant's output (courier/time-slot reservation reference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub delivery_id: String,
}

/// The in-flight saga payload shipped inside every `Envelope::data`.
///
/// Each participant fills in only its own optional sub-record. The
/// `compensated_steps` map is a participant-local idempotency hint only —
/// the authoritative set lives in the Saga State row and wins on divergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaPayload {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub items: Vec<OrderItem>,
    pub amount: Money,
    pub delivery: Option<DeliveryRequest>,

    pub billing: Option<BillingInfo>,
    pub payment: Option<PaymentInfo>,
    pub warehouse: Option<WarehouseInfo>,
    pub delivery_info: Option<DeliveryInfo>,

    /// Participant-local hint, not authoritative. See module docs.
    #[serde(default)]
    pub compensated_steps: HashMap<String, bool>,
}

impl SagaPayload {
    /// Builds the initial payload for a new saga, as assembled by the Order
    /// Intake entry point.
    pub fn new(
        order_id: OrderId,
        user_id: UserId,
        email: impl Into<String>,
        items: Vec<OrderItem>,
        amount: Money,
        delivery: Option<DeliveryRequest>,
    ) -> Self {
        Self {
            order_id,
            user_id,
            email: email.into(),
            items,
            amount,
            delivery,
            billing: None,
            payment: None,
            warehouse: None,
            delivery_info: None,
            compensated_steps: HashMap::new(),
        }
    }

    /// Serializes the payload to the opaque byte string carried on the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserializes a payload from the opaque byte string on the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
