//! Topic-routed message bus adapter for the order saga engine (spec §4.4).
//!
//! One topic exchange (`saga_exchange`) carries execute/compensate commands
//! and result replies; a second (`order_events`) carries auxiliary order
//! lifecycle events consumed by notification and other downstream systems.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod rabbit;
pub mod routing;

pub use bus::{DEFAULT_PUBLISH_RETRIES, DeliveryStream, MessageBus, MessageDelivery};
pub use envelope::{Envelope, Operation, ReplyStatus};
pub use error::{MessagingError, Result};
pub use memory::InMemoryMessageBus;
pub use rabbit::RabbitMessageBus;
