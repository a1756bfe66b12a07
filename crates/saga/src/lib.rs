//! The orchestrator crate: saga definitions, the state-machine driver, and
//! the auxiliary order lifecycle events it publishes (spec §3, §4, §6).

pub mod definition;
pub mod error;
pub mod events;
pub mod orchestrator;

pub use definition::{SagaDefinition, Step, step_names};
pub use error::{Result, SagaError};
pub use events::{ORDER_CANCELLED_KEY, ORDER_FAILED_KEY, OrderLifecycleEvent};
pub use orchestrator::Orchestrator;
