//! Exchange names and routing-key grammar (spec §4.1, §6).

/// The single topic exchange carrying saga execute/compensate/result traffic.
pub const SAGA_EXCHANGE: &str = "saga_exchange";

/// The topic exchange carrying auxiliary order lifecycle events.
pub const ORDER_EVENTS_EXCHANGE: &str = "order_events";

/// The orchestrator's own result queue, bound with `saga.*.result`.
pub const RESULT_QUEUE: &str = "order.saga_results";

/// Binding pattern for the orchestrator's result queue.
pub const RESULT_BINDING: &str = "saga.*.result";

/// Routing key for an execute command to the given step.
pub fn execute_key(step: &str) -> String {
    format!("saga.{step}.execute")
}

/// Routing key for a compensate command to the given step.
pub fn compensate_key(step: &str) -> String {
    format!("saga.{step}.compensate")
}

/// Routing key for a participant's reply on a given step.
pub fn result_key(step: &str) -> String {
    format!("saga.{step}.result")
}

/// Queue name a participant declares for its execute commands.
pub fn execute_queue(step: &str) -> String {
    format!("{step}_execute_queue")
}

/// Queue name a participant declares for its compensate commands.
pub fn compensate_queue(step: &str) -> String {
    format!("{step}_compensate_queue")
}

/// Parses a `saga.<step>.<suffix>` routing key, returning the step name.
pub fn step_from_key(routing_key: &str, suffix: &str) -> Option<String> {
    let prefix = "saga.";
    let tail = format!(".{suffix}");
    routing_key
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(&tail))
        .map(str::to_string)
}
