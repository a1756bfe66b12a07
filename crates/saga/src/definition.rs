//! Saga definition: a flat, ordered list of steps shared between the
//! orchestrator and participants (§3, design note "Saga definition as data,
//! not inheritance"). No step knows of any other; the orchestrator works
//! generically over this list.

/// One step in a saga definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    /// If a later step fails, must this step receive a Compensate command?
    pub compensate_on_error: bool,
}

impl Step {
    pub fn new(name: impl Into<String>, compensate_on_error: bool) -> Self {
        Self {
            name: name.into(),
            compensate_on_error,
        }
    }
}

/// An ordered sequence of steps (§3 "Saga definition (static)").
#[derive(Debug, Clone)]
pub struct SagaDefinition {
    steps: Vec<Step>,
}

impl SagaDefinition {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn index_of(&self, step_name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == step_name)
    }

    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    /// The step following `step_name`, or `None` if it is the last step.
    pub fn next_step(&self, step_name: &str) -> Option<&Step> {
        let index = self.index_of(step_name)?;
        self.steps.get(index + 1)
    }

    pub fn is_last_step(&self, step_name: &str) -> bool {
        self.index_of(step_name) == Some(self.steps.len() - 1)
    }

    /// Steps at indices `0..index` with `compensate_on_error = true`, in
    /// saga order (§4.2 "Compensation fan-out"). Publication order across
    /// the returned set is not itself observable.
    pub fn compensatable_predecessors(&self, index: usize) -> Vec<&Step> {
        self.steps[..index].iter().filter(|s| s.compensate_on_error).collect()
    }

    /// The reference five-domain saga used by the seed tests (SPEC_FULL.md
    /// "Reference saga sequence"): a non-compensatable `create_order` head,
    /// four compensatable mutating steps, and a non-compensatable
    /// `notify_customer` tail.
    pub fn reference_sequence() -> Self {
        Self::new(vec![
            Step::new(step_names::CREATE_ORDER, false),
            Step::new(step_names::PROCESS_BILLING, true),
            Step::new(step_names::PROCESS_PAYMENT, true),
            Step::new(step_names::RESERVE_WAREHOUSE, true),
            Step::new(step_names::SCHEDULE_DELIVERY, true),
            Step::new(step_names::NOTIFY_CUSTOMER, false),
        ])
    }
}

/// Step names for the reference sequence, shared by participants and tests.
pub mod step_names {
    pub const CREATE_ORDER: &str = "create_order";
    pub const PROCESS_BILLING: &str = "process_billing";
    pub const PROCESS_PAYMENT: &str = "process_payment";
    pub const RESERVE_WAREHOUSE: &str = "reserve_warehouse";
    pub const SCHEDULE_DELIVERY: &str = "schedule_delivery";
    pub const NOTIFY_CUSTOMER: &str = "notify_customer";
}
