//! Per-EID activation workflow: an explicit state machine driven against
//! the asynchronous provider API.

pub mod activation;
pub mod states;

pub use activation::ActivationWorkflow;
pub use states::WorkflowPhase;

use serde::{Deserialize, Serialize};

/// Terminal result of one EID's workflow run.
///
/// Consumed solely by the batch coordinator's aggregator to update the
/// batch counters; failures never cross EID boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowOutcome {
    Success,
    Failure { reason: String },
}

impl WorkflowOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}
