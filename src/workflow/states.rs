//! Workflow phase definitions for one EID's activation run.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Carrier;

/// The per-EID state machine, in forward order. No phase is skippable and
/// the workflow never moves backwards; the first fatal error jumps straight
/// to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum WorkflowPhase {
    /// Record exists, nothing submitted yet.
    Created,
    /// Activation request in flight.
    Activating,
    /// Waiting for the activation operation result.
    AwaitingActivation,
    /// Bounded-retry check that the provider marked the eSIM active.
    CheckingActive { attempt: u32 },
    /// Submitting the plan assignment for one carrier.
    AssigningPlan { carrier: Carrier },
    /// Waiting for the plan-assignment acknowledgement.
    AwaitingPlanAck { carrier: Carrier },
    /// Confirming the plan change took effect.
    ConfirmingPlan { carrier: Carrier },
    /// All carriers confirmed.
    Complete,
    /// First fatal error recorded; no further steps run.
    Failed,
}

impl WorkflowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// The carrier this phase concerns, when it is carrier-specific.
    pub fn carrier(&self) -> Option<Carrier> {
        match self {
            Self::AssigningPlan { carrier }
            | Self::AwaitingPlanAck { carrier }
            | Self::ConfirmingPlan { carrier } => Some(*carrier),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Activating => write!(f, "activating"),
            Self::AwaitingActivation => write!(f, "awaiting_activation"),
            Self::CheckingActive { attempt } => write!(f, "checking_active[{attempt}]"),
            Self::AssigningPlan { carrier } => write!(f, "assigning_plan[{carrier}]"),
            Self::AwaitingPlanAck { carrier } => write!(f, "awaiting_plan_ack[{carrier}]"),
            Self::ConfirmingPlan { carrier } => write!(f, "confirming_plan[{carrier}]"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(WorkflowPhase::Complete.is_terminal());
        assert!(WorkflowPhase::Failed.is_terminal());
        assert!(!WorkflowPhase::Created.is_terminal());
        assert!(!WorkflowPhase::CheckingActive { attempt: 3 }.is_terminal());
    }

    #[test]
    fn test_carrier_extraction() {
        let phase = WorkflowPhase::ConfirmingPlan {
            carrier: Carrier::Verizon,
        };
        assert_eq!(phase.carrier(), Some(Carrier::Verizon));
        assert_eq!(WorkflowPhase::Activating.carrier(), None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(
            WorkflowPhase::CheckingActive { attempt: 2 }.to_string(),
            "checking_active[2]"
        );
        assert_eq!(
            WorkflowPhase::AssigningPlan {
                carrier: Carrier::Att
            }
            .to_string(),
            "assigning_plan[ATT]"
        );
    }
}
