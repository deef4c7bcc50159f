//! Batch lifecycle state and aggregate counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::workflow::WorkflowOutcome;

/// Batch lifecycle status.
///
/// Transitions are `Pending -> Running -> {Completed, Failed}` with an
/// externally triggered `Running -> Stopped` escape. Terminal states accept
/// no further mutation from the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Created by the batch-definition flow, not yet picked up.
    #[default]
    Pending,
    /// The coordinator is processing EIDs.
    Running,
    /// Every EID reached a terminal outcome.
    Completed,
    /// The batch could not be scheduled at all.
    Failed,
    /// Externally stopped mid-run; never overwritten by completion.
    Stopped,
}

impl BatchStatus {
    /// Check if this is a terminal state (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Check if the orchestrator is actively processing the batch.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "STOPPED" => Ok(Self::Stopped),
            _ => Err(format!("Invalid batch status: {s}")),
        }
    }
}

/// Lifecycle timestamps forwarded to the result sink alongside a status
/// change. Fields left `None` keep whatever the sink already holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTimestamps {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One provisioning job: an ordered set of EIDs processed together under a
/// single concurrency policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub label: String,
    /// Ordered set of device identifiers; `len()` is the batch total.
    pub eids: Vec<String>,
    /// Admission-control cap against the rate-sensitive provider API.
    pub max_concurrency: usize,
    pub status: BatchStatus,
    pub success_count: u64,
    pub failure_count: u64,
    pub processed_count: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Batch {
    /// Create a new batch in `Pending` with zeroed counters.
    pub fn new(label: impl Into<String>, eids: Vec<String>, max_concurrency: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            eids,
            max_concurrency,
            status: BatchStatus::Pending,
            success_count: 0,
            failure_count: 0,
            processed_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Total number of EIDs in the batch.
    pub fn total_eids(&self) -> usize {
        self.eids.len()
    }

    /// Fold one terminal workflow outcome into the aggregate counters.
    ///
    /// Maintains `processed_count == success_count + failure_count` on every
    /// call; callers must serialize invocations (the coordinator funnels all
    /// outcomes through a single aggregator task).
    pub fn record_outcome(&mut self, outcome: &WorkflowOutcome) {
        match outcome {
            WorkflowOutcome::Success => self.success_count += 1,
            WorkflowOutcome::Failure { .. } => self.failure_count += 1,
        }
        self.processed_count = self.success_count + self.failure_count;
    }

    /// True once every EID has a terminal outcome.
    pub fn all_processed(&self) -> bool {
        self.processed_count as usize >= self.total_eids()
    }

    /// Current timestamps, in the shape the result sink consumes.
    pub fn timestamps(&self) -> BatchTimestamps {
        BatchTimestamps {
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> Batch {
        Batch::new("us-wave-1", vec!["eid-1".into(), "eid-2".into()], 2)
    }

    #[test]
    fn test_status_terminal_check() {
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::Stopped.is_terminal());
        assert!(!BatchStatus::Pending.is_terminal());
        assert!(!BatchStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(BatchStatus::Running.to_string(), "RUNNING");
        assert_eq!(
            "STOPPED".parse::<BatchStatus>().unwrap(),
            BatchStatus::Stopped
        );
        assert!("running".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&BatchStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
        let parsed: BatchStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, BatchStatus::Completed);
    }

    #[test]
    fn test_counter_invariant_holds_per_outcome() {
        let mut batch = sample_batch();
        batch.record_outcome(&WorkflowOutcome::Success);
        assert_eq!(batch.processed_count, 1);
        assert_eq!(
            batch.processed_count,
            batch.success_count + batch.failure_count
        );

        batch.record_outcome(&WorkflowOutcome::failure("activation timed out"));
        assert_eq!(batch.processed_count, 2);
        assert_eq!(batch.success_count, 1);
        assert_eq!(batch.failure_count, 1);
        assert!(batch.all_processed());
    }

    #[test]
    fn test_new_batch_starts_pending() {
        let batch = sample_batch();
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.total_eids(), 2);
        assert_eq!(batch.processed_count, 0);
        assert!(batch.started_at.is_none());
    }
}
