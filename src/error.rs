//! Error types for the batch activation orchestrator.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by provider interaction and polling.
///
/// Every variant is terminal for the workflow step that observes it; the
/// workflow boundary converts it into a per-EID failure without touching
/// sibling EIDs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network failure or non-2xx HTTP response.
    #[error("transport error during {operation}: {reason}")]
    Transport {
        operation: &'static str,
        reason: String,
    },
    /// The provider answered with an explicit non-success payload.
    #[error("provider rejected {operation} request")]
    Rejected { operation: &'static str },
    /// The response body could not be interpreted.
    #[error("malformed provider response for {operation}: {reason}")]
    MalformedResponse {
        operation: &'static str,
        reason: String,
    },
    /// No terminal operation result arrived within the polling budget.
    #[error("no result for request {request_id} within {waited:?}")]
    PollTimeout { request_id: String, waited: Duration },
    /// The surrounding batch was stopped while waiting.
    #[error("operation cancelled by batch stop")]
    Cancelled,
}

impl ProviderError {
    /// True when the error is the cooperative stop signal rather than a
    /// provider-side failure. Kept distinguishable so logs and records can
    /// tell a stopped batch from a failed one.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failures surfaced by the result sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("result sink error: {0}")]
pub struct SinkError(pub String);

pub type SinkResult<T> = Result<T, SinkError>;

/// Coordinator-level errors that abort a batch before or during fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("batch {batch_id} has no EIDs to process")]
    EmptyBatch { batch_id: Uuid },
    #[error("batch {batch_id} is {current}, expected {expected}")]
    InvalidState {
        batch_id: Uuid,
        current: String,
        expected: String,
    },
    #[error("batch {batch_id} run task failed: {reason}")]
    RunFailed { batch_id: Uuid, reason: String },
    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type BatchResult<T> = Result<T, BatchError>;
