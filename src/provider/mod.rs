//! All network interaction with the provisioning provider.
//!
//! [`ProviderApi`] is the seam the workflow depends on: three submit
//! operations plus the generic operation-result poll. [`HttpProviderClient`]
//! is the production implementation; tests supply their own.

pub mod client;
pub mod poller;
pub mod types;

pub use client::{HttpProviderClient, ProviderCredentials};
pub use poller::OperationPoller;
pub use types::{
    ConnectionProfileEntry, EsimEntry, LastConnectedNetwork, OperationResult, PollOutcome,
};

use crate::error::ProviderResult;
use async_trait::async_trait;

/// The provider operations the workflow drives.
///
/// Submit operations return the correlation id the caller later polls with;
/// `poll_result` converts the provider's "still processing" status into
/// [`PollOutcome::Pending`] instead of an error.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Submit an activation request for one EID.
    async fn activate(&self, eid: &str) -> ProviderResult<String>;

    /// Submit an asynchronous info request under the given correlation id.
    async fn fetch_info(&self, eid: &str, request_id: &str) -> ProviderResult<()>;

    /// Submit a plan-assignment request for one EID.
    async fn assign_plan(&self, eid: &str, plan_id: &str) -> ProviderResult<String>;

    /// Fetch the outcome of a previously submitted asynchronous operation.
    async fn poll_result(&self, request_id: &str) -> ProviderResult<PollOutcome>;
}
