//! # eSIM Batch Activation Orchestrator
//!
//! Core engine for bulk eSIM provisioning: given a batch of device
//! identifiers (EIDs), activate each one with a remote provisioning
//! provider, wait for asynchronous confirmation, then sequentially attach
//! four carrier-specific service plans, each with its own activation
//! handshake and confirmation poll.
//!
//! ## Architecture
//!
//! Each EID traverses an explicit state machine ([`workflow`]) against a
//! slow, eventually-consistent provider API ([`provider`]). A batch runs
//! many EIDs concurrently under a bounded worker pool, with all counter
//! mutation funneled through a single aggregator ([`coordinator`]). State
//! is persisted through the [`sink`] seam; the storage technology behind it
//! is an external collaborator.
//!
//! ## Module Organization
//!
//! - [`models`] - Batch, per-EID record, carriers, and log line types
//! - [`provider`] - Authenticated HTTP client and operation polling
//! - [`workflow`] - The per-EID activation state machine
//! - [`coordinator`] - Bounded fan-out and single-writer aggregation
//! - [`sink`] - Persistence seam consumed by the orchestrator
//! - [`events`] - Broadcast progress events
//! - [`shutdown`] - Cooperative stop signal
//! - [`config`] - Endpoint configuration and named step timings
//! - [`error`] - Structured error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use esim_batch_core::config::ProviderConfig;
//! use esim_batch_core::coordinator::BatchCoordinator;
//! use esim_batch_core::models::{Batch, CarrierPlanIds};
//! use esim_batch_core::provider::{HttpProviderClient, ProviderCredentials};
//! use esim_batch_core::sink::MemorySink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpProviderClient::new(
//!     ProviderConfig::default(),
//!     ProviderCredentials::new("api-key", "api-secret"),
//! )?;
//! let sink = Arc::new(MemorySink::new());
//! let coordinator = BatchCoordinator::new(Arc::new(client), sink);
//!
//! let batch = Batch::new("us-wave-1", vec!["8988".to_string()], 5);
//! let plan_ids = CarrierPlanIds {
//!     tmo: "plan-tmo".into(),
//!     verizon: "plan-verizon".into(),
//!     global: "plan-global".into(),
//!     att: "plan-att".into(),
//! };
//!
//! let handle = coordinator.run(batch, plan_ids).await?;
//! let finished = handle.wait().await?;
//! println!("{} succeeded, {} failed", finished.success_count, finished.failure_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod provider;
pub mod request_id;
pub mod shutdown;
pub mod sink;
pub mod workflow;

pub use config::{ProviderConfig, WorkflowTimings};
pub use coordinator::{BatchCoordinator, BatchHandle};
pub use error::{BatchError, ProviderError, SinkError};
pub use models::{Batch, BatchStatus, Carrier, CarrierPlanIds, EsimRecord};
pub use provider::{HttpProviderClient, ProviderApi, ProviderCredentials};
pub use sink::{MemorySink, ResultSink};
pub use workflow::{ActivationWorkflow, WorkflowOutcome};
