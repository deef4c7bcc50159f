//! Configuration for provider endpoints and workflow pacing.
//!
//! Every wall-clock wait in the workflow is a named duration here so the
//! state machine can be exercised against a fake provider with near-zero
//! delays. Defaults mirror the pacing the provisioning provider tolerates
//! in production.

use std::time::Duration;

/// Provider endpoint configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provisioning API, without a trailing slash.
    pub base_url: String,
    /// Optional callback URL forwarded to the provider on submit operations.
    pub callback_url: Option<String>,
    /// Per-request HTTP timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://integrationapi.teal.global/api/v1".to_string(),
            callback_url: None,
            request_timeout_ms: 30_000,
        }
    }
}

/// Named durations and retry budgets for every workflow step.
#[derive(Debug, Clone)]
pub struct WorkflowTimings {
    /// Grace delay between submitting an activation and the first poll.
    pub activation_grace: Duration,
    /// Interval between activation result polls.
    pub activation_poll_interval: Duration,
    /// Total budget for the activation confirmation poll.
    pub activation_max_wait: Duration,
    /// Delay between submitting an info request and polling its result.
    pub info_settle: Duration,
    /// Interval between info/acknowledgement result polls.
    pub result_poll_interval: Duration,
    /// Total budget for info and plan-acknowledgement polls.
    pub result_max_wait: Duration,
    /// Bounded attempts for the active-state check.
    pub active_check_attempts: u32,
    /// Delay between active-state check attempts.
    pub active_recheck_delay: Duration,
    /// Single grace wait applied when the device is not reachable before a
    /// plan assignment.
    pub offline_grace: Duration,
    /// Settling delay between a plan acknowledgement and the status check.
    pub plan_settle: Duration,
}

impl Default for WorkflowTimings {
    fn default() -> Self {
        Self {
            activation_grace: Duration::from_secs(30),
            activation_poll_interval: Duration::from_secs(10),
            activation_max_wait: Duration::from_secs(300),
            info_settle: Duration::from_secs(30),
            result_poll_interval: Duration::from_secs(10),
            result_max_wait: Duration::from_secs(60),
            active_check_attempts: 8,
            active_recheck_delay: Duration::from_secs(120),
            offline_grace: Duration::from_secs(120),
            plan_settle: Duration::from_secs(240),
        }
    }
}

impl WorkflowTimings {
    /// Millisecond-scale timings for tests: the same state machine, three
    /// orders of magnitude faster.
    pub fn fast() -> Self {
        Self {
            activation_grace: Duration::from_millis(1),
            activation_poll_interval: Duration::from_millis(5),
            activation_max_wait: Duration::from_millis(50),
            info_settle: Duration::from_millis(1),
            result_poll_interval: Duration::from_millis(5),
            result_max_wait: Duration::from_millis(50),
            active_check_attempts: 3,
            active_recheck_delay: Duration::from_millis(5),
            offline_grace: Duration::from_millis(5),
            plan_settle: Duration::from_millis(1),
        }
    }
}
