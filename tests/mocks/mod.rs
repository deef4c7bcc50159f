//! Mock provider for exercising the orchestration core without a real
//! provisioning API.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use esim_batch_core::error::{ProviderError, ProviderResult};
use esim_batch_core::models::CarrierPlanIds;
use esim_batch_core::provider::types::{
    ConnectionProfileEntry, EsimEntry, OperationResult, PollOutcome,
};
use esim_batch_core::provider::ProviderApi;
use esim_batch_core::request_id::generate_request_id;

/// Plan ids used across the integration tests.
pub fn plan_ids() -> CarrierPlanIds {
    CarrierPlanIds {
        tmo: "plan-tmo".to_string(),
        verizon: "plan-verizon".to_string(),
        global: "plan-global".to_string(),
        att: "plan-att".to_string(),
    }
}

/// What kind of operation a correlation id belongs to.
#[derive(Debug, Clone)]
enum SubmittedOp {
    Activation { eid: String },
    Info { eid: String },
    Assign { eid: String, plan_id: String },
}

#[derive(Debug, Default)]
struct MockState {
    requests: HashMap<String, SubmittedOp>,
    /// Last plan assigned per EID, driving `planChangeStatus` in info polls.
    last_assignment: HashMap<String, String>,
    /// Every (eid, plan) assignment submitted, in order.
    assignment_log: Vec<(String, String)>,
    /// Info requests submitted per EID, for stall scheduling.
    info_submissions: HashMap<String, usize>,
    /// Correlation ids whose polls never resolve.
    stalled_requests: HashSet<String>,
}

/// Scripted in-memory provider.
///
/// Default behavior is the happy path: activation acknowledged and
/// confirmed, device online and active immediately, every plan change
/// reported `SUCCESS`. Builder methods inject per-EID failure modes.
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
    /// Activation result polls never resolve for these EIDs.
    activation_pending: HashSet<String>,
    /// Activation result resolves with `success == false`.
    activation_rejected: HashSet<String>,
    /// Info entries always report `active == false`.
    never_active: HashSet<String>,
    /// Device status reported as OFFLINE instead of ONLINE.
    offline: HashSet<String>,
    /// Plan acknowledgement polls resolve with `success == false`.
    ack_rejected: HashSet<(String, String)>,
    /// Override of `planChangeStatus` per (eid, plan).
    plan_change: HashMap<(String, String), String>,
    /// Plans already attached and active before the run.
    preactivated: HashMap<String, Vec<String>>,
    /// Span of info requests per EID whose result polls never resolve,
    /// as (skip, count) over the submission order.
    info_stalled: HashMap<String, (usize, usize)>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activation_pending(mut self, eid: &str) -> Self {
        self.activation_pending.insert(eid.to_string());
        self
    }

    pub fn activation_rejected(mut self, eid: &str) -> Self {
        self.activation_rejected.insert(eid.to_string());
        self
    }

    pub fn never_active(mut self, eid: &str) -> Self {
        self.never_active.insert(eid.to_string());
        self
    }

    pub fn offline(mut self, eid: &str) -> Self {
        self.offline.insert(eid.to_string());
        self
    }

    pub fn ack_rejected(mut self, eid: &str, plan_id: &str) -> Self {
        self.ack_rejected
            .insert((eid.to_string(), plan_id.to_string()));
        self
    }

    pub fn plan_change_status(mut self, eid: &str, plan_id: &str, status: &str) -> Self {
        self.plan_change
            .insert((eid.to_string(), plan_id.to_string()), status.to_string());
        self
    }

    /// Result polls for `count` info requests, after the first `skip`, time
    /// out instead of resolving.
    pub fn info_polls_stalled(mut self, eid: &str, skip: usize, count: usize) -> Self {
        self.info_stalled.insert(eid.to_string(), (skip, count));
        self
    }

    pub fn preactivated(mut self, eid: &str, plan_id: &str) -> Self {
        self.preactivated
            .entry(eid.to_string())
            .or_default()
            .push(plan_id.to_string());
        self
    }

    /// Plans this EID was asked to assign, in submission order.
    pub fn assignments_for(&self, eid: &str) -> Vec<String> {
        self.state
            .lock()
            .assignment_log
            .iter()
            .filter(|(e, _)| e == eid)
            .map(|(_, plan)| plan.clone())
            .collect()
    }

    fn info_entry(&self, eid: &str) -> EsimEntry {
        let state = self.state.lock();
        let last_plan = state.last_assignment.get(eid).cloned();
        let plan_change_status = last_plan.as_ref().map(|plan| {
            self.plan_change
                .get(&(eid.to_string(), plan.clone()))
                .cloned()
                .unwrap_or_else(|| "SUCCESS".to_string())
        });
        let iccid = last_plan
            .as_ref()
            .map(|plan| format!("89-{eid}-{plan}"));
        EsimEntry {
            eid: Some(eid.to_string()),
            active: !self.never_active.contains(eid),
            device_status: Some(if self.offline.contains(eid) {
                "OFFLINE".to_string()
            } else {
                "ONLINE".to_string()
            }),
            plan_change_status,
            iccid,
            connection_profile_entries: self
                .preactivated
                .get(eid)
                .map(|plans| {
                    plans
                        .iter()
                        .map(|plan| ConnectionProfileEntry {
                            plan_uuid: Some(plan.clone()),
                            active: true,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            last_connected_network: None,
        }
    }
}

#[async_trait]
impl ProviderApi for MockProvider {
    async fn activate(&self, eid: &str) -> ProviderResult<String> {
        let request_id = generate_request_id();
        self.state.lock().requests.insert(
            request_id.clone(),
            SubmittedOp::Activation {
                eid: eid.to_string(),
            },
        );
        Ok(request_id)
    }

    async fn fetch_info(&self, eid: &str, request_id: &str) -> ProviderResult<()> {
        let mut state = self.state.lock();
        let seq = {
            let counter = state.info_submissions.entry(eid.to_string()).or_insert(0);
            let seq = *counter;
            *counter += 1;
            seq
        };
        if let Some(&(skip, count)) = self.info_stalled.get(eid) {
            if seq >= skip && seq < skip + count {
                state.stalled_requests.insert(request_id.to_string());
            }
        }
        state.requests.insert(
            request_id.to_string(),
            SubmittedOp::Info {
                eid: eid.to_string(),
            },
        );
        Ok(())
    }

    async fn assign_plan(&self, eid: &str, plan_id: &str) -> ProviderResult<String> {
        let request_id = generate_request_id();
        let mut state = self.state.lock();
        state.requests.insert(
            request_id.clone(),
            SubmittedOp::Assign {
                eid: eid.to_string(),
                plan_id: plan_id.to_string(),
            },
        );
        state
            .last_assignment
            .insert(eid.to_string(), plan_id.to_string());
        state
            .assignment_log
            .push((eid.to_string(), plan_id.to_string()));
        Ok(request_id)
    }

    async fn poll_result(&self, request_id: &str) -> ProviderResult<PollOutcome> {
        let op = self
            .state
            .lock()
            .requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| ProviderError::Transport {
                operation: "poll_result",
                reason: format!("unknown request id {request_id}"),
            })?;
        let outcome = match op {
            SubmittedOp::Activation { eid } => {
                if self.activation_pending.contains(&eid) {
                    PollOutcome::Pending
                } else {
                    PollOutcome::Ready(OperationResult {
                        success: !self.activation_rejected.contains(&eid),
                        entries: vec![],
                    })
                }
            }
            SubmittedOp::Assign { eid, plan_id } => PollOutcome::Ready(OperationResult {
                success: !self.ack_rejected.contains(&(eid, plan_id)),
                entries: vec![],
            }),
            SubmittedOp::Info { eid } => {
                if self.state.lock().stalled_requests.contains(request_id) {
                    PollOutcome::Pending
                } else {
                    PollOutcome::Ready(OperationResult {
                        success: true,
                        entries: vec![self.info_entry(&eid)],
                    })
                }
            }
        };
        Ok(outcome)
    }
}

/// Convenience wrapper for tests that need the concrete mock and the trait
/// object at once.
pub fn shared(provider: MockProvider) -> (Arc<MockProvider>, Arc<dyn ProviderApi>) {
    let concrete = Arc::new(provider);
    let api: Arc<dyn ProviderApi> = concrete.clone();
    (concrete, api)
}
