//! The per-EID activation state machine.
//!
//! One run drives a single EID through activation, activation confirmation,
//! the bounded active-state check, and the sequential per-carrier plan
//! assignment loop. Every checkpoint is written to the EID's record before
//! the workflow advances, so a crash mid-run leaves a resumable trace. The
//! first fatal error ends the run; downstream carriers are never attempted.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::states::WorkflowPhase;
use super::WorkflowOutcome;
use crate::config::WorkflowTimings;
use crate::error::{ProviderError, SinkError};
use crate::models::{Carrier, CarrierPlanIds, EsimPatch, LogLevel};
use crate::provider::types::{DEVICE_STATUS_ONLINE, EsimEntry};
use crate::provider::{OperationPoller, ProviderApi};
use crate::request_id::generate_request_id;
use crate::shutdown::StopSignal;
use crate::sink::ResultSink;

/// Fatal conditions that terminate one EID's run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("activation failed or timed out")]
    ActivationRejected,
    #[error("eSIM not active after {attempts} attempts")]
    NeverActive { attempts: u32 },
    #[error("no entries in eSIM info result")]
    EmptyInfoResult,
    #[error("plan assignment rejected for {carrier}")]
    PlanAckRejected { carrier: Carrier },
    #[error("plan change status was {status} for {carrier}")]
    PlanChangeFailed { carrier: Carrier, status: String },
    #[error("batch stopped")]
    Stopped,
}

impl WorkflowError {
    /// True when the run ended because the batch was stopped, not because
    /// of a provider-side failure.
    fn is_stop(&self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Provider(ProviderError::Cancelled)
        )
    }
}

/// Drives one EID at a time; the coordinator creates one instance per EID
/// task. Never shares mutable state with sibling workflows.
pub struct ActivationWorkflow {
    provider: Arc<dyn ProviderApi>,
    poller: OperationPoller,
    sink: Arc<dyn ResultSink>,
    timings: WorkflowTimings,
    batch_id: Uuid,
    plan_ids: CarrierPlanIds,
    stop: StopSignal,
}

impl ActivationWorkflow {
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        sink: Arc<dyn ResultSink>,
        timings: WorkflowTimings,
        batch_id: Uuid,
        plan_ids: CarrierPlanIds,
        stop: StopSignal,
    ) -> Self {
        let poller = OperationPoller::new(provider.clone());
        Self {
            provider,
            poller,
            sink,
            timings,
            batch_id,
            plan_ids,
            stop,
        }
    }

    /// Run the full state machine for one EID.
    ///
    /// Every fatal condition is caught here, written once as the record's
    /// error message, logged, and converted into a terminal outcome; it
    /// never propagates to sibling EIDs.
    #[instrument(skip(self), fields(batch_id = %self.batch_id))]
    pub async fn run(&self, eid: &str) -> WorkflowOutcome {
        let outcome = match self.execute(eid).await {
            Ok(()) => WorkflowOutcome::Success,
            Err(err) => {
                self.enter(eid, WorkflowPhase::Failed);
                let reason = if err.is_stop() {
                    "stopped".to_string()
                } else {
                    err.to_string()
                };
                let level = if err.is_stop() {
                    LogLevel::Warning
                } else {
                    LogLevel::Error
                };
                self.log(level, format!("Error processing {eid}: {reason}"), Some(eid))
                    .await;
                // Best effort: the sink may be the thing that failed.
                let _ = self
                    .sink
                    .upsert_esim_record(self.batch_id, eid, EsimPatch::error(&reason))
                    .await;
                WorkflowOutcome::failure(reason)
            }
        };
        let _ = self
            .sink
            .upsert_esim_record(self.batch_id, eid, EsimPatch::finished(Utc::now()))
            .await;
        outcome
    }

    async fn execute(&self, eid: &str) -> Result<(), WorkflowError> {
        self.enter(eid, WorkflowPhase::Created);
        self.sink
            .upsert_esim_record(self.batch_id, eid, EsimPatch::started(Utc::now()))
            .await?;
        self.log(
            LogLevel::Info,
            format!("Starting processing for EID {eid}"),
            Some(eid),
        )
        .await;

        // Activation submit; the correlation id is recorded before any
        // confirmation arrives.
        self.enter(eid, WorkflowPhase::Activating);
        self.ensure_not_stopped()?;
        let activation_request_id = self.provider.activate(eid).await?;
        self.sink
            .upsert_esim_record(
                self.batch_id,
                eid,
                EsimPatch::activation_request(&activation_request_id),
            )
            .await?;
        self.log(
            LogLevel::Info,
            format!("Activation initiated with request id {activation_request_id}"),
            Some(eid),
        )
        .await;

        // Activation confirmation. Failure or timeout here is fatal; no
        // carrier plan assignment proceeds.
        self.enter(eid, WorkflowPhase::AwaitingActivation);
        self.pause(self.timings.activation_grace).await?;
        let activation = self
            .poller
            .wait_for_result(
                &activation_request_id,
                self.timings.activation_poll_interval,
                self.timings.activation_max_wait,
                &self.stop,
            )
            .await?;
        if !activation.success {
            return Err(WorkflowError::ActivationRejected);
        }
        self.log(
            LogLevel::Info,
            format!("Activation successful for {eid}"),
            Some(eid),
        )
        .await;

        self.confirm_active(eid).await?;

        for carrier in Carrier::ALL {
            self.assign_carrier(eid, carrier).await?;
        }

        self.enter(eid, WorkflowPhase::Complete);
        self.log(
            LogLevel::Info,
            format!("Successfully processed all plans for {eid}"),
            Some(eid),
        )
        .await;
        Ok(())
    }

    /// The provider needs time to mark the eSIM physically active; poll up
    /// to a fixed number of attempts. Exhausting the budget is fatal, with
    /// no partial credit.
    async fn confirm_active(&self, eid: &str) -> Result<(), WorkflowError> {
        let attempts = self.timings.active_check_attempts;
        for attempt in 1..=attempts {
            self.enter(eid, WorkflowPhase::CheckingActive { attempt });
            // A timed-out info poll proves nothing; it consumes the attempt
            // the same way an inactive report does.
            let active = match self.require_entry(eid).await {
                Ok(entry) => entry.active,
                Err(WorkflowError::Provider(ProviderError::PollTimeout { .. })) => false,
                Err(err) => return Err(err),
            };
            if active {
                self.log(LogLevel::Info, format!("eSIM {eid} is now active"), Some(eid))
                    .await;
                return Ok(());
            }
            if attempt < attempts {
                self.log(
                    LogLevel::Info,
                    format!("eSIM not active yet, retrying (attempt {attempt}/{attempts})"),
                    Some(eid),
                )
                .await;
                self.pause(self.timings.active_recheck_delay).await?;
            }
        }
        Err(WorkflowError::NeverActive { attempts })
    }

    /// One carrier's full assignment handshake: reachability check, submit,
    /// acknowledgement poll, settling delay, plan-change confirmation.
    async fn assign_carrier(&self, eid: &str, carrier: Carrier) -> Result<(), WorkflowError> {
        self.enter(eid, WorkflowPhase::AssigningPlan { carrier });
        let plan_id = self.plan_ids.plan_for(carrier).to_string();

        // The plan may already be attached and active from an earlier run.
        if self.plan_already_active(eid, &plan_id).await? {
            self.log(
                LogLevel::Info,
                format!("{carrier} plan already active, skipping assignment"),
                Some(eid),
            )
            .await;
            self.sink
                .upsert_esim_record(
                    self.batch_id,
                    eid,
                    EsimPatch::plan_confirmed(
                        carrier,
                        "Already active",
                        "SUCCESS",
                        Utc::now().to_rfc3339(),
                    ),
                )
                .await?;
            return Ok(());
        }

        // Single best-effort grace wait when the device is not confirmably
        // online; the assignment proceeds either way. A timed-out info poll
        // counts as unknown status, not a failure. TODO: apply the same
        // bounded-retry pattern as confirm_active once requirements confirm
        // it.
        let device_status = match self.require_entry(eid).await {
            Ok(entry) => entry
                .device_status
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            Err(WorkflowError::Provider(ProviderError::PollTimeout { .. })) => {
                "UNKNOWN".to_string()
            }
            Err(err) => return Err(err),
        };
        if device_status != DEVICE_STATUS_ONLINE {
            self.log(
                LogLevel::Warning,
                format!(
                    "Device status is {device_status}, waiting before {carrier} plan assignment"
                ),
                Some(eid),
            )
            .await;
            self.pause(self.timings.offline_grace).await?;
        }

        self.log(
            LogLevel::Info,
            format!("Assigning {carrier} plan to {eid}"),
            Some(eid),
        )
        .await;
        let plan_request_id = self.provider.assign_plan(eid, &plan_id).await?;
        self.sink
            .upsert_esim_record(
                self.batch_id,
                eid,
                EsimPatch::plan_request(carrier, &plan_request_id),
            )
            .await?;

        self.enter(eid, WorkflowPhase::AwaitingPlanAck { carrier });
        self.pause(self.timings.info_settle).await?;
        let ack = self
            .poller
            .wait_for_result(
                &plan_request_id,
                self.timings.result_poll_interval,
                self.timings.result_max_wait,
                &self.stop,
            )
            .await?;
        if !ack.success {
            return Err(WorkflowError::PlanAckRejected { carrier });
        }
        self.log(
            LogLevel::Info,
            format!("Plan assignment acknowledged for {carrier}"),
            Some(eid),
        )
        .await;

        self.enter(eid, WorkflowPhase::ConfirmingPlan { carrier });
        self.pause(self.timings.plan_settle).await?;
        let entry = self.require_entry(eid).await?;
        if !entry.plan_change_succeeded() {
            return Err(WorkflowError::PlanChangeFailed {
                carrier,
                status: entry
                    .plan_change_status
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
            });
        }

        let iccid = entry.iccid.clone().unwrap_or_else(|| "N/A".to_string());
        let confirmed_at = entry
            .network_timestamp()
            .map(str::to_string)
            .unwrap_or_else(|| Utc::now().to_rfc3339());
        self.sink
            .upsert_esim_record(
                self.batch_id,
                eid,
                EsimPatch::plan_confirmed(carrier, &iccid, "SUCCESS", confirmed_at),
            )
            .await?;
        self.log(
            LogLevel::Info,
            format!("{carrier} plan assigned successfully, ICCID {iccid}"),
            Some(eid),
        )
        .await;
        Ok(())
    }

    /// Check whether the plan is already attached and active. A poll timeout
    /// cannot prove it, so the answer is then "no" and the full handshake
    /// runs.
    async fn plan_already_active(
        &self,
        eid: &str,
        plan_id: &str,
    ) -> Result<bool, WorkflowError> {
        match self.fetch_entry(eid).await {
            Ok(Some(entry)) => Ok(entry.has_active_plan(plan_id)),
            Ok(None) => Ok(false),
            Err(WorkflowError::Provider(ProviderError::PollTimeout { .. })) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Submit a fresh info request and poll its result, returning the single
    /// entry the request is limited to.
    async fn fetch_entry(&self, eid: &str) -> Result<Option<EsimEntry>, WorkflowError> {
        let request_id = generate_request_id();
        self.provider.fetch_info(eid, &request_id).await?;
        self.pause(self.timings.info_settle).await?;
        let result = self
            .poller
            .wait_for_result(
                &request_id,
                self.timings.result_poll_interval,
                self.timings.result_max_wait,
                &self.stop,
            )
            .await?;
        Ok(result.entries.into_iter().next())
    }

    async fn require_entry(&self, eid: &str) -> Result<EsimEntry, WorkflowError> {
        self.fetch_entry(eid)
            .await?
            .ok_or(WorkflowError::EmptyInfoResult)
    }

    /// Suspend for an inter-step delay, observing the stop signal.
    async fn pause(&self, duration: Duration) -> Result<(), WorkflowError> {
        if self.stop.sleep_unless_stopped(duration).await {
            Err(WorkflowError::Stopped)
        } else {
            Ok(())
        }
    }

    fn ensure_not_stopped(&self) -> Result<(), WorkflowError> {
        if self.stop.is_stopped() {
            Err(WorkflowError::Stopped)
        } else {
            Ok(())
        }
    }

    fn enter(&self, eid: &str, phase: WorkflowPhase) {
        debug!(batch_id = %self.batch_id, eid = %eid, phase = %phase, "Workflow phase transition");
    }

    /// Persist one structured log line. Log persistence is best effort; a
    /// sink hiccup here must not fail the workflow.
    async fn log(&self, level: LogLevel, message: String, eid: Option<&str>) {
        if let Err(err) = self
            .sink
            .append_log(self.batch_id, level, &message, eid)
            .await
        {
            warn!(batch_id = %self.batch_id, error = %err, "Failed to persist batch log line");
        }
    }
}
