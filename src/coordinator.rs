//! Batch fan-out and result aggregation.
//!
//! One coordinator run per batch: mark it running, execute the activation
//! workflow for every EID under a semaphore sized to the batch concurrency
//! cap (the sole admission-control mechanism against the rate-sensitive
//! provider API), and funnel every terminal outcome through a single
//! aggregator loop so the batch counters never race.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::WorkflowTimings;
use crate::error::{BatchError, BatchResult};
use crate::events::{names, ProgressPublisher};
use crate::models::{Batch, BatchStatus, CarrierPlanIds, LogLevel};
use crate::provider::ProviderApi;
use crate::shutdown::{stop_channel, StopHandle, StopSignal};
use crate::sink::ResultSink;
use crate::workflow::{ActivationWorkflow, WorkflowOutcome};

/// Handle to a scheduled batch run.
///
/// `run` returns once scheduling is complete, mirroring a fire-and-forget
/// background job; callers that want the final aggregate await [`wait`].
///
/// [`wait`]: BatchHandle::wait
#[derive(Debug)]
pub struct BatchHandle {
    batch_id: Uuid,
    stop: StopHandle,
    join: JoinHandle<Batch>,
}

impl BatchHandle {
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Request a cooperative stop: in-flight workflows finish their current
    /// step, then abort with a "stopped" failure.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Await the run and return the final batch aggregate.
    pub async fn wait(self) -> BatchResult<Batch> {
        let batch_id = self.batch_id;
        self.join.await.map_err(|e| BatchError::RunFailed {
            batch_id,
            reason: e.to_string(),
        })
    }
}

/// Fan-out and aggregation for one batch at a time.
pub struct BatchCoordinator {
    provider: Arc<dyn ProviderApi>,
    sink: Arc<dyn ResultSink>,
    timings: WorkflowTimings,
    events: ProgressPublisher,
}

impl BatchCoordinator {
    pub fn new(provider: Arc<dyn ProviderApi>, sink: Arc<dyn ResultSink>) -> Self {
        Self::with_timings(provider, sink, WorkflowTimings::default())
    }

    pub fn with_timings(
        provider: Arc<dyn ProviderApi>,
        sink: Arc<dyn ResultSink>,
        timings: WorkflowTimings,
    ) -> Self {
        Self {
            provider,
            sink,
            timings,
            events: ProgressPublisher::default(),
        }
    }

    /// Progress event publisher; subscribe before calling [`run`].
    ///
    /// [`run`]: BatchCoordinator::run
    pub fn events(&self) -> &ProgressPublisher {
        &self.events
    }

    /// Schedule a pending batch.
    ///
    /// Marks the batch `Running`, fans out one workflow task per EID, and
    /// returns once scheduling is handed off. Pre-flight failures (already
    /// processed batch, no EIDs) mark the batch `Failed` before any EID
    /// starts and surface as an error.
    #[instrument(skip(self, batch, plan_ids), fields(batch_id = %batch.id, total_eids = batch.total_eids()))]
    pub async fn run(
        &self,
        mut batch: Batch,
        plan_ids: CarrierPlanIds,
    ) -> BatchResult<BatchHandle> {
        if batch.status != BatchStatus::Pending {
            return Err(BatchError::InvalidState {
                batch_id: batch.id,
                current: batch.status.to_string(),
                expected: BatchStatus::Pending.to_string(),
            });
        }
        if batch.eids.is_empty() {
            batch.status = BatchStatus::Failed;
            self.sink
                .set_batch_status(batch.id, BatchStatus::Failed, batch.timestamps())
                .await?;
            sink_log(
                &self.sink,
                batch.id,
                LogLevel::Error,
                "No EIDs found in batch",
            )
            .await;
            self.events.publish(
                names::BATCH_FAILED,
                batch.id,
                None,
                json!({"reason": "no EIDs"}),
            );
            return Err(BatchError::EmptyBatch { batch_id: batch.id });
        }

        batch.status = BatchStatus::Running;
        batch.started_at = Some(chrono::Utc::now());
        self.sink
            .set_batch_status(batch.id, BatchStatus::Running, batch.timestamps())
            .await?;
        sink_log(
            &self.sink,
            batch.id,
            LogLevel::Info,
            &format!("Batch processing started with {} EIDs", batch.total_eids()),
        )
        .await;
        self.events.publish(
            names::BATCH_STARTED,
            batch.id,
            None,
            json!({"total_eids": batch.total_eids(), "max_concurrency": batch.max_concurrency}),
        );

        let (stop_handle, stop_signal) = stop_channel();
        let batch_id = batch.id;
        let join = tokio::spawn(drive_batch(
            batch,
            plan_ids,
            self.provider.clone(),
            self.sink.clone(),
            self.timings.clone(),
            self.events.clone(),
            stop_signal,
        ));

        Ok(BatchHandle {
            batch_id,
            stop: stop_handle,
            join,
        })
    }
}

/// The background run: fan-out, aggregation, and the final lifecycle
/// transition. Owns the batch aggregate for the duration of the run.
async fn drive_batch(
    mut batch: Batch,
    plan_ids: CarrierPlanIds,
    provider: Arc<dyn ProviderApi>,
    sink: Arc<dyn ResultSink>,
    timings: WorkflowTimings,
    events: ProgressPublisher,
    stop: StopSignal,
) -> Batch {
    let batch_id = batch.id;
    // The cap holds even when the batch declares more EIDs than permits.
    let semaphore = Arc::new(Semaphore::new(batch.max_concurrency.max(1)));
    let (outcome_tx, mut outcome_rx) =
        mpsc::channel::<(String, WorkflowOutcome)>(batch.total_eids().max(1));

    for eid in batch.eids.clone() {
        let semaphore = semaphore.clone();
        let workflow = ActivationWorkflow::new(
            provider.clone(),
            sink.clone(),
            timings.clone(),
            batch_id,
            plan_ids.clone(),
            stop.clone(),
        );
        let events = events.clone();
        let outcome_tx = outcome_tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            events.publish(names::EID_STARTED, batch_id, Some(&eid), json!({}));
            let outcome = workflow.run(&eid).await;
            let event_name = if outcome.is_success() {
                names::EID_COMPLETED
            } else {
                names::EID_FAILED
            };
            events.publish(event_name, batch_id, Some(&eid), json!({}));
            let _ = outcome_tx.send((eid, outcome)).await;
        });
    }
    drop(outcome_tx);

    // Single-writer aggregation: all counter mutation happens here, in
    // arrival order, so concurrent finishers can never lose an update.
    let mut stop_watch = stop.clone();
    let mut stop_observed = false;
    loop {
        tokio::select! {
            next = outcome_rx.recv() => {
                let Some((eid, outcome)) = next else { break };
                batch.record_outcome(&outcome);
                let increment = match &outcome {
                    WorkflowOutcome::Success => sink.increment_batch_success(batch_id).await,
                    WorkflowOutcome::Failure { .. } => sink.increment_batch_failure(batch_id).await,
                };
                if let Err(err) = increment {
                    warn!(batch_id = %batch_id, eid = %eid, error = %err, "Failed to persist batch counter");
                }
                info!(
                    batch_id = %batch_id,
                    eid = %eid,
                    success = outcome.is_success(),
                    processed = batch.processed_count,
                    total = batch.total_eids(),
                    "EID workflow terminal"
                );
            }
            _ = stop_watch.stopped(), if !stop_observed => {
                stop_observed = true;
                mark_stopped(&mut batch, &sink, &events).await;
            }
        }
    }

    if stop.is_stopped() {
        // Stop raced the last outcomes; the status must still end Stopped,
        // never silently flip to Completed.
        if !stop_observed {
            mark_stopped(&mut batch, &sink, &events).await;
        }
    } else if batch.status == BatchStatus::Running {
        batch.status = BatchStatus::Completed;
        batch.completed_at = Some(chrono::Utc::now());
        if let Err(err) = sink
            .set_batch_status(batch_id, BatchStatus::Completed, batch.timestamps())
            .await
        {
            warn!(batch_id = %batch_id, error = %err, "Failed to persist batch completion");
        }
        sink_log(
            &sink,
            batch_id,
            LogLevel::Info,
            &format!(
                "Batch processing completed: {} succeeded, {} failed",
                batch.success_count, batch.failure_count
            ),
        )
        .await;
        events.publish(
            names::BATCH_COMPLETED,
            batch_id,
            None,
            json!({
                "success_count": batch.success_count,
                "failure_count": batch.failure_count,
            }),
        );
    }

    batch
}

async fn mark_stopped(batch: &mut Batch, sink: &Arc<dyn ResultSink>, events: &ProgressPublisher) {
    batch.status = BatchStatus::Stopped;
    if let Err(err) = sink
        .set_batch_status(batch.id, BatchStatus::Stopped, batch.timestamps())
        .await
    {
        warn!(batch_id = %batch.id, error = %err, "Failed to persist batch stop");
    }
    sink_log(
        sink,
        batch.id,
        LogLevel::Warning,
        "Batch stop requested, in-flight EIDs will abort after their current step",
    )
    .await;
    events.publish(names::BATCH_STOPPED, batch.id, None, json!({}));
}

/// Best-effort log append; persistence failures must not abort the batch.
async fn sink_log(sink: &Arc<dyn ResultSink>, batch_id: Uuid, level: LogLevel, message: &str) {
    if let Err(err) = sink.append_log(batch_id, level, message, None).await {
        warn!(batch_id = %batch_id, error = %err, "Failed to persist batch log line");
    }
}
