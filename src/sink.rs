//! Persistence seam between the orchestrator and whatever stores batch state.
//!
//! The orchestrator consumes, never owns, the sink: storage technology is an
//! external collaborator. Every operation carries idempotent merge semantics
//! so overlapping or replayed writes cannot corrupt a record.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::SinkResult;
use crate::models::{
    BatchStatus, BatchTimestamps, EsimPatch, EsimRecord, LogEntry, LogLevel,
};

/// Consumed by the coordinator and workflows to persist incremental state.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Merge a partial update into one EID's record, creating it on first
    /// write. Replaying a patch with identical values must be a no-op.
    async fn upsert_esim_record(
        &self,
        batch_id: Uuid,
        eid: &str,
        patch: EsimPatch,
    ) -> SinkResult<()>;

    async fn increment_batch_success(&self, batch_id: Uuid) -> SinkResult<()>;

    async fn increment_batch_failure(&self, batch_id: Uuid) -> SinkResult<()>;

    async fn set_batch_status(
        &self,
        batch_id: Uuid,
        status: BatchStatus,
        timestamps: BatchTimestamps,
    ) -> SinkResult<()>;

    /// Append one structured log line for the batch.
    async fn append_log(
        &self,
        batch_id: Uuid,
        level: LogLevel,
        message: &str,
        eid: Option<&str>,
    ) -> SinkResult<()>;
}

/// Batch-level row kept by the in-memory sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRow {
    pub status: Option<BatchStatus>,
    pub success_count: u64,
    pub failure_count: u64,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl BatchRow {
    pub fn processed_count(&self) -> u64 {
        self.success_count + self.failure_count
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<(Uuid, String), EsimRecord>,
    batches: HashMap<Uuid, BatchRow>,
    logs: Vec<LogEntry>,
}

/// In-memory [`ResultSink`] used in tests and as a reference implementation
/// of the merge semantics.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, batch_id: Uuid, eid: &str) -> Option<EsimRecord> {
        self.state
            .lock()
            .records
            .get(&(batch_id, eid.to_string()))
            .cloned()
    }

    pub fn batch_row(&self, batch_id: Uuid) -> Option<BatchRow> {
        self.state.lock().batches.get(&batch_id).cloned()
    }

    pub fn logs(&self, batch_id: Uuid) -> Vec<LogEntry> {
        self.state
            .lock()
            .logs
            .iter()
            .filter(|entry| entry.batch_id == batch_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn upsert_esim_record(
        &self,
        batch_id: Uuid,
        eid: &str,
        patch: EsimPatch,
    ) -> SinkResult<()> {
        let mut state = self.state.lock();
        let record = state
            .records
            .entry((batch_id, eid.to_string()))
            .or_insert_with(|| EsimRecord::new(eid));
        record.apply(&patch);
        Ok(())
    }

    async fn increment_batch_success(&self, batch_id: Uuid) -> SinkResult<()> {
        self.state
            .lock()
            .batches
            .entry(batch_id)
            .or_default()
            .success_count += 1;
        Ok(())
    }

    async fn increment_batch_failure(&self, batch_id: Uuid) -> SinkResult<()> {
        self.state
            .lock()
            .batches
            .entry(batch_id)
            .or_default()
            .failure_count += 1;
        Ok(())
    }

    async fn set_batch_status(
        &self,
        batch_id: Uuid,
        status: BatchStatus,
        timestamps: BatchTimestamps,
    ) -> SinkResult<()> {
        let mut state = self.state.lock();
        let row = state.batches.entry(batch_id).or_default();
        row.status = Some(status);
        if let Some(started) = timestamps.started_at {
            row.started_at = Some(started);
        }
        if let Some(completed) = timestamps.completed_at {
            row.completed_at = Some(completed);
        }
        Ok(())
    }

    async fn append_log(
        &self,
        batch_id: Uuid,
        level: LogLevel,
        message: &str,
        eid: Option<&str>,
    ) -> SinkResult<()> {
        self.state
            .lock()
            .logs
            .push(LogEntry::new(batch_id, level, message, eid));
        Ok(())
    }
}
