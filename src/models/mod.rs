//! Data model for batches, per-EID records, and structured log lines.

pub mod batch;
pub mod esim;
pub mod log;

pub use batch::{Batch, BatchStatus, BatchTimestamps};
pub use esim::{Carrier, CarrierPatch, CarrierPlanIds, CarrierSlot, EsimPatch, EsimRecord};
pub use log::{LogEntry, LogLevel};
