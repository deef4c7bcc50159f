//! Append-only structured log lines persisted through the result sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity of a persisted batch log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// One write-once log line, ordered by timestamp within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub batch_id: Uuid,
    pub level: LogLevel,
    pub message: String,
    pub eid: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(
        batch_id: Uuid,
        level: LogLevel,
        message: impl Into<String>,
        eid: Option<&str>,
    ) -> Self {
        Self {
            batch_id,
            level,
            message: message.into(),
            eid: eid.map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}
