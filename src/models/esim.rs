//! Per-EID processing ledger and the fixed carrier enumeration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four mobile network operators, in the fixed order plans are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    Tmo,
    Verizon,
    Global,
    Att,
}

impl Carrier {
    /// Assignment order. Carrier N+1 is never attempted before carrier N
    /// confirms.
    pub const ALL: [Carrier; 4] = [Self::Tmo, Self::Verizon, Self::Global, Self::Att];

    /// Column-style lowercase key used by the result sink.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Tmo => "tmo",
            Self::Verizon => "verizon",
            Self::Global => "global",
            Self::Att => "att",
        }
    }

    /// Display name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tmo => "TMO",
            Self::Verizon => "Verizon",
            Self::Global => "Global",
            Self::Att => "ATT",
        }
    }

    /// Index into [`Carrier::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Tmo => 0,
            Self::Verizon => 1,
            Self::Global => 2,
            Self::Att => 3,
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Plan identifiers for each carrier, supplied by the batch trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPlanIds {
    pub tmo: String,
    pub verizon: String,
    pub global: String,
    pub att: String,
}

impl CarrierPlanIds {
    pub fn plan_for(&self, carrier: Carrier) -> &str {
        match carrier {
            Carrier::Tmo => &self.tmo,
            Carrier::Verizon => &self.verizon,
            Carrier::Global => &self.global,
            Carrier::Att => &self.att,
        }
    }
}

/// Per-carrier fields on the ledger, populated only once that carrier's
/// assignment reached a terminal result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSlot {
    pub plan_request_id: Option<String>,
    pub iccid: Option<String>,
    pub status: Option<String>,
    pub confirmed_at: Option<String>,
}

impl CarrierSlot {
    pub fn is_empty(&self) -> bool {
        self.plan_request_id.is_none()
            && self.iccid.is_none()
            && self.status.is_none()
            && self.confirmed_at.is_none()
    }
}

/// The per-EID processing ledger, one per EID per batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsimRecord {
    pub eid: String,
    pub activation_request_id: Option<String>,
    /// Indexed by [`Carrier::index`].
    pub carriers: [CarrierSlot; 4],
    /// First fatal error wins; the workflow never continues past it.
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl EsimRecord {
    pub fn new(eid: impl Into<String>) -> Self {
        Self {
            eid: eid.into(),
            ..Default::default()
        }
    }

    pub fn carrier(&self, carrier: Carrier) -> &CarrierSlot {
        &self.carriers[carrier.index()]
    }

    /// Processing duration, available only once the EID is terminal.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Merge a partial update into the record.
    ///
    /// `None` fields leave existing values untouched, so replaying a patch
    /// with the same values is a no-op. The error message is write-once.
    pub fn apply(&mut self, patch: &EsimPatch) {
        if let Some(id) = &patch.activation_request_id {
            self.activation_request_id = Some(id.clone());
        }
        if let Some(ts) = patch.started_at {
            self.started_at = Some(ts);
        }
        if let Some(ts) = patch.finished_at {
            self.finished_at = Some(ts);
        }
        if self.error_message.is_none() {
            if let Some(msg) = &patch.error_message {
                self.error_message = Some(msg.clone());
            }
        }
        for (carrier, fields) in &patch.carrier_fields {
            let slot = &mut self.carriers[carrier.index()];
            if let Some(id) = &fields.plan_request_id {
                slot.plan_request_id = Some(id.clone());
            }
            if let Some(iccid) = &fields.iccid {
                slot.iccid = Some(iccid.clone());
            }
            if let Some(status) = &fields.status {
                slot.status = Some(status.clone());
            }
            if let Some(ts) = &fields.confirmed_at {
                slot.confirmed_at = Some(ts.clone());
            }
        }
    }
}

/// Partial per-carrier update carried inside an [`EsimPatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPatch {
    pub plan_request_id: Option<String>,
    pub iccid: Option<String>,
    pub status: Option<String>,
    pub confirmed_at: Option<String>,
}

/// Partial-field update for `ResultSink::upsert_esim_record`.
///
/// Built incrementally by the workflow at each checkpoint; the sink merges
/// it with idempotent semantics rather than overwriting the whole row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EsimPatch {
    pub activation_request_id: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub carrier_fields: Vec<(Carrier, CarrierPatch)>,
}

impl EsimPatch {
    pub fn started(ts: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(ts),
            ..Default::default()
        }
    }

    pub fn finished(ts: DateTime<Utc>) -> Self {
        Self {
            finished_at: Some(ts),
            ..Default::default()
        }
    }

    pub fn activation_request(id: impl Into<String>) -> Self {
        Self {
            activation_request_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Record the plan-assignment correlation id for one carrier.
    pub fn plan_request(carrier: Carrier, request_id: impl Into<String>) -> Self {
        Self {
            carrier_fields: vec![(
                carrier,
                CarrierPatch {
                    plan_request_id: Some(request_id.into()),
                    ..Default::default()
                },
            )],
            ..Default::default()
        }
    }

    /// Record a carrier's terminal confirmation fields.
    pub fn plan_confirmed(
        carrier: Carrier,
        iccid: impl Into<String>,
        status: impl Into<String>,
        confirmed_at: impl Into<String>,
    ) -> Self {
        Self {
            carrier_fields: vec![(
                carrier,
                CarrierPatch {
                    iccid: Some(iccid.into()),
                    status: Some(status.into()),
                    confirmed_at: Some(confirmed_at.into()),
                    plan_request_id: None,
                },
            )],
            ..Default::default()
        }
    }
}
