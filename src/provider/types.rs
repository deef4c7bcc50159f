//! Wire types for the provider's JSON payloads.

use serde::{Deserialize, Serialize};

/// Device state the provider reports when an eSIM is reachable.
pub const DEVICE_STATUS_ONLINE: &str = "ONLINE";
/// Terminal plan-change status signalling a confirmed assignment.
pub const PLAN_CHANGE_SUCCESS: &str = "SUCCESS";

/// Terminal result of an asynchronous provider operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    #[serde(default)]
    pub entries: Vec<EsimEntry>,
}

impl OperationResult {
    /// The single entry info requests are limited to, when present.
    pub fn first_entry(&self) -> Option<&EsimEntry> {
        self.entries.first()
    }
}

/// One eSIM's snapshot inside an operation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EsimEntry {
    #[serde(default)]
    pub eid: Option<String>,
    /// Whether the provider has marked the eSIM physically active.
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub device_status: Option<String>,
    /// Status of the most recent plan assignment for this eSIM.
    #[serde(default)]
    pub plan_change_status: Option<String>,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub connection_profile_entries: Vec<ConnectionProfileEntry>,
    #[serde(default)]
    pub last_connected_network: Option<LastConnectedNetwork>,
}

impl EsimEntry {
    pub fn is_online(&self) -> bool {
        self.device_status.as_deref() == Some(DEVICE_STATUS_ONLINE)
    }

    pub fn plan_change_succeeded(&self) -> bool {
        self.plan_change_status.as_deref() == Some(PLAN_CHANGE_SUCCESS)
    }

    /// True when the given plan is already attached and active, meaning the
    /// assignment handshake can be skipped.
    pub fn has_active_plan(&self, plan_id: &str) -> bool {
        self.connection_profile_entries
            .iter()
            .any(|cp| cp.plan_uuid.as_deref() == Some(plan_id) && cp.active)
    }

    /// Network-reported confirmation timestamp, when the provider has one.
    pub fn network_timestamp(&self) -> Option<&str> {
        self.last_connected_network
            .as_ref()
            .and_then(|n| n.last_cdr_network_consumption_time.as_deref())
    }
}

/// Connection profile attached to an eSIM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfileEntry {
    #[serde(default)]
    pub plan_uuid: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Last network the device was seen on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastConnectedNetwork {
    #[serde(default)]
    pub last_cdr_network_consumption_time: Option<String>,
}

/// Outcome of one poll of the operation-result endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The operation reached a terminal result.
    Ready(OperationResult),
    /// The provider is still processing; poll again later.
    Pending,
}

/// Acknowledgement body returned by the submit endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitAck {
    #[serde(default)]
    pub success: bool,
}
