//! Correlation id generation for asynchronous provider operations.
//!
//! The provider keys every asynchronous operation on an opaque request id
//! supplied by the caller and echoed back by the operation-result endpoint.
//! Ids are UUIDv4-derived (cryptographically random, safe across concurrent
//! orchestrator instances), hyphens stripped, truncated to the provider's
//! 32-character limit.

/// Length of a provider correlation id.
pub const REQUEST_ID_LEN: usize = 32;

/// Generate a fresh correlation id.
pub fn generate_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(REQUEST_ID_LEN);
    id
}
