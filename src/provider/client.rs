//! Authenticated HTTP client for the provisioning API.

use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::types::{OperationResult, PollOutcome, SubmitAck};
use super::ProviderApi;
use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::request_id::generate_request_id;

/// API key/secret pair passed in by the batch trigger.
///
/// Never cached beyond the client that holds it and never logged; `Debug`
/// redacts both fields.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ProviderCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

/// Production [`ProviderApi`] implementation over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    http: Client,
    config: ProviderConfig,
    credentials: ProviderCredentials,
}

impl HttpProviderClient {
    /// Build a client with a per-request timeout from the config.
    pub fn new(
        config: ProviderConfig,
        credentials: ProviderCredentials,
    ) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::Transport {
                operation: "client_init",
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("ApiKey", &self.credentials.api_key)
            .header("ApiSecret", &self.credentials.api_secret)
    }

    fn submit_query(&self, request_id: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![("requestId", request_id.to_string())];
        if let Some(callback) = &self.config.callback_url {
            query.push(("callbackUrl", callback.clone()));
        }
        query
    }

    /// Send a submit request and verify the acknowledgement payload.
    async fn check_ack(
        operation: &'static str,
        response: reqwest::Response,
    ) -> ProviderResult<()> {
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport {
                operation,
                reason: format!("HTTP {status}"),
            });
        }
        let ack: SubmitAck =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    operation,
                    reason: e.to_string(),
                })?;
        if !ack.success {
            return Err(ProviderError::Rejected { operation });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProviderApi for HttpProviderClient {
    async fn activate(&self, eid: &str) -> ProviderResult<String> {
        let request_id = generate_request_id();
        debug!(eid = %eid, request_id = %request_id, "Submitting activation request");

        let response = self
            .authed(self.http.post(self.url("esims/activate")))
            .query(&self.submit_query(&request_id))
            .json(&json!({ "entries": [eid] }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                operation: "activate",
                reason: e.to_string(),
            })?;

        Self::check_ack("activate", response).await?;
        Ok(request_id)
    }

    async fn fetch_info(&self, eid: &str, request_id: &str) -> ProviderResult<()> {
        debug!(eid = %eid, request_id = %request_id, "Submitting info request");

        let mut query = self.submit_query(request_id);
        query.push(("limit", "1".to_string()));
        query.push(("eid", eid.to_string()));

        let response = self
            .authed(self.http.get(self.url("esims/info")))
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                operation: "fetch_info",
                reason: e.to_string(),
            })?;

        Self::check_ack("fetch_info", response).await
    }

    async fn assign_plan(&self, eid: &str, plan_id: &str) -> ProviderResult<String> {
        let request_id = generate_request_id();
        debug!(eid = %eid, plan_id = %plan_id, request_id = %request_id, "Submitting plan assignment");

        let response = self
            .authed(self.http.post(self.url("esims/assign-plan")))
            .query(&self.submit_query(&request_id))
            .json(&json!({ "entries": [{ "eid": eid, "planUuid": plan_id }] }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                operation: "assign_plan",
                reason: e.to_string(),
            })?;

        Self::check_ack("assign_plan", response).await?;
        Ok(request_id)
    }

    async fn poll_result(&self, request_id: &str) -> ProviderResult<PollOutcome> {
        let response = self
            .authed(self.http.get(self.url("operation-result")))
            .query(&[("requestId", request_id)])
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                operation: "poll_result",
                reason: e.to_string(),
            })?;

        // The provider signals "still processing" with HTTP 102.
        if response.status() == StatusCode::PROCESSING {
            return Ok(PollOutcome::Pending);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Transport {
                operation: "poll_result",
                reason: format!("HTTP {status}"),
            });
        }
        let result: OperationResult =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    operation: "poll_result",
                    reason: e.to_string(),
                })?;
        Ok(PollOutcome::Ready(result))
    }
}
