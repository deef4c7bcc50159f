//! Bounded-time polling for asynchronous operation results.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::types::{OperationResult, PollOutcome};
use super::ProviderApi;
use crate::error::{ProviderError, ProviderResult};
use crate::shutdown::StopSignal;

/// Converts the provider's pending/terminal duality into a bounded wait.
///
/// Polling is purely sequential per call; between polls the task suspends
/// for the poll interval and observes the batch stop signal, so cancellation
/// latency never exceeds one interval.
#[derive(Clone)]
pub struct OperationPoller {
    provider: Arc<dyn ProviderApi>,
}

impl OperationPoller {
    pub fn new(provider: Arc<dyn ProviderApi>) -> Self {
        Self { provider }
    }

    /// Poll until a terminal result arrives, `max_wait` elapses
    /// (`PollTimeout`), or the batch is stopped (`Cancelled`).
    pub async fn wait_for_result(
        &self,
        request_id: &str,
        poll_interval: Duration,
        max_wait: Duration,
        stop: &StopSignal,
    ) -> ProviderResult<OperationResult> {
        let mut elapsed = Duration::ZERO;
        loop {
            if stop.is_stopped() {
                return Err(ProviderError::Cancelled);
            }
            match self.provider.poll_result(request_id).await? {
                PollOutcome::Ready(result) => {
                    debug!(request_id = %request_id, success = result.success, "Operation result ready");
                    return Ok(result);
                }
                PollOutcome::Pending => {
                    trace!(request_id = %request_id, elapsed_ms = elapsed.as_millis() as u64, "Operation still processing");
                }
            }
            if elapsed >= max_wait {
                return Err(ProviderError::PollTimeout {
                    request_id: request_id.to_string(),
                    waited: max_wait,
                });
            }
            if stop.sleep_unless_stopped(poll_interval).await {
                return Err(ProviderError::Cancelled);
            }
            elapsed += poll_interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::stop_channel;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Scripted provider that serves a fixed sequence of poll outcomes.
    struct ScriptedProvider {
        outcomes: Mutex<Vec<ProviderResult<PollOutcome>>>,
    }

    impl ScriptedProvider {
        fn new(mut outcomes: Vec<ProviderResult<PollOutcome>>) -> Arc<Self> {
            outcomes.reverse();
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
            })
        }
    }

    #[async_trait]
    impl ProviderApi for ScriptedProvider {
        async fn activate(&self, _eid: &str) -> ProviderResult<String> {
            unimplemented!("not used by poller tests")
        }

        async fn fetch_info(&self, _eid: &str, _request_id: &str) -> ProviderResult<()> {
            unimplemented!("not used by poller tests")
        }

        async fn assign_plan(&self, _eid: &str, _plan_id: &str) -> ProviderResult<String> {
            unimplemented!("not used by poller tests")
        }

        async fn poll_result(&self, _request_id: &str) -> ProviderResult<PollOutcome> {
            self.outcomes
                .lock()
                .pop()
                .unwrap_or(Ok(PollOutcome::Pending))
        }
    }

    fn ready(success: bool) -> ProviderResult<PollOutcome> {
        Ok(PollOutcome::Ready(OperationResult {
            success,
            entries: vec![],
        }))
    }

    #[tokio::test]
    async fn test_returns_result_after_pending_polls() {
        let provider = ScriptedProvider::new(vec![
            Ok(PollOutcome::Pending),
            Ok(PollOutcome::Pending),
            ready(true),
        ]);
        let poller = OperationPoller::new(provider);
        let (_handle, stop) = stop_channel();

        let result = poller
            .wait_for_result(
                "req-1",
                Duration::from_millis(1),
                Duration::from_millis(100),
                &stop,
            )
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_times_out_when_never_ready() {
        let provider = ScriptedProvider::new(vec![]);
        let poller = OperationPoller::new(provider);
        let (_handle, stop) = stop_channel();

        let err = poller
            .wait_for_result(
                "req-1",
                Duration::from_millis(2),
                Duration::from_millis(10),
                &stop,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::PollTimeout { .. }));
    }

    #[tokio::test]
    async fn test_stop_cancels_wait() {
        let provider = ScriptedProvider::new(vec![]);
        let poller = OperationPoller::new(provider);
        let (handle, stop) = stop_channel();

        let wait = tokio::spawn(async move {
            poller
                .wait_for_result(
                    "req-1",
                    Duration::from_millis(5),
                    Duration::from_secs(60),
                    &stop,
                )
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();
        let err = wait.await.unwrap().unwrap_err();
        assert_eq!(err, ProviderError::Cancelled);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Transport {
            operation: "poll_result",
            reason: "HTTP 500".to_string(),
        })]);
        let poller = OperationPoller::new(provider);
        let (_handle, stop) = stop_channel();

        let err = poller
            .wait_for_result(
                "req-1",
                Duration::from_millis(1),
                Duration::from_millis(10),
                &stop,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Transport { .. }));
    }
}
