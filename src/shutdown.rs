//! Cooperative stop signal for in-flight batch runs.
//!
//! The batch `Stopped` status is the sole cancellation mechanism. Workflows
//! observe the signal at every suspension point, so propagation latency is
//! bounded by one poll interval; they finish the step in progress and then
//! abort rather than vanishing mid-write.

use std::time::Duration;
use tokio::sync::watch;

/// Create a linked stop handle/signal pair for one batch run.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Owned by the coordinator; flipping it is irreversible for the run.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Request a cooperative stop. Safe to call more than once.
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// A fresh signal for another observer of the same run.
    pub fn signal(&self) -> StopSignal {
        StopSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Cloneable observer side, threaded through every workflow and poll wait.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend for `duration`, waking early if the stop signal fires.
    ///
    /// Returns `true` when the run has been stopped, either before the wait
    /// or while waiting.
    pub async fn sleep_unless_stopped(&self, duration: Duration) -> bool {
        let mut rx = self.rx.clone();
        if *rx.borrow_and_update() {
            return true;
        }
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return *rx.borrow(),
                changed = rx.changed() => {
                    match changed {
                        Ok(()) => {
                            if *rx.borrow_and_update() {
                                return true;
                            }
                        }
                        // Sender dropped without stopping: run out the wait.
                        Err(_) => {
                            (&mut sleep).await;
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Resolve once the stop signal fires; pends forever if the handle is
    /// dropped without stopping.
    pub async fn stopped(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
