//! Background consent status polling
//!
//! Runs one check immediately, then one per interval, until the link is
//! `Active` or the poller is stopped. Stopping cancels the sleep and any
//! in-flight request; nothing is applied after cancellation.

use super::machine::{ConsentMachine, PollOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to a running poll loop; dropping it stops the loop
pub struct ConsentPoller {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ConsentPoller {
    /// Spawn the poll loop on the current runtime
    pub fn spawn(machine: Arc<ConsentMachine>, interval: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        let handle = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Consent polling started");
            run(machine, interval, token).await;
            debug!("Consent polling loop exited");
        });

        Self {
            cancel_token,
            handle: Some(handle),
        }
    }

    /// True until the loop finishes (active link or stop)
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for ConsentPoller {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run(machine: Arc<ConsentMachine>, interval: Duration, cancel_token: CancellationToken) {
    loop {
        let outcome = tokio::select! {
            _ = cancel_token.cancelled() => return,
            outcome = machine.poll() => outcome,
        };

        match outcome {
            Ok(outcome) if outcome.is_terminal() => {
                info!("Consent active, polling stopped");
                return;
            }
            Ok(PollOutcome::Stale) => debug!("Discarded consent status from before reset"),
            Ok(_) => {}
            // Transient; try again next tick
            Err(e) => debug!("Consent poll failed: {}", e),
        }

        tokio::select! {
            _ = cancel_token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
