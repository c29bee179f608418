//! Bank consent linking
//!
//! [`ConsentMachine`] holds the link state and applies transitions;
//! [`ConsentPoller`] drives status checks while approval is pending;
//! [`ConsentLinker`] ties the two together so that at most one poller runs
//! and a reset always stops it before the state is cleared.

pub mod machine;
pub mod poller;

pub use machine::{ConsentLink, ConsentMachine, PollOutcome};
pub use poller::ConsentPoller;

use crate::error::ClientResult;
use crate::services::DashboardApi;
use finhealth_common::events::{EventBus, LinkStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;

/// Consent workflow entry point
pub struct ConsentLinker {
    machine: Arc<ConsentMachine>,
    poller: Mutex<Option<ConsentPoller>>,
    interval: Duration,
}

impl ConsentLinker {
    pub fn new(api: Arc<dyn DashboardApi>, events: EventBus, interval: Duration) -> Self {
        Self {
            machine: Arc::new(ConsentMachine::new(api, events)),
            poller: Mutex::new(None),
            interval,
        }
    }

    pub fn machine(&self) -> &Arc<ConsentMachine> {
        &self.machine
    }

    pub async fn link(&self) -> ConsentLink {
        self.machine.link().await
    }

    pub async fn status(&self) -> LinkStatus {
        self.machine.status().await
    }

    /// Initiate consent and start polling for approval
    pub async fn initiate(&self, identifier: &str) -> ClientResult<String> {
        let url = self.machine.initiate(identifier).await?;
        self.start_polling().await;
        Ok(url)
    }

    /// Start the background poller unless one is already running or the link is active
    pub async fn start_polling(&self) {
        let mut poller = self.poller.lock().await;
        if poller.as_ref().is_some_and(ConsentPoller::is_running) {
            return;
        }
        if !self.machine.status().await.needs_polling() {
            return;
        }
        *poller = Some(ConsentPoller::spawn(self.machine.clone(), self.interval));
    }

    /// One synchronous status check, outside the poll loop
    pub async fn poll_now(&self) -> ClientResult<PollOutcome> {
        self.machine.poll().await
    }

    /// Whether a poll loop is currently alive
    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(ConsentPoller::is_running)
    }

    /// Stop polling, return to `Unlinked`, then ask the backend to forget the consent
    ///
    /// Local state is reset even when the backend call fails; the failure
    /// is still reported.
    pub async fn reset(&self) -> ClientResult<()> {
        self.stop_polling().await;
        self.machine.reset_local().await;

        self.machine.reset_remote().await.map_err(|e| {
            warn!("Backend consent reset failed: {}", e);
            e
        })
    }

    /// Stop polling without touching link state
    pub async fn shutdown(&self) {
        self.stop_polling().await;
    }

    async fn stop_polling(&self) {
        let poller = self.poller.lock().await.take();
        if let Some(poller) = poller {
            poller.stop().await;
        }
    }
}
