//! Consent-link state machine
//!
//! `Unlinked → PendingApproval → Active`, with `reset` returning to
//! `Unlinked` from anywhere. `Active` is only ever reached from an external
//! status report, never asserted locally. No lock is held across a network
//! call; a generation counter bumped by `reset` and by a completed
//! `initiate` makes late responses from before either harmless.

use crate::error::{ClientError, ClientResult};
use crate::services::DashboardApi;
use chrono::Utc;
use finhealth_common::api::{ConsentInitiateRequest, ConsentStatusResponse, ConsentWireStatus};
use finhealth_common::events::{DashboardEvent, EventBus, LinkStatus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One user's consent link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentLink {
    pub status: LinkStatus,
    /// Present while `PendingApproval`; may linger into `Active`
    pub approval_url: Option<String>,
    pub account_identifier: String,
}

/// What a single `poll` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Already `Active`; no request was sent
    Suppressed,
    /// A reset happened while the request was in flight; result dropped
    Stale,
    /// External status applied and differed from local state
    Changed(LinkStatus),
    /// External status matched local state
    Unchanged(LinkStatus),
}

impl PollOutcome {
    /// Whether polling should stop after this outcome
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollOutcome::Suppressed
                | PollOutcome::Changed(LinkStatus::Active)
                | PollOutcome::Unchanged(LinkStatus::Active)
        )
    }
}

#[derive(Debug, Default)]
struct MachineState {
    link: ConsentLink,
    generation: u64,
    initiating: bool,
}

/// Drives the consent handshake against the backend
pub struct ConsentMachine {
    api: Arc<dyn DashboardApi>,
    state: RwLock<MachineState>,
    events: EventBus,
}

impl ConsentMachine {
    pub fn new(api: Arc<dyn DashboardApi>, events: EventBus) -> Self {
        Self {
            api,
            state: RwLock::new(MachineState::default()),
            events,
        }
    }

    /// Snapshot of the current link
    pub async fn link(&self) -> ConsentLink {
        self.state.read().await.link.clone()
    }

    pub async fn status(&self) -> LinkStatus {
        self.state.read().await.link.status
    }

    /// Request consent for `identifier`; valid only from `Unlinked`
    ///
    /// Returns the approval URL the caller should surface to the user.
    /// Failures leave the state unchanged and are never retried here.
    pub async fn initiate(&self, identifier: &str) -> ClientResult<String> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ClientError::Validation(
                "Enter an account identifier to link".to_string(),
            ));
        }

        let generation = {
            let mut state = self.state.write().await;
            if state.link.status != LinkStatus::Unlinked {
                return Err(ClientError::InvalidTransition {
                    action: "initiate consent",
                    state: state.link.status,
                });
            }
            if state.initiating {
                return Err(ClientError::Validation(
                    "Consent initiation already in progress".to_string(),
                ));
            }
            state.initiating = true;
            state.generation
        };

        let request = ConsentInitiateRequest {
            account_identifier: identifier.to_string(),
        };
        let result = self.api.initiate_consent(&request).await;

        let mut state = self.state.write().await;
        state.initiating = false;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(retryable = e.is_retryable(), "Consent initiation failed: {}", e);
                return Err(e);
            }
        };

        let url = response
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                ClientError::Decode("consent initiation returned no approval URL".to_string())
            })?;

        if state.generation != generation {
            debug!("Consent reset during initiation; discarding response");
            return Err(ClientError::InvalidTransition {
                action: "complete consent initiation",
                state: state.link.status,
            });
        }

        // A concurrent poll may already have seen the consent go active
        if state.link.status == LinkStatus::Active {
            return Err(ClientError::InvalidTransition {
                action: "initiate consent",
                state: LinkStatus::Active,
            });
        }

        // Polls sent before initiation may still report NONE
        state.generation += 1;
        let old_status = state.link.status;
        state.link = ConsentLink {
            status: LinkStatus::PendingApproval,
            approval_url: Some(url.clone()),
            account_identifier: identifier.to_string(),
        };
        drop(state);

        info!(consent_id = ?response.consent_id, "Consent initiated, awaiting approval");
        self.emit_change(old_status, LinkStatus::PendingApproval, Some(url.clone()));
        Ok(url)
    }

    /// Fetch the external status once and adopt it
    ///
    /// Suppressed (no request) once `Active`. Transient failures leave the
    /// state unchanged and are returned to the caller.
    pub async fn poll(&self) -> ClientResult<PollOutcome> {
        let generation = {
            let state = self.state.read().await;
            if state.link.status == LinkStatus::Active {
                return Ok(PollOutcome::Suppressed);
            }
            state.generation
        };

        let response = self.api.consent_status().await.map_err(|e| {
            debug!(retryable = e.is_retryable(), "Consent status check failed: {}", e);
            e
        })?;

        let mut state = self.state.write().await;
        if state.generation != generation {
            return Ok(PollOutcome::Stale);
        }
        if state.link.status == LinkStatus::Active {
            return Ok(PollOutcome::Suppressed);
        }

        let old = state.link.clone();
        apply_external(&mut state.link, &response);
        let new = state.link.clone();
        drop(state);

        if new == old {
            return Ok(PollOutcome::Unchanged(new.status));
        }

        if new.status != old.status {
            info!(from = %old.status, to = %new.status, "Consent status changed");
        } else {
            debug!("Consent approval URL refreshed");
        }
        self.emit_change(old.status, new.status, new.approval_url);
        Ok(PollOutcome::Changed(new.status))
    }

    /// Return to `Unlinked` locally, whatever the current state
    ///
    /// Clears the identifier and URL, and invalidates any in-flight poll or
    /// initiation. Does not contact the backend.
    pub async fn reset_local(&self) {
        let old_status = {
            let mut state = self.state.write().await;
            state.generation += 1;
            let old_status = state.link.status;
            state.link = ConsentLink::default();
            old_status
        };

        if old_status != LinkStatus::Unlinked {
            info!(from = %old_status, "Consent reset");
            self.emit_change(old_status, LinkStatus::Unlinked, None);
        }
    }

    /// Ask the backend to forget the consent
    pub(crate) async fn reset_remote(&self) -> ClientResult<()> {
        self.api.reset_consent().await.map(|_| ())
    }

    fn emit_change(&self, old_status: LinkStatus, new_status: LinkStatus, approval_url: Option<String>) {
        self.events.emit_lossy(DashboardEvent::ConsentStatusChanged {
            old_status,
            new_status,
            approval_url,
            timestamp: Utc::now(),
        });
    }
}

/// Adopt an external status report into the local link (never called once `Active`)
fn apply_external(link: &mut ConsentLink, response: &ConsentStatusResponse) {
    let fresh_url = response.url.clone().filter(|u| !u.trim().is_empty());

    match response.status {
        ConsentWireStatus::Active => {
            // URL is left as-is; it is not needed once active
            link.status = LinkStatus::Active;
        }
        ConsentWireStatus::Pending => {
            link.status = LinkStatus::PendingApproval;
            if fresh_url.is_some() {
                link.approval_url = fresh_url;
            }
        }
        ConsentWireStatus::None => {
            link.status = LinkStatus::Unlinked;
            link.approval_url = None;
        }
        ConsentWireStatus::Unknown => {
            warn!("Ignoring unrecognized consent status from backend");
        }
    }
}
