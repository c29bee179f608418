//! Event types for the finhealth event system
//!
//! Provides shared event definitions and the EventBus views subscribe to.

mod onboarding_types;

pub use onboarding_types::{DocumentCategory, LinkStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Coordination-layer events
///
/// Emitted by the session store, ingestion gate, consent machine, metrics
/// cache and report exporter. Views subscribe through [`EventBus`] instead
/// of polling component state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DashboardEvent {
    /// A session credential was stored (login or restore)
    SessionStarted {
        /// Profile display name
        display_name: String,
        /// True when restored from persisted state rather than a fresh login
        restored: bool,
        timestamp: DateTime<Utc>,
    },

    /// The session credential was discarded (logout or expiry)
    SessionEnded { timestamp: DateTime<Utc> },

    /// An upload was confirmed for one document category
    DocumentUploaded {
        category: DocumentCategory,
        timestamp: DateTime<Utc>,
    },

    /// All required document categories are uploaded
    IngestionReady { timestamp: DateTime<Utc> },

    /// Documents were reset for a new onboarding episode
    IngestionReset { timestamp: DateTime<Utc> },

    /// Consent link moved to a new status
    ConsentStatusChanged {
        old_status: LinkStatus,
        new_status: LinkStatus,
        /// Approval URL to surface to the user, when pending
        approval_url: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A new metrics snapshot replaced the cached one
    MetricsUpdated {
        has_any_data: bool,
        timestamp: DateTime<Utc>,
    },

    /// A new notification list replaced the cached one
    NotificationsUpdated {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Dashboard readiness flag changed
    ReadinessChanged {
        ready: bool,
        timestamp: DateTime<Utc>,
    },

    /// A report artifact was delivered
    ReportExported {
        /// Where the artifact was delivered (file path or sink description)
        location: String,
        size_bytes: usize,
        timestamp: DateTime<Utc>,
    },

    /// A report export failed
    ReportFailed {
        /// User-facing failure notice
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DashboardEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            DashboardEvent::SessionStarted { .. } => "SessionStarted",
            DashboardEvent::SessionEnded { .. } => "SessionEnded",
            DashboardEvent::DocumentUploaded { .. } => "DocumentUploaded",
            DashboardEvent::IngestionReady { .. } => "IngestionReady",
            DashboardEvent::IngestionReset { .. } => "IngestionReset",
            DashboardEvent::ConsentStatusChanged { .. } => "ConsentStatusChanged",
            DashboardEvent::MetricsUpdated { .. } => "MetricsUpdated",
            DashboardEvent::NotificationsUpdated { .. } => "NotificationsUpdated",
            DashboardEvent::ReadinessChanged { .. } => "ReadinessChanged",
            DashboardEvent::ReportExported { .. } => "ReportExported",
            DashboardEvent::ReportFailed { .. } => "ReportFailed",
        }
    }
}

/// Central event distribution bus
///
/// Cloning is cheap; all clones share one broadcast channel.
///
/// # Examples
///
/// ```
/// use finhealth_common::events::{DashboardEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(DashboardEvent::IngestionReady { timestamp: chrono::Utc::now() });
/// assert_eq!(rx.try_recv().unwrap().event_type(), "IngestionReady");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DashboardEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DashboardEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
