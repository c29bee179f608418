//! Metrics & Notification Cache
//!
//! Single source of truth for dashboard views. Holds the latest metrics
//! snapshot, the notification list and the `ready_for_dashboard` flag.
//! Every fetch is committed in one write after the response is fully
//! decoded; a failed fetch leaves the previous state untouched.

use crate::error::{ClientError, ClientResult};
use crate::services::DashboardApi;
use chrono::{DateTime, Utc};
use finhealth_common::api::{DashboardMetrics, Notification};
use finhealth_common::events::{DashboardEvent, EventBus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One successfully fetched metrics payload
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub metrics: DashboardMetrics,
    pub fetched_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn has_any_data(&self) -> bool {
        self.metrics.has_any_data
    }
}

/// Result of [`MetricsCache::load_initial`]; each side reported independently
#[derive(Debug)]
pub struct InitialLoad {
    pub metrics_error: Option<ClientError>,
    pub notifications_error: Option<ClientError>,
    pub ready_for_dashboard: bool,
}

impl InitialLoad {
    pub fn is_complete(&self) -> bool {
        self.metrics_error.is_none() && self.notifications_error.is_none()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<MetricsSnapshot>,
    notifications: Vec<Notification>,
    ready_for_dashboard: bool,
}

pub struct MetricsCache {
    api: Arc<dyn DashboardApi>,
    state: RwLock<CacheState>,
    in_flight: AtomicUsize,
    events: EventBus,
}

/// Counts a fetch as in flight until dropped
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MetricsCache {
    pub fn new(api: Arc<dyn DashboardApi>, events: EventBus) -> Self {
        Self {
            api,
            state: RwLock::new(CacheState::default()),
            in_flight: AtomicUsize::new(0),
            events,
        }
    }

    /// Fetch metrics and notifications concurrently
    ///
    /// A failure on one side never discards the other. Ready only when
    /// metrics arrived and report `has_any_data`.
    pub async fn load_initial(&self) -> InitialLoad {
        let _loading = LoadingGuard::new(&self.in_flight);

        let (metrics, notifications) =
            tokio::join!(self.api.fetch_metrics(), self.api.fetch_notifications());

        let metrics_error = match metrics {
            Ok(metrics) => {
                let ready = metrics.has_any_data;
                self.commit_metrics(metrics, ready).await;
                None
            }
            Err(e) => {
                warn!("Initial metrics load failed: {}", e);
                Some(e)
            }
        };

        let notifications_error = match notifications {
            Ok(list) => {
                self.commit_notifications(list).await;
                None
            }
            Err(e) => {
                warn!("Initial notifications load failed: {}", e);
                Some(e)
            }
        };

        let ready_for_dashboard = self.is_ready_for_dashboard().await;
        info!(
            ready_for_dashboard,
            metrics_ok = metrics_error.is_none(),
            notifications_ok = notifications_error.is_none(),
            "Initial dashboard load finished"
        );

        InitialLoad {
            metrics_error,
            notifications_error,
            ready_for_dashboard,
        }
    }

    /// Fetch metrics after documents were ingested
    ///
    /// On success the dashboard becomes ready even when `has_any_data` is
    /// false: the user explicitly asked for computed results.
    pub async fn refresh(&self) -> ClientResult<MetricsSnapshot> {
        let _loading = LoadingGuard::new(&self.in_flight);

        let metrics = self.api.fetch_metrics().await.map_err(|e| {
            warn!("Metrics refresh failed: {}", e);
            e
        })?;

        Ok(self.commit_metrics(metrics, true).await)
    }

    /// Fetch only the notification list
    pub async fn refresh_notifications(&self) -> ClientResult<Vec<Notification>> {
        let _loading = LoadingGuard::new(&self.in_flight);

        let list = self.api.fetch_notifications().await?;
        self.commit_notifications(list.clone()).await;
        Ok(list)
    }

    /// Drop readiness; the snapshot stays readable
    pub async fn invalidate(&self) {
        let was_ready = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut state.ready_for_dashboard, false)
        };
        if was_ready {
            debug!("Dashboard readiness invalidated");
            self.events.emit_lossy(DashboardEvent::ReadinessChanged {
                ready: false,
                timestamp: Utc::now(),
            });
        }
    }

    /// Forget the snapshot, notifications and readiness (session ended)
    pub async fn clear(&self) {
        let previous = std::mem::take(&mut *self.state.write().await);
        if previous.ready_for_dashboard {
            self.events.emit_lossy(DashboardEvent::ReadinessChanged {
                ready: false,
                timestamp: Utc::now(),
            });
        }
        debug!("Metrics cache cleared");
    }

    pub async fn snapshot(&self) -> Option<MetricsSnapshot> {
        self.state.read().await.snapshot.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    pub async fn is_ready_for_dashboard(&self) -> bool {
        self.state.read().await.ready_for_dashboard
    }

    /// True while any fetch is in flight
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    async fn commit_metrics(&self, metrics: DashboardMetrics, ready: bool) -> MetricsSnapshot {
        let has_any_data = metrics.has_any_data;
        let snapshot = MetricsSnapshot {
            metrics,
            fetched_at: Utc::now(),
        };

        let readiness_changed = {
            let mut state = self.state.write().await;
            state.snapshot = Some(snapshot.clone());
            let changed = state.ready_for_dashboard != ready;
            state.ready_for_dashboard = ready;
            changed
        };

        self.events.emit_lossy(DashboardEvent::MetricsUpdated {
            has_any_data,
            timestamp: Utc::now(),
        });
        if readiness_changed {
            self.events.emit_lossy(DashboardEvent::ReadinessChanged {
                ready,
                timestamp: Utc::now(),
            });
        }
        snapshot
    }

    async fn commit_notifications(&self, list: Vec<Notification>) {
        let count = list.len();
        self.state.write().await.notifications = list;
        self.events.emit_lossy(DashboardEvent::NotificationsUpdated {
            count,
            timestamp: Utc::now(),
        });
    }
}
