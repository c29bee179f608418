//! Dashboard coordinator
//!
//! Owns one instance of each coordination component and wires them to a
//! shared [`DashboardApi`], [`SessionStore`] and [`EventBus`]. Views (the CLI
//! included) talk to this type only.

use crate::consent::{ConsentLink, ConsentLinker, PollOutcome};
use crate::error::{ClientError, ClientResult};
use crate::ingestion::{DocumentSlot, DocumentUploader, IngestionGate};
use crate::metrics_cache::{InitialLoad, MetricsCache, MetricsSnapshot};
use crate::report::{ExportedReport, FileReportSink, ReportExporter, ReportSink};
use crate::services::{DashboardApi, HttpDashboardApi};
use crate::session::SessionStore;
use chrono::Utc;
use finhealth_common::api::{Ack, LoginRequest, Notification, SignupRequest, UserProfile};
use finhealth_common::config::ClientConfig;
use finhealth_common::events::{DashboardEvent, DocumentCategory, EventBus};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

const EVENT_BUS_CAPACITY: usize = 100;

/// New-account details for [`Dashboard::signup`]
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub company_name: String,
}

pub struct Dashboard {
    config: ClientConfig,
    events: EventBus,
    session: Arc<SessionStore>,
    api: Arc<dyn DashboardApi>,
    gate: Arc<RwLock<IngestionGate>>,
    uploader: DocumentUploader,
    consent: ConsentLinker,
    cache: MetricsCache,
    exporter: ReportExporter,
}

impl Dashboard {
    /// Build the HTTP-backed dashboard and restore any saved session
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let session = Arc::new(SessionStore::new(
            config.session_policy,
            config.session_file.clone(),
            events.clone(),
        ));

        if let Err(e) = session.restore().await {
            warn!("Could not restore session: {}", e);
        }

        let api: Arc<dyn DashboardApi> = Arc::new(HttpDashboardApi::new(&config, session.clone())?);
        let sink: Arc<dyn ReportSink> = Arc::new(FileReportSink::new(config.report_dir.clone()));

        info!(api = %config.api_base_url, policy = ?config.session_policy, "Dashboard client ready");
        Ok(Self::with_parts(config, events, session, api, sink))
    }

    /// Assemble from explicit parts
    pub fn with_parts(
        config: ClientConfig,
        events: EventBus,
        session: Arc<SessionStore>,
        api: Arc<dyn DashboardApi>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let gate = Arc::new(RwLock::new(IngestionGate::new()));
        let uploader = DocumentUploader::new(api.clone(), gate.clone(), events.clone());
        let consent = ConsentLinker::new(api.clone(), events.clone(), config.poll_interval);
        let cache = MetricsCache::new(api.clone(), events.clone());
        let exporter = ReportExporter::new(api.clone(), sink, events.clone());

        Self {
            config,
            events,
            session,
            api,
            gate,
            uploader,
            consent,
            cache,
            exporter,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn cache(&self) -> &MetricsCache {
        &self.cache
    }

    pub fn consent(&self) -> &ConsentLinker {
        &self.consent
    }

    // ---- Session ----

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserProfile> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        // 401 here means bad credentials, not an expired session
        let response = self.api.login(&request).await.map_err(|e| match e {
            ClientError::Unauthorized(detail) => ClientError::Api {
                status: 401,
                detail,
            },
            other => other,
        })?;
        let identity = self.session.begin(response).await?;
        Ok(identity.profile)
    }

    pub async fn signup(&self, form: SignupForm) -> ClientResult<Ack> {
        if form.email.trim().is_empty() || form.password.is_empty() {
            return Err(ClientError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        if form.company_name.trim().is_empty() {
            return Err(ClientError::Validation("Company name is required".to_string()));
        }

        let request = SignupRequest {
            email: form.email.trim().to_string(),
            password: form.password,
            full_name: form.full_name.trim().to_string(),
            company_name: form.company_name.trim().to_string(),
        };
        self.api.signup(&request).await
    }

    /// End the session and drop everything tied to it
    pub async fn logout(&self) -> ClientResult<()> {
        self.clear_user_state().await;
        self.session.end().await
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.session.profile().await
    }

    // ---- Documents ----

    /// Upload a file from disk under `category`
    pub async fn upload_file(&self, category: DocumentCategory, path: &Path) -> ClientResult<()> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;
        self.upload(category, &file_name, bytes).await
    }

    pub async fn upload(
        &self,
        category: DocumentCategory,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<()> {
        let result = self.uploader.upload(category, file_name, bytes).await;
        self.check_session(result).await
    }

    pub async fn document_slots(&self) -> [DocumentSlot; 3] {
        *self.gate.read().await.slots()
    }

    pub async fn is_ingestion_ready(&self) -> bool {
        self.gate.read().await.is_ready()
    }

    /// Start a new onboarding episode: gate cleared, dashboard not ready
    pub async fn request_reupload(&self) {
        self.gate.write().await.reset();
        self.cache.invalidate().await;
        info!("Document re-upload requested");
        self.events.emit_lossy(DashboardEvent::IngestionReset {
            timestamp: Utc::now(),
        });
    }

    // ---- Metrics ----

    /// Mount the dashboard: initial fetch, then consent polling for a logged-in user
    pub async fn load_dashboard(&self) -> InitialLoad {
        let outcome = self.cache.load_initial().await;
        let unauthorized = [&outcome.metrics_error, &outcome.notifications_error]
            .into_iter()
            .flatten()
            .any(|e| matches!(e, ClientError::Unauthorized(_)));
        if unauthorized {
            self.expire_session().await;
        } else if self.session.is_authenticated().await {
            self.consent.start_polling().await;
        }
        outcome
    }

    /// Compute metrics once every required document is uploaded
    pub async fn compute_metrics(&self) -> ClientResult<MetricsSnapshot> {
        if !self.gate.read().await.is_ready() {
            return Err(ClientError::Validation(
                "Upload all required documents first".to_string(),
            ));
        }
        self.refresh_metrics().await
    }

    /// Explicit refresh, not gated on this process's uploads
    pub async fn refresh_metrics(&self) -> ClientResult<MetricsSnapshot> {
        let result = self.cache.refresh().await;
        self.check_session(result).await
    }

    pub async fn refresh_notifications(&self) -> ClientResult<Vec<Notification>> {
        let result = self.cache.refresh_notifications().await;
        self.check_session(result).await
    }

    // ---- Consent ----

    pub async fn initiate_consent(&self, identifier: &str) -> ClientResult<String> {
        let result = self.consent.initiate(identifier).await;
        self.check_session(result).await
    }

    pub async fn check_consent(&self) -> ClientResult<PollOutcome> {
        let result = self.consent.poll_now().await;
        self.check_session(result).await
    }

    pub async fn reset_consent(&self) -> ClientResult<()> {
        let result = self.consent.reset().await;
        self.check_session(result).await
    }

    pub async fn consent_link(&self) -> ConsentLink {
        self.consent.link().await
    }

    // ---- Report ----

    pub async fn export_report(&self) -> ClientResult<ExportedReport> {
        let result = self.exporter.export_report().await;
        self.check_session(result).await
    }

    /// Stop background work (view teardown)
    pub async fn shutdown(&self) {
        self.consent.shutdown().await;
    }

    async fn check_session<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        if let Err(ClientError::Unauthorized(_)) = &result {
            self.expire_session().await;
        }
        result
    }

    async fn expire_session(&self) {
        warn!("Credential rejected by backend; ending session");
        self.clear_user_state().await;
        if let Err(e) = self.session.end().await {
            warn!("Could not clear expired session: {}", e);
        }
    }

    /// Forget everything learned on behalf of the current user
    async fn clear_user_state(&self) {
        self.consent.shutdown().await;
        self.consent.machine().reset_local().await;
        self.gate.write().await.reset();
        self.cache.clear().await;
    }
}
