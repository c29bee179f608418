//! In-memory [`DashboardApi`] for unit tests
//!
//! Responses are scripted per operation; every call is counted by name.

use crate::error::{ClientError, ClientResult};
use crate::services::{DashboardApi, ReportArtifact};
use async_trait::async_trait;
use finhealth_common::api::{
    Ack, ConsentInitiateRequest, ConsentInitiateResponse, ConsentStatusResponse,
    ConsentWireStatus, DashboardMetrics, LoginRequest, LoginResponse, Notification,
    SignupRequest, UserProfile,
};
use finhealth_common::events::DocumentCategory;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n%%EOF\n";

/// Scripted failure: status plus backend detail
#[derive(Debug, Clone)]
struct Failure {
    status: u16,
    detail: String,
}

impl Failure {
    fn new(status: u16, detail: &str) -> Self {
        Self {
            status,
            detail: detail.to_string(),
        }
    }

    fn to_error(&self) -> ClientError {
        if self.status == 401 {
            ClientError::Unauthorized(self.detail.clone())
        } else {
            ClientError::Api {
                status: self.status,
                detail: self.detail.clone(),
            }
        }
    }
}

struct Script {
    calls: HashMap<&'static str, usize>,
    login: Result<LoginResponse, Failure>,
    upload_failure: Option<Failure>,
    metrics: Result<DashboardMetrics, Failure>,
    metrics_delay: Duration,
    notifications: Result<Vec<Notification>, Failure>,
    consent_statuses: VecDeque<ConsentStatusResponse>,
    consent_failures: usize,
    consent_delay: Duration,
    initiate: Result<Option<String>, Failure>,
    reset_failure: Option<Failure>,
    report: Result<ReportArtifact, Failure>,
    report_delay: Duration,
}

pub struct MockApi {
    script: Mutex<Script>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                calls: HashMap::new(),
                login: Ok(sample_login("tok-mock")),
                upload_failure: None,
                metrics: Ok(sample_metrics(true)),
                metrics_delay: Duration::ZERO,
                notifications: Ok(Vec::new()),
                consent_statuses: VecDeque::new(),
                consent_failures: 0,
                consent_delay: Duration::ZERO,
                initiate: Ok(Some("https://consent.example/default".to_string())),
                reset_failure: None,
                report: Ok(ReportArtifact {
                    bytes: SAMPLE_PDF.to_vec(),
                    content_type: Some("application/pdf".to_string()),
                    file_name: None,
                }),
                report_delay: Duration::ZERO,
            }),
        }
    }

    /// Number of calls made to `operation` so far
    pub fn calls(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or(0)
    }

    pub fn fail_login(&self, status: u16, detail: &str) {
        self.lock().login = Err(Failure::new(status, detail));
    }

    pub fn fail_uploads(&self, detail: &str) {
        self.lock().upload_failure = Some(Failure::new(400, detail));
    }

    pub fn set_metrics(&self, metrics: DashboardMetrics) {
        self.lock().metrics = Ok(metrics);
    }

    pub fn fail_metrics(&self, status: u16, detail: &str) {
        self.lock().metrics = Err(Failure::new(status, detail));
    }

    pub fn delay_metrics(&self, delay: Duration) {
        self.lock().metrics_delay = delay;
    }

    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        self.lock().notifications = Ok(notifications);
    }

    pub fn fail_notifications(&self, status: u16, detail: &str) {
        self.lock().notifications = Err(Failure::new(status, detail));
    }

    /// Queue a status report; the last one queued keeps being served
    pub fn push_consent_status(&self, response: ConsentStatusResponse) {
        self.lock().consent_statuses.push_back(response);
    }

    pub fn fail_consent_status_once(&self) {
        self.lock().consent_failures += 1;
    }

    pub fn delay_consent_status(&self, delay: Duration) {
        self.lock().consent_delay = delay;
    }

    pub fn set_initiate_url(&self, url: Option<&str>) {
        self.lock().initiate = Ok(url.map(str::to_string));
    }

    pub fn fail_initiate(&self, status: u16, detail: &str) {
        self.lock().initiate = Err(Failure::new(status, detail));
    }

    pub fn fail_consent_reset(&self, status: u16, detail: &str) {
        self.lock().reset_failure = Some(Failure::new(status, detail));
    }

    pub fn set_report(&self, bytes: &[u8], file_name: Option<&str>) {
        self.lock().report = Ok(ReportArtifact {
            bytes: bytes.to_vec(),
            content_type: Some("application/pdf".to_string()),
            file_name: file_name.map(str::to_string),
        });
    }

    pub fn fail_report(&self, status: u16, detail: &str) {
        self.lock().report = Err(Failure::new(status, detail));
    }

    pub fn delay_report(&self, delay: Duration) {
        self.lock().report_delay = delay;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    fn record(&self, operation: &'static str) {
        *self.lock().calls.entry(operation).or_insert(0) += 1;
    }
}

pub fn sample_login(token: &str) -> LoginResponse {
    LoginResponse {
        access_token: token.to_string(),
        token_type: "bearer".to_string(),
        user: UserProfile {
            email: "owner@rao.in".to_string(),
            display_name: "Asha Rao".to_string(),
            organization_name: "Rao Traders".to_string(),
        },
    }
}

pub fn sample_metrics(has_any_data: bool) -> DashboardMetrics {
    let body = serde_json::json!({
        "health_score": { "value": 72.5, "grade": "B" },
        "cash_flow": { "net": 125000 }
    });
    DashboardMetrics {
        has_any_data,
        body: body.as_object().cloned().unwrap_or_default(),
    }
}

#[async_trait]
impl DashboardApi for MockApi {
    async fn login(&self, _request: &LoginRequest) -> ClientResult<LoginResponse> {
        self.record("login");
        self.lock().login.clone().map_err(|f| f.to_error())
    }

    async fn signup(&self, _request: &SignupRequest) -> ClientResult<Ack> {
        self.record("signup");
        Ok(Ack::default())
    }

    async fn upload_document(
        &self,
        _category: DocumentCategory,
        _file_name: &str,
        _bytes: Vec<u8>,
    ) -> ClientResult<Ack> {
        self.record("upload");
        match &self.lock().upload_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(Ack::default()),
        }
    }

    async fn fetch_metrics(&self) -> ClientResult<DashboardMetrics> {
        self.record("fetch_metrics");
        let delay = self.lock().metrics_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.lock().metrics.clone().map_err(|f| f.to_error())
    }

    async fn fetch_notifications(&self) -> ClientResult<Vec<Notification>> {
        self.record("fetch_notifications");
        self.lock().notifications.clone().map_err(|f| f.to_error())
    }

    async fn consent_status(&self) -> ClientResult<ConsentStatusResponse> {
        self.record("consent_status");
        let delay = self.lock().consent_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.lock();
        if script.consent_failures > 0 {
            script.consent_failures -= 1;
            return Err(ClientError::Network("connection reset".to_string()));
        }
        let response = if script.consent_statuses.len() > 1 {
            script.consent_statuses.pop_front()
        } else {
            script.consent_statuses.front().cloned()
        };
        Ok(response.unwrap_or(ConsentStatusResponse {
            status: ConsentWireStatus::None,
            url: None,
        }))
    }

    async fn initiate_consent(
        &self,
        _request: &ConsentInitiateRequest,
    ) -> ClientResult<ConsentInitiateResponse> {
        self.record("initiate_consent");
        let url = self.lock().initiate.clone().map_err(|f| f.to_error())?;
        Ok(ConsentInitiateResponse {
            url,
            consent_id: Some("consent-1".to_string()),
            status: Some("PENDING".to_string()),
        })
    }

    async fn reset_consent(&self) -> ClientResult<Ack> {
        self.record("reset_consent");
        match &self.lock().reset_failure {
            Some(failure) => Err(failure.to_error()),
            None => Ok(Ack::default()),
        }
    }

    async fn download_report(&self) -> ClientResult<ReportArtifact> {
        self.record("download_report");
        let delay = self.lock().report_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.lock().report.clone().map_err(|f| f.to_error())
    }
}
