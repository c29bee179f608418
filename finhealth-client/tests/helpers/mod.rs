//! Test Helper Utilities
//!
//! In-process axum stand-in for the dashboard backend, plus client config
//! pointing at it.

#![allow(dead_code)]

pub mod log_capture;

pub use log_capture::LogCapture;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use finhealth_common::config::{ClientConfig, SessionPolicy};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_TOKEN: &str = "test-token-123";
pub const REPORT_BYTES: &[u8] = b"%PDF-1.7\n% test report\ntrailer\n%%EOF\n";
pub const REPORT_FILE_NAME: &str = "Financial_Report_Rao_Traders.pdf";

/// Recorded traffic and scripted answers
#[derive(Default)]
pub struct BackendState {
    /// (path, Authorization header) per request
    pub requests: Mutex<Vec<(String, Option<String>)>>,
    /// `type` query of every accepted upload
    pub uploads: Mutex<Vec<String>>,
    pub reject_uploads: Mutex<Option<String>>,
    pub metrics_fail: AtomicBool,
    pub has_any_data: AtomicBool,
    /// Served in order; the last one sticks
    pub consent_statuses: Mutex<VecDeque<Value>>,
    pub consent_polls: AtomicUsize,
    pub consent_resets: AtomicUsize,
    pub report_downloads: AtomicUsize,
    pub report_delay_ms: AtomicU64,
    pub report_missing: AtomicBool,
}

impl BackendState {
    fn record(&self, path: &str, headers: &HeaderMap) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push((path.to_string(), auth));
    }

    /// Authorization header seen on the most recent request to `path`
    pub fn last_auth(&self, path: &str) -> Option<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, auth)| auth.clone())
    }

    pub fn push_consent_status(&self, status: &str, url: Option<&str>) {
        self.consent_statuses
            .lock()
            .unwrap()
            .push_back(json!({ "status": status, "url": url }));
    }
}

/// Running mock backend; the server task ends with the test runtime
pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        state.has_any_data.store(true, Ordering::SeqCst);

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/signup", post(signup))
            .route("/api/upload", post(upload))
            .route("/api/dashboard/metrics", get(metrics))
            .route("/api/notifications", get(notifications))
            .route("/api/banking/consent/status", get(consent_status))
            .route("/api/banking/consent/initiate", post(consent_initiate))
            .route("/api/banking/consent/reset", post(consent_reset))
            .route("/api/report/download", get(report_download))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}/api", addr),
            state,
        }
    }

    /// Client config against this backend, with files under `dir`
    pub fn config(&self, dir: &Path, policy: SessionPolicy) -> ClientConfig {
        ClientConfig {
            api_base_url: self.base_url.clone(),
            poll_interval: Duration::from_millis(50),
            request_timeout: Duration::from_secs(5),
            session_policy: policy,
            session_file: dir.join("session.json"),
            report_dir: dir.join("reports"),
            log_level: "debug".to_string(),
        }
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(&format!("Bearer {}", TEST_TOKEN)[..])
}

async fn login(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/auth/login", &headers);
    if body["password"] != "correct-horse" {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }
    Json(json!({
        "access_token": TEST_TOKEN,
        "token_type": "bearer",
        "user": {
            "email": body["email"],
            "full_name": "Asha Rao",
            "company_name": "Rao Traders"
        }
    }))
    .into_response()
}

async fn signup(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/auth/signup", &headers);
    Json(json!({ "message": "User created successfully" })).into_response()
}

async fn upload(
    State(state): State<Arc<BackendState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record("/upload", &headers);
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }

    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    let has_file_part = String::from_utf8_lossy(&body).contains("name=\"file\"");
    if !is_multipart || !has_file_part {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "file field missing");
    }

    if let Some(reason) = state.reject_uploads.lock().unwrap().clone() {
        return detail(StatusCode::BAD_REQUEST, &reason);
    }

    let Some(kind) = query.get("type").cloned() else {
        return detail(StatusCode::BAD_REQUEST, "type is required");
    };
    state.uploads.lock().unwrap().push(kind.clone());
    Json(json!({ "message": format!("{} uploaded", kind) })).into_response()
}

async fn metrics(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/dashboard/metrics", &headers);
    if !authorized(&headers) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    if state.metrics_fail.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Metrics engine unavailable");
    }
    Json(json!({
        "has_any_data": state.has_any_data.load(Ordering::SeqCst),
        "health_score": { "value": 68.0, "grade": "B" },
        "ratios": { "current_ratio": 1.4 },
        "insights": ["Receivables are growing faster than revenue"],
        "anomalies": []
    }))
    .into_response()
}

async fn notifications(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/notifications", &headers);
    Json(json!([
        { "id": 1, "title": "GST filing", "message": "GSTR-3B due in 5 days", "priority": "high" },
        { "id": "anomaly-7", "title": "Unusual expense", "message": "Rent doubled this month" }
    ]))
    .into_response()
}

async fn consent_status(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/banking/consent/status", &headers);
    state.consent_polls.fetch_add(1, Ordering::SeqCst);

    let mut statuses = state.consent_statuses.lock().unwrap();
    let status = if statuses.len() > 1 {
        statuses.pop_front()
    } else {
        statuses.front().cloned()
    };
    Json(status.unwrap_or_else(|| json!({ "status": "NONE" }))).into_response()
}

async fn consent_initiate(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record("/banking/consent/initiate", &headers);
    let identifier = body["account_identifier"].as_str().unwrap_or_default();
    if identifier.is_empty() {
        return detail(StatusCode::BAD_REQUEST, "VUA is required");
    }
    Json(json!({
        "url": format!("https://fiu-sandbox.example/consent/{}", identifier),
        "consent_id": "c-42",
        "status": "PENDING"
    }))
    .into_response()
}

async fn consent_reset(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/banking/consent/reset", &headers);
    state.consent_resets.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "message": "Consent reset" })).into_response()
}

async fn report_download(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    state.record("/report/download", &headers);
    state.report_downloads.fetch_add(1, Ordering::SeqCst);

    let delay = state.report_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.report_missing.load(Ordering::SeqCst) {
        return detail(StatusCode::NOT_FOUND, "No financial data found for report");
    }

    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILE_NAME),
            ),
        ],
        REPORT_BYTES,
    )
        .into_response()
}
