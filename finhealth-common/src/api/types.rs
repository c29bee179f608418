//! Shared API request/response types
//!
//! Wire format of the dashboard backend. Field names follow the backend's
//! snake_case JSON. Metric bodies are opaque: the client only interprets
//! `has_any_data` and hands the rest to views untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ========================================
// Authentication Types
// ========================================

/// `POST /auth/login` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Cached user profile returned with a login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,

    /// Display name (backend field `full_name`)
    #[serde(rename = "full_name", default)]
    pub display_name: String,

    /// Organization name (backend field `company_name`)
    #[serde(rename = "company_name", default)]
    pub organization_name: String,
}

/// `POST /auth/login` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    pub user: UserProfile,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// `POST /auth/signup` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub company_name: String,
}

/// Generic acknowledgement (`{"message": ...}` or `{"status": ...}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// ========================================
// Error Response Types
// ========================================

/// Error body returned by the backend on 4xx/5xx
///
/// `detail` is usually a string, but request-validation failures carry a
/// list of objects with a `msg` field.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Value,
}

impl ApiErrorBody {
    /// Human-readable message suitable for an inline notice
    ///
    /// # Examples
    ///
    /// ```
    /// use finhealth_common::api::types::ApiErrorBody;
    ///
    /// let body: ApiErrorBody = serde_json::from_str(r#"{"detail": "VUA is required"}"#).unwrap();
    /// assert_eq!(body.message(), Some("VUA is required".to_string()));
    /// ```
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("; "))
                }
            }
            _ => None,
        }
    }
}

// ========================================
// Metrics & Notifications
// ========================================

/// `GET /dashboard/metrics` response
///
/// Only `has_any_data` is interpreted. Everything else (health_score,
/// ratios, cash_flow, forecast, insights, anomalies, lending, benchmarks,
/// compliance) is kept verbatim in `body`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    #[serde(default)]
    pub has_any_data: bool,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl DashboardMetrics {
    /// Look up a top-level section of the metrics body by name
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Overall health score, when the backend supplied one
    pub fn health_score(&self) -> Option<f64> {
        self.section("health_score")?.get("value")?.as_f64()
    }
}

/// Notification identifier
///
/// Static reminders use integers, anomaly-derived notices use strings such
/// as `"anomaly-12"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NotificationId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for NotificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationId::Number(n) => write!(f, "{}", n),
            NotificationId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One entry of `GET /notifications`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub message: String,

    /// Due date as displayed by the backend (free text, e.g. "10th Feb 2025")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// "high" / "medium" / "low"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

// ========================================
// Consent Linking
// ========================================

/// Consent status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsentWireStatus {
    None,
    Pending,
    Active,
    /// Any status string this client does not understand
    #[serde(other)]
    Unknown,
}

/// `GET /banking/consent/status` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentStatusResponse {
    pub status: ConsentWireStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `POST /banking/consent/initiate` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentInitiateRequest {
    pub account_identifier: String,
}

/// `POST /banking/consent/initiate` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentInitiateResponse {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub consent_id: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}

// ========================================
// Tests
// ========================================
