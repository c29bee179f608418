//! Dashboard backend API client
//!
//! Transport-agnostic contract ([`DashboardApi`]) plus the reqwest
//! implementation. Every request carries the session credential as a
//! bearer header when one is present; with no session the header is simply
//! omitted.

use crate::error::{ClientError, ClientResult};
use crate::session::SessionStore;
use async_trait::async_trait;
use finhealth_common::api::{
    bearer_header_value, Ack, ApiErrorBody, ConsentInitiateRequest, ConsentInitiateResponse,
    ConsentStatusResponse, DashboardMetrics, LoginRequest, LoginResponse, Notification,
    SignupRequest,
};
use finhealth_common::config::ClientConfig;
use finhealth_common::events::DocumentCategory;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("finhealth-client/", env!("CARGO_PKG_VERSION"));

/// Binary report as downloaded, before delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Server-suggested file name (from `Content-Disposition`)
    pub file_name: Option<String>,
}

/// Backend operations used by the coordination layer
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse>;

    /// `POST /auth/signup`
    async fn signup(&self, request: &SignupRequest) -> ClientResult<Ack>;

    /// `POST /upload?type=<category>` with a multipart `file` field
    async fn upload_document(
        &self,
        category: DocumentCategory,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<Ack>;

    /// `GET /dashboard/metrics`
    async fn fetch_metrics(&self) -> ClientResult<DashboardMetrics>;

    /// `GET /notifications`
    async fn fetch_notifications(&self) -> ClientResult<Vec<Notification>>;

    /// `GET /banking/consent/status`
    async fn consent_status(&self) -> ClientResult<ConsentStatusResponse>;

    /// `POST /banking/consent/initiate`
    async fn initiate_consent(
        &self,
        request: &ConsentInitiateRequest,
    ) -> ClientResult<ConsentInitiateResponse>;

    /// `POST /banking/consent/reset`
    async fn reset_consent(&self) -> ClientResult<Ack>;

    /// `GET /report/download`
    async fn download_report(&self) -> ClientResult<ReportArtifact>;
}

/// reqwest-backed [`DashboardApi`]
pub struct HttpDashboardApi {
    http_client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpDashboardApi {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> ClientResult<Self> {
        Self::with_timeout(&config.api_base_url, config.request_timeout, session)
    }

    /// Build a client for an explicit base URL (already normalized, no trailing slash)
    pub fn with_timeout(
        base_url: &str,
        timeout: Duration,
        session: Arc<SessionStore>,
    ) -> ClientResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http_client.request(method, url);

        match bearer_header_value(self.session.credential().await.as_deref()) {
            Some(value) => builder.header(AUTHORIZATION, value),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> ClientResult<Response> {
        tracing::debug!(operation, "Sending dashboard API request");

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(operation, "Dashboard API request failed: {}", e);
            ClientError::Network(e.to_string())
        })?;

        check_status(response, operation).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        operation: &str,
    ) -> ClientResult<T> {
        let response = self.send(builder, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(format!("{}: {}", operation, e)))
    }
}

/// Map non-success answers to [`ClientError`], extracting the backend's `detail`
async fn check_status(response: Response, operation: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(|body| body.message())
        .or_else(|| {
            let trimmed = text.trim();
            (!trimmed.is_empty() && trimmed.len() <= 200).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    tracing::warn!(
        operation,
        status = status.as_u16(),
        detail = %detail,
        "Dashboard API returned error"
    );

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(detail));
    }

    Err(ClientError::Api {
        status: status.as_u16(),
        detail,
    })
}

/// Extract `filename` from a `Content-Disposition` header value
///
/// Handles quoted and unquoted forms; path components are stripped.
pub fn content_disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(name).to_string())
        .filter(|name| !name.is_empty() && name != "." && name != "..")
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse> {
        let builder = self.request(Method::POST, "/auth/login").await.json(request);
        self.send_json(builder, "login").await
    }

    async fn signup(&self, request: &SignupRequest) -> ClientResult<Ack> {
        let builder = self.request(Method::POST, "/auth/signup").await.json(request);
        self.send_json(builder, "signup").await
    }

    async fn upload_document(
        &self,
        category: DocumentCategory,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<Ack> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let builder = self
            .request(Method::POST, "/upload")
            .await
            .query(&[("type", category.wire_name())])
            .multipart(form);

        tracing::info!(category = %category, file_name, size, "Uploading document");
        let response = self.send(builder, "upload").await?;

        // Some deployments answer with an empty body
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    async fn fetch_metrics(&self) -> ClientResult<DashboardMetrics> {
        let builder = self.request(Method::GET, "/dashboard/metrics").await;
        self.send_json(builder, "fetch metrics").await
    }

    async fn fetch_notifications(&self) -> ClientResult<Vec<Notification>> {
        let builder = self.request(Method::GET, "/notifications").await;
        // A null body means "nothing to show"
        let list: Option<Vec<Notification>> =
            self.send_json(builder, "fetch notifications").await?;
        Ok(list.unwrap_or_default())
    }

    async fn consent_status(&self) -> ClientResult<ConsentStatusResponse> {
        let builder = self.request(Method::GET, "/banking/consent/status").await;
        self.send_json(builder, "consent status").await
    }

    async fn initiate_consent(
        &self,
        request: &ConsentInitiateRequest,
    ) -> ClientResult<ConsentInitiateResponse> {
        let builder = self
            .request(Method::POST, "/banking/consent/initiate")
            .await
            .json(request);
        self.send_json(builder, "initiate consent").await
    }

    async fn reset_consent(&self) -> ClientResult<Ack> {
        let builder = self.request(Method::POST, "/banking/consent/reset").await;
        let response = self.send(builder, "reset consent").await?;
        let text = response.text().await.unwrap_or_default();
        Ok(serde_json::from_str(&text).unwrap_or_default())
    }

    async fn download_report(&self) -> ClientResult<ReportArtifact> {
        let builder = self
            .request(Method::GET, "/report/download")
            .await
            .header(ACCEPT, "application/pdf");
        let response = self.send(builder, "download report").await?;

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(content_disposition_filename);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?
            .to_vec();

        tracing::info!(size = bytes.len(), file_name = ?file_name, "Report downloaded");

        Ok(ReportArtifact {
            bytes,
            content_type,
            file_name,
        })
    }
}
