//! Error types for finhealth-client
//!
//! Every coordination-layer operation returns [`ClientResult`]. Each error
//! maps to one short, user-facing notice via [`ClientError::user_message`];
//! views show it inline next to the action that failed.

use finhealth_common::events::LinkStatus;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connection refused, timeout, TLS); retryable
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },

    /// Backend rejected the session credential (401)
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// Request rejected locally before reaching the network
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Operation not allowed in the current consent state
    #[error("Cannot {action} while consent is {state}")]
    InvalidTransition {
        action: &'static str,
        state: LinkStatus,
    },

    /// A report export is already running
    #[error("Report export already in progress")]
    ExportInProgress,

    /// Downloaded report is not a usable artifact
    #[error("Malformed report: {0}")]
    MalformedArtifact(String),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// finhealth-common error
    #[error("Common error: {0}")]
    Common(#[from] finhealth_common::Error),
}

impl ClientError {
    /// Whether repeating the same request may succeed
    ///
    /// Network failures and 5xx/429 answers are transient. Validation,
    /// state and 4xx errors need the caller to change something first.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(_) => true,
            ClientError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Short message for an inline, dismissable notice
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Api { detail, .. } => detail.clone(),
            ClientError::Unauthorized(_) => "Your session has expired. Please log in again.".to_string(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::InvalidTransition { .. } => self.to_string(),
            ClientError::ExportInProgress => "A report is already being generated.".to_string(),
            ClientError::MalformedArtifact(_) => {
                "Report generation failed. Please ensure you have uploaded documents.".to_string()
            }
            ClientError::Decode(_) => "The server sent an unexpected response.".to_string(),
            ClientError::Io(e) => format!("Could not save file: {}", e),
            ClientError::Common(e) => e.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Api {
                status: status.as_u16(),
                detail: err.to_string(),
            }
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
