//! Session credential handling for outbound requests
//!
//! The backend issues an opaque access token on login. Every authenticated
//! request carries it as `Authorization: Bearer <token>` while a session is
//! present. A missing credential is not an error at request-construction
//! time: the request simply goes out without the header and the backend
//! answers 401.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. Attaching the header to a
//! concrete HTTP request is done by the client crate.

// ========================================
// Error Types
// ========================================

/// Credential validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Token is empty or whitespace only
    Empty,

    /// Token contains characters that cannot appear in an HTTP header value
    InvalidCharacters,
}

impl std::fmt::Display for CredentialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialError::Empty => write!(f, "Credential is empty"),
            CredentialError::InvalidCharacters => {
                write!(f, "Credential contains characters not allowed in a header")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

// ========================================
// Validation
// ========================================

/// Validate an access token before it is stored in the session
///
/// # Examples
///
/// ```
/// use finhealth_common::api::auth::{validate_credential, CredentialError};
///
/// assert!(validate_credential("eyJhbGciOi.abc.def").is_ok());
/// assert_eq!(validate_credential("   "), Err(CredentialError::Empty));
/// assert_eq!(validate_credential("bad\ntoken"), Err(CredentialError::InvalidCharacters));
/// ```
pub fn validate_credential(token: &str) -> Result<(), CredentialError> {
    if token.trim().is_empty() {
        return Err(CredentialError::Empty);
    }

    // Visible ASCII only (RFC 7230 field-vchar without obs-text)
    if !token.bytes().all(|b| (0x21..=0x7e).contains(&b)) {
        return Err(CredentialError::InvalidCharacters);
    }

    Ok(())
}

// ========================================
// Header Construction
// ========================================

/// Build the `Authorization` header value for an optional credential
///
/// Returns `None` when no usable credential is present, so callers can skip
/// the header instead of failing.
///
/// # Examples
///
/// ```
/// use finhealth_common::api::auth::bearer_header_value;
///
/// assert_eq!(bearer_header_value(Some("tok123")), Some("Bearer tok123".to_string()));
/// assert_eq!(bearer_header_value(None), None);
/// assert_eq!(bearer_header_value(Some("")), None);
/// ```
pub fn bearer_header_value(credential: Option<&str>) -> Option<String> {
    let token = credential?;
    validate_credential(token).ok()?;
    Some(format!("Bearer {}", token))
}
