//! API module for the dashboard backend's HTTP contract
//!
//! Provides the wire types and credential helpers used by the client crates.
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP client dependencies)
//! - Shared request/response types
//!
//! The transport (reqwest) lives in `finhealth-client`.

pub mod auth;
pub mod types;

pub use auth::{bearer_header_value, validate_credential, CredentialError};
pub use types::{
    Ack, ApiErrorBody, ConsentInitiateRequest, ConsentInitiateResponse, ConsentStatusResponse,
    ConsentWireStatus, DashboardMetrics, LoginRequest, LoginResponse, Notification,
    NotificationId, SignupRequest, UserProfile,
};
