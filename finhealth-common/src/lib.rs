//! # finhealth Common Library
//!
//! Shared code for the financial-health dashboard client:
//! - API request/response types (wire format of the dashboard backend)
//! - Event types (`DashboardEvent`) and the `EventBus`
//! - Configuration loading
//! - Error types

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
