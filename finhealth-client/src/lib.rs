//! finhealth-client library interface
//!
//! Client-side coordination layer for the financial-health dashboard:
//! session, document ingestion gate, bank consent linking, metrics cache
//! and report export, all driven through [`Dashboard`].

pub mod consent;
pub mod dashboard;
pub mod error;
pub mod ingestion;
pub mod metrics_cache;
pub mod report;
pub mod services;
pub mod session;

#[cfg(test)]
mod test_support;

pub use crate::dashboard::{Dashboard, SignupForm};
pub use crate::error::{ClientError, ClientResult};
