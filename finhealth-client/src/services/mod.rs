//! Service modules talking to the dashboard backend
//!
//! `DashboardApi` is the seam every coordination component depends on;
//! `HttpDashboardApi` is the production implementation over reqwest.

pub mod dashboard_client;

pub use dashboard_client::{DashboardApi, HttpDashboardApi, ReportArtifact};
