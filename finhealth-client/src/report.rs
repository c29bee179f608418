//! Report Export Controller
//!
//! Downloads the generated PDF and hands it to a [`ReportSink`]. Only one
//! export runs at a time; a second call while one is in flight is rejected
//! without touching the network.

use crate::error::{ClientError, ClientResult};
use crate::services::{DashboardApi, ReportArtifact};
use async_trait::async_trait;
use chrono::Utc;
use finhealth_common::events::{DashboardEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

pub const DEFAULT_REPORT_NAME: &str = "Financial_Report.pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Notice shown for any failed export
pub const REPORT_FAILURE_NOTICE: &str =
    "Report generation failed. Please ensure you have uploaded documents.";

/// Where a delivered report ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReport {
    pub location: String,
    pub size_bytes: usize,
}

/// Delivery target for a validated report
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Deliver `artifact`, returning a human-readable location
    async fn deliver(&self, artifact: &ReportArtifact) -> ClientResult<String>;
}

/// Reject anything that is not a non-empty PDF
pub fn validate_report(artifact: &ReportArtifact) -> ClientResult<()> {
    if artifact.bytes.is_empty() {
        return Err(ClientError::MalformedArtifact("empty response".to_string()));
    }
    if !artifact.bytes.starts_with(PDF_MAGIC) {
        return Err(ClientError::MalformedArtifact(format!(
            "not a PDF (content type {})",
            artifact.content_type.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(())
}

/// User-facing notice for a failed export
pub fn failure_notice(err: &ClientError) -> String {
    match err {
        ClientError::Unauthorized(_) | ClientError::ExportInProgress | ClientError::Network(_) => {
            err.user_message()
        }
        _ => REPORT_FAILURE_NOTICE.to_string(),
    }
}

/// Writes reports into a directory
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Temporary `*.part` file, removed on drop unless committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(target: &Path) -> Self {
        let mut name = target.as_os_str().to_os_string();
        name.push(".part");
        Self {
            path: PathBuf::from(name),
            committed: false,
        }
    }

    async fn commit(mut self, target: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %self.path.display(), "Could not remove partial report: {}", e);
                }
            }
        }
    }
}

#[async_trait]
impl ReportSink for FileReportSink {
    async fn deliver(&self, artifact: &ReportArtifact) -> ClientResult<String> {
        let name = artifact
            .file_name
            .as_deref()
            .unwrap_or(DEFAULT_REPORT_NAME);
        let target = self.dir.join(name);

        tokio::fs::create_dir_all(&self.dir).await?;

        let partial = PartialFile::new(&target);
        tokio::fs::write(&partial.path, &artifact.bytes).await?;
        partial.commit(&target).await?;

        Ok(target.display().to_string())
    }
}

/// Runs report exports, one at a time
pub struct ReportExporter {
    api: Arc<dyn DashboardApi>,
    sink: Arc<dyn ReportSink>,
    in_progress: AtomicBool,
    events: EventBus,
}

/// Clears the in-progress flag on every exit path
struct ExportGuard<'a>(&'a AtomicBool);

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ReportExporter {
    pub fn new(api: Arc<dyn DashboardApi>, sink: Arc<dyn ReportSink>, events: EventBus) -> Self {
        Self {
            api,
            sink,
            in_progress: AtomicBool::new(false),
            events,
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Download, validate and deliver the report
    ///
    /// Never retried automatically. Failures emit one `ReportFailed` event
    /// carrying the user-facing notice.
    pub async fn export_report(&self) -> ClientResult<ExportedReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Report export rejected: already in progress");
            return Err(ClientError::ExportInProgress);
        }
        let _guard = ExportGuard(&self.in_progress);

        match self.download_and_deliver().await {
            Ok(report) => {
                info!(location = %report.location, size = report.size_bytes, "Report exported");
                self.events.emit_lossy(DashboardEvent::ReportExported {
                    location: report.location.clone(),
                    size_bytes: report.size_bytes,
                    timestamp: Utc::now(),
                });
                Ok(report)
            }
            Err(e) => {
                error!("Report export failed: {}", e);
                self.events.emit_lossy(DashboardEvent::ReportFailed {
                    message: failure_notice(&e),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn download_and_deliver(&self) -> ClientResult<ExportedReport> {
        let artifact = self.api.download_report().await?;
        validate_report(&artifact)?;

        let location = self.sink.deliver(&artifact).await?;
        Ok(ExportedReport {
            location,
            size_bytes: artifact.bytes.len(),
        })
    }
}
