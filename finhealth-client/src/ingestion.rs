//! Document Ingestion Gate
//!
//! Three required document categories must each have a confirmed upload
//! before metrics may be computed. The gate only records confirmations;
//! failed uploads never reach it.

use crate::error::{ClientError, ClientResult};
use crate::services::DashboardApi;
use chrono::Utc;
use finhealth_common::events::{DashboardEvent, DocumentCategory, EventBus};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Upload state of one category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentSlot {
    pub category: DocumentCategory,
    pub uploaded: bool,
}

/// Tracks completion of the three required categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionGate {
    slots: [DocumentSlot; 3],
}

impl IngestionGate {
    pub fn new() -> Self {
        Self {
            slots: DocumentCategory::ALL.map(|category| DocumentSlot {
                category,
                uploaded: false,
            }),
        }
    }

    /// Record a confirmed upload; repeated calls are no-ops
    pub fn mark_uploaded(&mut self, category: DocumentCategory) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.category == category) {
            slot.uploaded = true;
        }
    }

    /// True iff bank, accounting and tax filing are all uploaded
    pub fn is_ready(&self) -> bool {
        self.slots.iter().all(|s| s.uploaded)
    }

    /// All three slots in display order
    pub fn slots(&self) -> &[DocumentSlot; 3] {
        &self.slots
    }

    /// Categories still missing
    pub fn pending(&self) -> Vec<DocumentCategory> {
        self.slots
            .iter()
            .filter(|s| !s.uploaded)
            .map(|s| s.category)
            .collect()
    }

    /// Start a new onboarding episode with nothing uploaded
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for IngestionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends documents to the backend and records confirmed uploads in the gate
pub struct DocumentUploader {
    api: Arc<dyn DashboardApi>,
    gate: Arc<RwLock<IngestionGate>>,
    events: EventBus,
}

impl DocumentUploader {
    pub fn new(api: Arc<dyn DashboardApi>, gate: Arc<RwLock<IngestionGate>>, events: EventBus) -> Self {
        Self { api, gate, events }
    }

    /// Upload one document
    ///
    /// Empty payloads and blank file names are rejected without a request.
    /// On failure the gate is untouched and the error carries the backend's
    /// human-readable detail.
    pub async fn upload(
        &self,
        category: DocumentCategory,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ClientResult<()> {
        if file_name.trim().is_empty() {
            return Err(ClientError::Validation("Select a file to upload".to_string()));
        }
        if bytes.is_empty() {
            return Err(ClientError::Validation(format!("{} is empty", file_name)));
        }

        self.api.upload_document(category, file_name, bytes).await?;

        let became_ready = {
            let mut gate = self.gate.write().await;
            let was_ready = gate.is_ready();
            gate.mark_uploaded(category);
            !was_ready && gate.is_ready()
        };

        info!(category = %category, file_name, "Upload confirmed");
        self.events.emit_lossy(DashboardEvent::DocumentUploaded {
            category,
            timestamp: Utc::now(),
        });

        if became_ready {
            debug!("All required documents uploaded");
            self.events.emit_lossy(DashboardEvent::IngestionReady {
                timestamp: Utc::now(),
            });
        }
        Ok(())
    }
}
