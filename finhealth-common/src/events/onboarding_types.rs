//! Onboarding-related type definitions
//!
//! Supporting types for document ingestion and consent linking.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Required document category
///
/// The wire name for `TaxFiling` is `gst` (the upload endpoint's
/// `?type=` parameter).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DocumentCategory {
    /// Bank statement
    Bank,
    /// Accounting ledger export
    Accounting,
    /// Tax filing (GST return)
    #[serde(rename = "gst")]
    TaxFiling,
}

impl DocumentCategory {
    /// All categories, in display order
    pub const ALL: [DocumentCategory; 3] = [
        DocumentCategory::Bank,
        DocumentCategory::Accounting,
        DocumentCategory::TaxFiling,
    ];

    /// Value of the upload endpoint's `type` query parameter
    pub fn wire_name(self) -> &'static str {
        match self {
            DocumentCategory::Bank => "bank",
            DocumentCategory::Accounting => "accounting",
            DocumentCategory::TaxFiling => "gst",
        }
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentCategory::Bank => write!(f, "Bank"),
            DocumentCategory::Accounting => write!(f, "Accounting"),
            DocumentCategory::TaxFiling => write!(f, "TaxFiling"),
        }
    }
}

impl FromStr for DocumentCategory {
    type Err = String;

    /// Accepts the wire names plus `tax`/`taxfiling` aliases, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank" => Ok(DocumentCategory::Bank),
            "accounting" => Ok(DocumentCategory::Accounting),
            "gst" | "tax" | "taxfiling" | "tax_filing" => Ok(DocumentCategory::TaxFiling),
            other => Err(format!(
                "unknown document category '{}' (expected bank, accounting or gst)",
                other
            )),
        }
    }
}

/// Local consent-link status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum LinkStatus {
    /// No consent requested (or reset)
    #[default]
    Unlinked,
    /// Consent requested, waiting for the user to approve externally
    PendingApproval,
    /// Approved by the external provider
    Active,
}

impl LinkStatus {
    /// Whether the polling loop should keep running in this state
    pub fn needs_polling(self) -> bool {
        !matches!(self, LinkStatus::Active)
    }
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Unlinked => write!(f, "Unlinked"),
            LinkStatus::PendingApproval => write!(f, "PendingApproval"),
            LinkStatus::Active => write!(f, "Active"),
        }
    }
}
