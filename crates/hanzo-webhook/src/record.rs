//! Normalized records handed to the UI layer

use crate::asset::AssetHandle;
use crate::extract::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ready-to-post text, or the marker that upstream is still generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum ReadyText {
    /// Usable content
    Content(String),
    /// No fallback path produced usable text yet
    Generating,
}

impl ReadyText {
    /// The text, if any
    pub fn as_content(&self) -> Option<&str> {
        match self {
            ReadyText::Content(text) => Some(text),
            ReadyText::Generating => None,
        }
    }

    /// Check if this is the generating sentinel
    pub fn is_generating(&self) -> bool {
        matches!(self, ReadyText::Generating)
    }

    /// Text to render, with the sentinel shown as a status line
    pub fn display_text(&self) -> &str {
        match self {
            ReadyText::Content(text) => text,
            ReadyText::Generating => "Content generating",
        }
    }
}

/// Visual direction suggested alongside the post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualStrategy {
    pub description: Option<String>,
    pub suggestions: Vec<String>,
    pub image_prompt: Option<String>,
}

impl VisualStrategy {
    /// True when no field carries anything
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.suggestions.is_empty() && self.image_prompt.is_none()
    }
}

/// Canonical social content record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContentRecord {
    pub platform: Platform,
    pub ready_to_post_text: ReadyText,
    pub hashtags: Vec<String>,
    pub engagement_score: Option<f64>,
    pub optimal_time: Option<String>,
    pub visual_strategy: Option<VisualStrategy>,
    /// Every path attempted, with its outcome, in evaluation order
    pub extraction_trace: Vec<String>,
    pub raw_payload: Value,
}

impl GeneratedContentRecord {
    /// The path that produced the ready text, if one matched
    pub fn matched_text_path(&self) -> Option<&str> {
        self.extraction_trace.iter().find_map(|entry| {
            entry
                .strip_prefix("ready_to_post_text: ")?
                .strip_suffix(" -> matched")
        })
    }
}

/// Where a decoded asset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetSourceKind {
    RemoteUrl,
    DataUri,
    BinaryBlob,
    MetadataOnly,
}

/// A generated image or file.
///
/// Exactly one of `local_handle` and `remote_url` is set, unless the kind is
/// `MetadataOnly`, in which case neither is and `diagnostic` explains why.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAssetRecord {
    pub source_kind: AssetSourceKind,
    pub mime_type: String,
    #[serde(skip)]
    pub local_handle: Option<AssetHandle>,
    pub remote_url: Option<String>,
    pub original_file_name: Option<String>,
    pub diagnostic: Option<String>,
}

impl GeneratedAssetRecord {
    /// Asset held locally through a registry handle
    pub fn local(
        source_kind: AssetSourceKind,
        mime_type: impl Into<String>,
        handle: AssetHandle,
        original_file_name: Option<String>,
    ) -> Self {
        Self {
            source_kind,
            mime_type: mime_type.into(),
            local_handle: Some(handle),
            remote_url: None,
            original_file_name,
            diagnostic: None,
        }
    }

    /// Asset left on the upstream server
    pub fn remote(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            source_kind: AssetSourceKind::RemoteUrl,
            mime_type: mime_type.into(),
            local_handle: None,
            remote_url: Some(url.into()),
            original_file_name: None,
            diagnostic: None,
        }
    }

    /// File declared upstream without any bytes attached
    pub fn metadata_only(
        mime_type: impl Into<String>,
        original_file_name: Option<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            source_kind: AssetSourceKind::MetadataOnly,
            mime_type: mime_type.into(),
            local_handle: None,
            remote_url: None,
            original_file_name,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// URL the UI can render: the remote URL or the local handle's URL
    pub fn display_url(&self) -> Option<String> {
        self.remote_url
            .clone()
            .or_else(|| self.local_handle.as_ref().map(|h| h.url()))
    }

    /// Release the local resource now instead of on drop
    pub fn release(&mut self) {
        if let Some(handle) = self.local_handle.take() {
            handle.release();
        }
    }
}

/// One invoice that was extracted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub file_name: Option<String>,
    pub invoice_number: Option<String>,
    pub vendor: Option<String>,
    pub date: Option<String>,
    pub total: Option<f64>,
    pub currency: Option<String>,
    pub confidence: Option<f64>,
}

/// One file the pipeline failed on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub file_name: Option<String>,
    pub error: String,
}

/// A quality problem flagged upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityRecord {
    pub file_name: Option<String>,
    pub issue: String,
    pub confidence: Option<f64>,
}

/// Files detected as duplicates of each other
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub file_names: Vec<String>,
    pub invoice_number: Option<String>,
    pub reason: Option<String>,
}

/// Statistics over extracted invoice totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub count: usize,
}

/// Enhanced OCR batch result.
///
/// `financial_summary.count` is reported as upstream sent it, even when it
/// disagrees with `successful_extractions.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrProcessingSummary {
    pub total_items: usize,
    pub successful_extractions: Vec<InvoiceRecord>,
    pub failed_extractions: Vec<FailureRecord>,
    pub quality_issues: Vec<QualityRecord>,
    pub duplicates: Vec<DuplicateRecord>,
    pub financial_summary: FinancialSummary,
    pub recommendations: Vec<String>,
}

impl OcrProcessingSummary {
    /// True when upstream's count and the extraction list disagree
    pub fn has_count_discrepancy(&self) -> bool {
        self.financial_summary.count != self.successful_extractions.len()
    }
}

/// Plain completion payload from the OCR pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicOcrSummary {
    pub success: bool,
    pub processed: usize,
    pub failed: usize,
    pub batch_id: Option<String>,
    pub message: Option<String>,
}

/// What the OCR pipeline returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OcrOutcome {
    Enhanced(OcrProcessingSummary),
    Basic(BasicOcrSummary),
}
