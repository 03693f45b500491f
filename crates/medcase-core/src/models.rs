//! Domain models for document extraction and autofill.
//!
//! Field names follow the backend wire format via serde renames; the Rust
//! names describe what the values mean.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

// =============================================================================
// EXTRACTION REQUEST
// =============================================================================

/// Extraction depth selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExtractionMode {
    /// Page text only.
    #[default]
    #[serde(rename = "text")]
    TextOnly,
    /// Page text plus a secondary table/image detection job.
    #[serde(rename = "full")]
    Full,
}

impl ExtractionMode {
    /// Wire value sent in the multipart `mode` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextOnly => "text",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::TextOnly),
            "full" => Ok(Self::Full),
            _ => Err(Error::InvalidInput(format!("Unknown extraction mode: {}", s))),
        }
    }
}

// =============================================================================
// EXTRACTION RESULT
// =============================================================================

/// OCR output for a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number.
    #[serde(rename = "page")]
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
    /// Engine confidence in [0, 1], as reported by the backend.
    #[serde(rename = "confidence", default)]
    pub confidence_score: f64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Timing and engine information attached to an extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractionMetadata {
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub elapsed_ms: u64,
    #[serde(rename = "engine", default)]
    pub engine_name: String,
    /// Time spent in the synchronous text phase, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_extraction_ms: Option<u64>,
}

/// State of the secondary table/image job as reported alongside a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableJobStatus {
    Queued,
    Running,
    Done,
    Failed,
    /// Text-only submission; no secondary job exists.
    NotRequested,
    /// The backend's background queue was down when the job would have been queued.
    Unavailable,
}

/// Final output of a text extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExtractionResult {
    #[serde(rename = "text", default)]
    pub full_text: String,
    #[serde(default)]
    pub pages: Vec<PageResult>,
    #[serde(rename = "structured", default)]
    pub structured_fields: Map<String, JsonValue>,
    #[serde(default)]
    pub metadata: ExtractionMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_job_status: Option<TableJobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_job_error: Option<String>,
}

impl ExtractionResult {
    /// True when the extraction produced any non-whitespace text.
    pub fn has_text(&self) -> bool {
        !self.full_text.trim().is_empty()
    }

    /// Check that page numbers are 1-based and strictly increasing.
    pub fn pages_are_ordered(&self) -> bool {
        let mut previous = 0;
        for page in &self.pages {
            if page.page_number <= previous {
                return false;
            }
            previous = page.page_number;
        }
        true
    }

    /// Handle for the secondary table/image job, if one is still pending.
    pub fn table_job(&self) -> Option<JobHandle> {
        let job_id = self.table_job_id.as_ref()?;
        match self.table_job_status {
            None | Some(TableJobStatus::Queued) | Some(TableJobStatus::Running) => {
                Some(JobHandle::new(job_id.clone(), JobKind::TableImageExtraction))
            }
            _ => None,
        }
    }
}

// =============================================================================
// JOBS
// =============================================================================

/// Kind of backend job a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    TextExtraction,
    TableImageExtraction,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextExtraction => write!(f, "OCR processing"),
            Self::TableImageExtraction => write!(f, "Table/image extraction"),
        }
    }
}

/// Handle for a queued backend job. Owned by the poller until it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub kind: JobKind,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
        }
    }
}

/// Status of a backend job carrying payload `T` once done.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus<T> {
    Queued,
    Running,
    Done(T),
    Failed(String),
}

impl<T> JobStatus<T> {
    /// Done and Failed are terminal; the backend never moves a job out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }
}

/// Immediate answer to an extraction submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Processed inline (HTTP 200).
    Completed(ExtractionResult),
    /// Deferred to a background job (HTTP 202).
    Queued(JobHandle),
}

// =============================================================================
// TABLE / IMAGE ARTIFACTS
// =============================================================================

/// A table detected on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableArtifact {
    pub page: u32,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub markdown: String,
}

/// An embedded image detected on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub page: u32,
    #[serde(default)]
    pub bbox: Vec<f64>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: String,
}

/// Output of the secondary table/image job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableImageArtifacts {
    #[serde(default)]
    pub tables: Vec<TableArtifact>,
    #[serde(default)]
    pub images: Vec<ImageArtifact>,
}

// =============================================================================
// AUTOFILL
// =============================================================================

/// A case-template field matched to a heading in the OCR text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub value: JsonValue,
    #[serde(rename = "confidence", default)]
    pub confidence_score: f64,
    #[serde(rename = "matched_heading", default)]
    pub matched_heading_text: String,
}

/// A match for a top-level field, or a group of matches for a nested section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldMatchEntry {
    Field(FieldMatch),
    Group(BTreeMap<String, FieldMatch>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AutofillMetadata {
    #[serde(rename = "fields_matched", default)]
    pub fields_matched_count: u32,
    #[serde(default)]
    pub elapsed_ms: u64,
}

/// Result of matching extracted text to case-template fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AutofillResult {
    #[serde(rename = "structured", default)]
    pub structured_fields: Map<String, JsonValue>,
    #[serde(default)]
    pub matches: BTreeMap<String, FieldMatchEntry>,
    #[serde(default)]
    pub metadata: AutofillMetadata,
}

impl AutofillResult {
    /// Result used when there was no text to match against.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.structured_fields.is_empty() && self.matches.is_empty()
    }
}

/// Extraction and autofill results returned together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub extraction: ExtractionResult,
    pub autofill: AutofillResult,
}
