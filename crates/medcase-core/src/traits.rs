//! Collaborator traits for the OCR backend.
//!
//! The extraction client only talks to the backend through [`OcrApi`], so the
//! HTTP transport can be swapped for a scripted stub in tests.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{
    AutofillResult, ExtractionMode, ExtractionResult, JobStatus, Submission, TableImageArtifacts,
};
use crate::upload::DocumentUpload;

/// Remote OCR service contract.
///
/// Every call takes the caller's cancellation token; implementations must abort
/// the in-flight request and return [`crate::Error::Cancelled`] once it fires.
#[async_trait]
pub trait OcrApi: Send + Sync {
    /// Submit a document. Answers either with a finished result or a queued job.
    async fn submit_extraction(
        &self,
        upload: &DocumentUpload,
        mode: ExtractionMode,
        cancel: &CancellationToken,
    ) -> Result<Submission>;

    /// Query a text extraction job.
    async fn text_job_status(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobStatus<ExtractionResult>>;

    /// Query a table/image extraction job.
    async fn table_job_status(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobStatus<TableImageArtifacts>>;

    /// Match extracted text against case-template fields.
    async fn autofill(
        &self,
        text: &str,
        confidence_threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<AutofillResult>;
}
