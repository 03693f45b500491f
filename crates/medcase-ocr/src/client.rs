//! Asynchronous extraction client.
//!
//! [`AsyncExtractionClient`] hides whether the backend processed a document
//! inline (HTTP 200) or queued it (HTTP 202) behind one call, polls queued
//! jobs within a bounded budget, and can chain autofill on the extracted text.
//!
//! Cancellation is client-local: abandoning a poll does not stop the backend
//! job, which keeps running until the backend discards it.
//!
//! # Example
//!
//! ```rust,no_run
//! use medcase_ocr::{AsyncExtractionClient, OcrClientConfig};
//! use medcase_core::{DocumentUpload, ExtractionMode};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> medcase_core::Result<()> {
//!     let client = AsyncExtractionClient::from_config(&OcrClientConfig::from_env())?;
//!     let upload = DocumentUpload::from_path(std::path::Path::new("scan.pdf")).await?;
//!     let result = client
//!         .extract_text(&upload, ExtractionMode::TextOnly, &CancellationToken::new())
//!         .await?;
//!     println!("{}", result.full_text);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use medcase_core::{
    logging, AutofillResult, DocumentUpload, Error, ExtractionMode, ExtractionOutcome,
    ExtractionResult, JobHandle, JobKind, OcrApi, Result, Submission, TableImageArtifacts,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use crate::config::{OcrClientConfig, PollSettings};
use crate::http::HttpOcrApi;
use crate::poll::{poll_until_terminal, remap_cancellation};

/// Client for the OCR extraction backend.
pub struct AsyncExtractionClient {
    api: Arc<dyn OcrApi>,
    text_poll: PollSettings,
    table_poll: PollSettings,
    autofill_confidence: f64,
}

impl AsyncExtractionClient {
    /// Create a client over any backend implementation, with default budgets.
    pub fn new(api: Arc<dyn OcrApi>) -> Self {
        let defaults = OcrClientConfig::default();
        Self {
            api,
            text_poll: defaults.text_poll,
            table_poll: defaults.table_poll,
            autofill_confidence: defaults.autofill_confidence,
        }
    }

    /// Create a client talking HTTP to the configured backend.
    pub fn from_config(config: &OcrClientConfig) -> Result<Self> {
        let api = HttpOcrApi::new(config)?;
        Ok(Self {
            api: Arc::new(api),
            text_poll: config.text_poll,
            table_poll: config.table_poll,
            autofill_confidence: config.autofill_confidence,
        })
    }

    /// Set the budget used when a submission is queued.
    pub fn with_text_poll(mut self, settings: PollSettings) -> Self {
        self.text_poll = settings;
        self
    }

    /// Set the default budget for table/image jobs.
    pub fn with_table_poll(mut self, settings: PollSettings) -> Self {
        self.table_poll = settings;
        self
    }

    pub fn text_poll(&self) -> PollSettings {
        self.text_poll
    }

    pub fn table_poll(&self) -> PollSettings {
        self.table_poll
    }

    /// Configured default autofill threshold.
    pub fn autofill_confidence(&self) -> f64 {
        self.autofill_confidence
    }

    /// Extract text from a document.
    ///
    /// Returns the backend's inline result directly, or polls the queued job
    /// with the text budget until it completes. Fails with `Cancelled` and no
    /// network call if `cancel` has already fired.
    pub async fn extract_text(
        &self,
        upload: &DocumentUpload,
        mode: ExtractionMode,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let span = extract_span(upload, mode);

        async move {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if upload.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "File {} is empty",
                    upload.file_name
                )));
            }
            self.text_poll.validate("Text extraction")?;

            let started = Instant::now();
            let submission = race_cancel(cancel, self.api.submit_extraction(upload, mode, cancel))
                .await?;

            let result = match submission {
                Submission::Completed(result) => {
                    debug!("Extraction completed synchronously");
                    result
                }
                Submission::Queued(handle) => {
                    Span::current().record(logging::JOB_ID, handle.job_id.as_str());
                    self.poll_job_status(&handle.job_id, self.text_poll, cancel)
                        .await?
                }
            };

            let span = Span::current();
            span.record(logging::PAGE_COUNT, result.pages.len() as u64);
            span.record(logging::DURATION_MS, started.elapsed().as_millis() as u64);
            if let Some(table_job_id) = result.table_job_id.as_deref() {
                span.record(logging::TABLE_JOB_ID, table_job_id);
            }
            info!("Extraction finished");
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Poll a text extraction job until it is done, failed, timed out or cancelled.
    pub async fn poll_job_status(
        &self,
        job_id: &str,
        settings: PollSettings,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResult> {
        let job = JobHandle::new(job_id, JobKind::TextExtraction);
        debug!(
            job_id,
            interval_ms = settings.interval.as_millis() as u64,
            timeout_ms = settings.timeout.as_millis() as u64,
            "Polling text extraction job"
        );
        poll_until_terminal(&job, settings, cancel, || {
            self.api.text_job_status(job_id, cancel)
        })
        .await
    }

    /// Poll the secondary table/image job queued by a `Full` mode extraction.
    pub async fn poll_table_image_job(
        &self,
        job_id: &str,
        settings: PollSettings,
        cancel: &CancellationToken,
    ) -> Result<TableImageArtifacts> {
        let job = JobHandle::new(job_id, JobKind::TableImageExtraction);
        debug!(
            job_id,
            interval_ms = settings.interval.as_millis() as u64,
            timeout_ms = settings.timeout.as_millis() as u64,
            "Polling table/image extraction job"
        );
        let artifacts = poll_until_terminal(&job, settings, cancel, || {
            self.api.table_job_status(job_id, cancel)
        })
        .await?;

        info!(
            job_id,
            tables = artifacts.tables.len(),
            images = artifacts.images.len(),
            "Table/image extraction finished"
        );
        Ok(artifacts)
    }

    /// Match extracted text against case-template fields.
    pub async fn autofill(
        &self,
        text: &str,
        confidence_threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<AutofillResult> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        check_threshold(confidence_threshold)?;

        let result = race_cancel(
            cancel,
            self.api.autofill(text, confidence_threshold, cancel),
        )
        .await?;

        debug!(
            fields_matched = result.metadata.fields_matched_count,
            "Autofill finished"
        );
        Ok(result)
    }

    /// Extract text, then autofill template fields from it.
    ///
    /// The threshold is checked before anything is submitted. Autofill is
    /// skipped when the extraction produced no usable text. If autofill fails,
    /// the whole call fails and the extraction is not returned.
    pub async fn extract_and_autofill(
        &self,
        upload: &DocumentUpload,
        confidence_threshold: f64,
        mode: ExtractionMode,
        cancel: &CancellationToken,
    ) -> Result<ExtractionOutcome> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        check_threshold(confidence_threshold)?;

        let extraction = self.extract_text(upload, mode, cancel).await?;

        if !extraction.has_text() {
            warn!(
                file_name = %upload.file_name,
                "OCR returned empty text, skipping autofill"
            );
            return Ok(ExtractionOutcome {
                extraction,
                autofill: AutofillResult::empty(),
            });
        }

        let autofill = self
            .autofill(&extraction.full_text, confidence_threshold, cancel)
            .await?;
        Ok(ExtractionOutcome {
            extraction,
            autofill,
        })
    }
}

/// Span for one `extract_text` call; the empty fields are named in `logging`.
fn extract_span(upload: &DocumentUpload, mode: ExtractionMode) -> Span {
    info_span!(
        "extract_text",
        request_id = %Uuid::now_v7(),
        mode = %mode,
        file_name = %upload.file_name,
        job_id = field::Empty,
        table_job_id = field::Empty,
        page_count = field::Empty,
        duration_ms = field::Empty,
    )
}

fn check_threshold(confidence_threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&confidence_threshold) {
        return Err(Error::InvalidInput(format!(
            "Confidence threshold must be within [0, 1], got {}",
            confidence_threshold
        )));
    }
    Ok(())
}

/// Run a backend call, abandoning it as soon as `cancel` fires.
async fn race_cancel<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        reply = call => reply.map_err(|e| remap_cancellation(e, cancel)),
    }
}
