//! Scripted OCR backend for deterministic testing.
//!
//! Each job replays a script of statuses. The last scripted status repeats
//! forever, and once a terminal status has been served every later query
//! returns that same status, matching the backend's monotonicity contract.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let api = ScriptedOcrApi::queued("j1")
//!     .with_text_job("j1", vec![JobStatus::Running, JobStatus::Done(result)]);
//! let client = AsyncExtractionClient::new(Arc::new(api.clone()));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use medcase_core::{
    AutofillResult, DocumentUpload, Error, ExtractionMode, ExtractionResult, JobHandle, JobKind,
    JobStatus, OcrApi, Result, Submission, TableImageArtifacts,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Scripted OCR backend.
#[derive(Clone)]
pub struct ScriptedOcrApi {
    state: Arc<Mutex<MockState>>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

struct MockState {
    submission: Submission,
    text_jobs: HashMap<String, VecDeque<JobStatus<ExtractionResult>>>,
    table_jobs: HashMap<String, VecDeque<JobStatus<TableImageArtifacts>>>,
    transport_failures: HashMap<String, String>,
    autofill: std::result::Result<AutofillResult, String>,
    status_latency: Duration,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub threshold: Option<f64>,
    pub timestamp: Instant,
}

impl ScriptedOcrApi {
    /// Backend that answers every submission synchronously with `result`.
    pub fn completed(result: ExtractionResult) -> Self {
        Self::with_submission(Submission::Completed(result))
    }

    /// Backend that queues every submission as text job `job_id`.
    pub fn queued(job_id: &str) -> Self {
        Self::with_submission(Submission::Queued(JobHandle::new(
            job_id,
            JobKind::TextExtraction,
        )))
    }

    fn with_submission(submission: Submission) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                submission,
                text_jobs: HashMap::new(),
                table_jobs: HashMap::new(),
                transport_failures: HashMap::new(),
                autofill: Ok(AutofillResult::empty()),
                status_latency: Duration::ZERO,
            })),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the statuses of a text job.
    pub fn with_text_job(
        self,
        job_id: &str,
        statuses: Vec<JobStatus<ExtractionResult>>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .text_jobs
            .insert(job_id.to_string(), statuses.into());
        self
    }

    /// Script the statuses of a table/image job.
    pub fn with_table_job(
        self,
        job_id: &str,
        statuses: Vec<JobStatus<TableImageArtifacts>>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .table_jobs
            .insert(job_id.to_string(), statuses.into());
        self
    }

    /// Fail the next status query for `job_id` with a transport error.
    pub fn with_transport_failure(self, job_id: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .transport_failures
            .insert(job_id.to_string(), message.to_string());
        self
    }

    /// Set the autofill reply.
    pub fn with_autofill(self, result: AutofillResult) -> Self {
        self.state.lock().unwrap().autofill = Ok(result);
        self
    }

    /// Make autofill fail with a 500 carrying `message`.
    pub fn with_autofill_failure(self, message: &str) -> Self {
        self.state.lock().unwrap().autofill = Err(message.to_string());
        self
    }

    /// Delay every status reply.
    pub fn with_status_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().status_latency = latency;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of calls of one operation.
    pub fn call_count(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Number of status queries (text or table) issued so far.
    pub fn status_query_count(&self) -> usize {
        self.call_count("text_job_status") + self.call_count("table_job_status")
    }

    fn log_call(&self, operation: &str, input: &str, threshold: Option<f64>) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            threshold,
            timestamp: Instant::now(),
        });
    }

    async fn simulate_latency(&self) {
        let latency = self.state.lock().unwrap().status_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_transport_failure(&self, job_id: &str) -> Option<Error> {
        self.state
            .lock()
            .unwrap()
            .transport_failures
            .remove(job_id)
            .map(Error::Transport)
    }
}

/// Serve the next scripted status, keeping terminal states sticky.
fn next_status<T: Clone>(script: &mut VecDeque<JobStatus<T>>) -> Option<JobStatus<T>> {
    let status = if script.len() > 1 {
        script.pop_front()?
    } else {
        script.front()?.clone()
    };

    if status.is_terminal() {
        script.clear();
        script.push_back(status.clone());
    }
    Some(status)
}

#[async_trait]
impl OcrApi for ScriptedOcrApi {
    async fn submit_extraction(
        &self,
        upload: &DocumentUpload,
        mode: ExtractionMode,
        cancel: &CancellationToken,
    ) -> Result<Submission> {
        let input = format!("{}:{}", mode.as_str(), upload.file_name);
        self.log_call("submit_extraction", &input, None);
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(self.state.lock().unwrap().submission.clone())
    }

    async fn text_job_status(
        &self,
        job_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<JobStatus<ExtractionResult>> {
        self.log_call("text_job_status", job_id, None);
        self.simulate_latency().await;
        if let Some(err) = self.take_transport_failure(job_id) {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        let script = state
            .text_jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: format!("Unknown job {}", job_id),
            })?;
        next_status(script).ok_or_else(|| Error::Protocol("Empty job script".to_string()))
    }

    async fn table_job_status(
        &self,
        job_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<JobStatus<TableImageArtifacts>> {
        self.log_call("table_job_status", job_id, None);
        self.simulate_latency().await;
        if let Some(err) = self.take_transport_failure(job_id) {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        let script = state
            .table_jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: format!("Unknown job {}", job_id),
            })?;
        next_status(script).ok_or_else(|| Error::Protocol("Empty job script".to_string()))
    }

    async fn autofill(
        &self,
        text: &str,
        confidence_threshold: f64,
        _cancel: &CancellationToken,
    ) -> Result<AutofillResult> {
        self.log_call("autofill", text, Some(confidence_threshold));
        match &self.state.lock().unwrap().autofill {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(Error::Api {
                status: 500,
                message: message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_status_repeats_last() {
        let mut script: VecDeque<JobStatus<u8>> =
            vec![JobStatus::Queued, JobStatus::Running].into();
        assert_eq!(next_status(&mut script), Some(JobStatus::Queued));
        assert_eq!(next_status(&mut script), Some(JobStatus::Running));
        assert_eq!(next_status(&mut script), Some(JobStatus::Running));
    }

    #[test]
    fn test_next_status_terminal_is_sticky() {
        let mut script: VecDeque<JobStatus<u8>> =
            vec![JobStatus::Done(1), JobStatus::Running, JobStatus::Failed("x".into())].into();
        assert_eq!(next_status(&mut script), Some(JobStatus::Done(1)));
        assert_eq!(next_status(&mut script), Some(JobStatus::Done(1)));
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_next_status_empty_script() {
        let mut script: VecDeque<JobStatus<u8>> = VecDeque::new();
        assert_eq!(next_status(&mut script), None);
    }
}
