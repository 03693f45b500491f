//! HTTP transport for the OCR backend.
//!
//! Implements [`OcrApi`] over the backend's REST endpoints with bearer-token
//! authentication. A 401 triggers one refresh of the access token (when a
//! refresh token is configured) followed by one retry of the original request.

use std::time::Duration;

use async_trait::async_trait;
use medcase_core::{
    defaults, AutofillResult, DocumentUpload, Error, ExtractionMode, ExtractionResult,
    ImageArtifact, JobHandle, JobKind, JobStatus, OcrApi, Result, Submission, TableArtifact,
    TableImageArtifacts,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OcrClientConfig;

/// Reply to a submission the backend deferred to a background job.
#[derive(Deserialize)]
struct QueuedResponse {
    job_id: String,
}

/// Text extraction job status as reported by the backend.
#[derive(Deserialize)]
struct TextJobStatusResponse {
    status: String,
    #[serde(default)]
    result: Option<ExtractionResult>,
    #[serde(default)]
    error: Option<String>,
}

/// Table/image job status as reported by the backend.
#[derive(Deserialize)]
struct TableJobStatusResponse {
    status: String,
    #[serde(default)]
    tables: Vec<TableArtifact>,
    #[serde(default)]
    images: Vec<ImageArtifact>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct AutofillRequest<'a> {
    text: &'a str,
    confidence_threshold: f64,
}

#[derive(Serialize)]
struct TokenRefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct TokenRefreshResponse {
    access: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Default)]
struct AuthTokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// reqwest-backed implementation of the OCR backend contract.
pub struct HttpOcrApi {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    tokens: RwLock<AuthTokens>,
}

impl HttpOcrApi {
    /// Create a transport from a validated configuration.
    pub fn new(config: &OcrClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            tokens: RwLock::new(AuthTokens {
                access: config.access_token.clone(),
                refresh: config.refresh_token.clone(),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current access token (it changes after a refresh).
    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.access.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn job_url(&self, job_id: &str) -> Result<String> {
        if job_id.is_empty() || job_id.contains('/') {
            return Err(Error::InvalidInput(format!("Invalid job id: {:?}", job_id)));
        }
        Ok(format!("{}{}{}/", self.base_url, defaults::JOBS_PATH, job_id))
    }

    /// Send a request, refreshing the access token once on 401.
    ///
    /// `build` is called again for the retry, since request bodies are consumed.
    async fn send<F>(&self, build: F, cancel: &CancellationToken) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> Result<RequestBuilder>,
    {
        let response = self.send_once(&build, cancel).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if !self.refresh_access_token(cancel).await? {
            return Ok(response);
        }
        self.send_once(&build, cancel).await
    }

    async fn send_once<F>(&self, build: &F, cancel: &CancellationToken) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> Result<RequestBuilder>,
    {
        let mut request = build(&self.client)?.timeout(self.timeout);
        if let Some(token) = self.tokens.read().await.access.clone() {
            request = request.bearer_auth(token);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            response = request.send() => response.map_err(Error::from),
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `false` when no refresh token is configured.
    async fn refresh_access_token(&self, cancel: &CancellationToken) -> Result<bool> {
        let refresh = match self.tokens.read().await.refresh.clone() {
            Some(token) => token,
            None => return Ok(false),
        };

        warn!("Access token rejected, refreshing");
        let request = self
            .client
            .post(self.url(defaults::TOKEN_REFRESH_PATH))
            .json(&TokenRefreshRequest { refresh: &refresh })
            .timeout(self.timeout);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = request.send() => response?,
        };

        if !response.status().is_success() {
            let status = response.status();
            self.tokens.write().await.access = None;
            return Err(Error::Unauthorized(format!(
                "Token refresh failed with status {}",
                status.as_u16()
            )));
        }

        let body: TokenRefreshResponse = read_json(response, cancel).await?;
        self.tokens.write().await.access = Some(body.access);
        debug!("Access token refreshed");
        Ok(true)
    }
}

/// Read a JSON body, aborting if the caller cancels.
async fn read_json<T: DeserializeOwned>(
    response: Response,
    cancel: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        body = response.json::<T>() => body.map_err(Error::from),
    }
}

/// Turn a non-success response into an error, preferring the body's `error` field.
async fn error_from_response(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);

    if status == StatusCode::UNAUTHORIZED {
        Error::Unauthorized(message)
    } else {
        Error::Api {
            status: status.as_u16(),
            message,
        }
    }
}

/// Map a backend status string onto the job state machine.
///
/// Only `done` with a payload completes a job. A `done` reply whose result has
/// not been stored yet, and unknown states (e.g. a task being retried), are
/// treated as still running, so the poll budget decides when to give up.
fn parse_job_status<T>(
    job_id: &str,
    status: &str,
    payload: Option<T>,
    error: Option<String>,
    default_failure: &str,
) -> JobStatus<T> {
    match (status, payload) {
        ("queued", _) => JobStatus::Queued,
        ("running", _) => JobStatus::Running,
        ("done", Some(payload)) => JobStatus::Done(payload),
        ("done", None) => {
            warn!(job_id, "Job reported done without a result, polling again");
            JobStatus::Running
        }
        ("failed", _) => JobStatus::Failed(error.unwrap_or_else(|| default_failure.to_string())),
        (other, _) => {
            debug!(job_id, job_status = other, "Unrecognized job status, treating as running");
            JobStatus::Running
        }
    }
}

#[async_trait]
impl OcrApi for HttpOcrApi {
    async fn submit_extraction(
        &self,
        upload: &DocumentUpload,
        mode: ExtractionMode,
        cancel: &CancellationToken,
    ) -> Result<Submission> {
        let url = self.url(defaults::EXTRACT_PATH);
        info!(
            file_name = %upload.file_name,
            bytes = upload.len(),
            mode = %mode,
            "Submitting document for extraction"
        );

        let response = self
            .send(
                |client| {
                    let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
                        .file_name(upload.file_name.clone())
                        .mime_str(&upload.content_type)
                        .map_err(|e| {
                            Error::InvalidInput(format!("Invalid content type: {}", e))
                        })?;
                    let form = reqwest::multipart::Form::new()
                        .part("file", part)
                        .text("mode", mode.as_str());
                    Ok(client.post(&url).multipart(form))
                },
                cancel,
            )
            .await?;

        let status = response.status();
        debug!(http_status = status.as_u16(), "Extraction submission answered");

        if status == StatusCode::ACCEPTED {
            let queued: QueuedResponse = read_json(response, cancel).await?;
            if queued.job_id.is_empty() {
                return Err(Error::Protocol(
                    "Backend queued the extraction without a job id".to_string(),
                ));
            }
            info!(job_id = %queued.job_id, "Extraction queued as background job");
            return Ok(Submission::Queued(JobHandle::new(
                queued.job_id,
                JobKind::TextExtraction,
            )));
        }

        if !status.is_success() {
            return Err(error_from_response(response).await);
        }

        let result: ExtractionResult = read_json(response, cancel).await?;
        Ok(Submission::Completed(result))
    }

    async fn text_job_status(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobStatus<ExtractionResult>> {
        let url = self.job_url(job_id)?;
        let response = self.send(|client| Ok(client.get(&url)), cancel).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: TextJobStatusResponse = read_json(response, cancel).await?;
        Ok(parse_job_status(
            job_id,
            &body.status,
            body.result,
            body.error,
            "OCR processing failed",
        ))
    }

    async fn table_job_status(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobStatus<TableImageArtifacts>> {
        let url = self.job_url(job_id)?;
        let response = self.send(|client| Ok(client.get(&url)), cancel).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: TableJobStatusResponse = read_json(response, cancel).await?;
        let artifacts = TableImageArtifacts {
            tables: body.tables,
            images: body.images,
        };
        Ok(parse_job_status(
            job_id,
            &body.status,
            Some(artifacts),
            body.error,
            "Table/image extraction failed",
        ))
    }

    async fn autofill(
        &self,
        text: &str,
        confidence_threshold: f64,
        cancel: &CancellationToken,
    ) -> Result<AutofillResult> {
        let url = self.url(defaults::AUTOFILL_PATH);
        let response = self
            .send(
                |client| {
                    Ok(client.post(&url).json(&AutofillRequest {
                        text,
                        confidence_threshold,
                    }))
                },
                cancel,
            )
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        read_json(response, cancel).await
    }
}
