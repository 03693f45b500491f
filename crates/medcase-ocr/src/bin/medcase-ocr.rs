//! medcase-ocr: Command-line client for document OCR and case autofill.
//!
//! Usage:
//!   medcase-ocr scan.pdf
//!   medcase-ocr referral.png --full --poll-tables
//!   medcase-ocr note.jpg --autofill --threshold 0.7
//!
//! Ctrl-C cancels the request in flight. Logs go to stderr, the JSON result
//! to stdout.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use medcase_ocr::{
    AsyncExtractionClient, DocumentUpload, ExtractionMode, JobHandle, OcrClientConfig,
    TableImageArtifacts,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "medcase-ocr")]
#[command(author, version, about = "Extract text from scanned case documents")]
#[command(after_help = "Environment:
  MEDCASE_API_URL         Backend base URL (default: http://localhost:8000)
  MEDCASE_ACCESS_TOKEN    Bearer token
  MEDCASE_REFRESH_TOKEN   Refresh token used after a 401
  OCR_POLL_INTERVAL_MS    Text job poll interval (default: 1000)
  OCR_POLL_TIMEOUT_MS     Text job budget (default: 120000)
  LOG_FORMAT              \"json\" or \"text\" (default: \"text\")
  RUST_LOG                Log filter (default: \"medcase_ocr=info\")")]
struct Cli {
    /// Document to extract (JPEG, PNG, WebP or PDF, at most 10MB)
    file: PathBuf,

    /// Full extraction: text plus a table/image job
    #[arg(short, long)]
    full: bool,

    /// Autofill case-template fields from the extracted text
    #[arg(short, long)]
    autofill: bool,

    /// Autofill confidence threshold in [0, 1] (default: OCR_AUTOFILL_CONFIDENCE)
    #[arg(short, long, value_parser = parse_threshold, requires = "autofill")]
    threshold: Option<f64>,

    /// Wait for the table/image job
    #[arg(long, requires = "full")]
    poll_tables: bool,
}

impl Cli {
    fn mode(&self) -> ExtractionMode {
        if self.full {
            ExtractionMode::Full
        } else {
            ExtractionMode::TextOnly
        }
    }
}

fn parse_threshold(value: &str) -> Result<f64, String> {
    let threshold: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("{} is outside [0, 1]", threshold));
    }
    Ok(threshold)
}

/// Logs go to stderr so stdout carries only the JSON result.
fn init_logging() {
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "medcase_ocr=info".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    #[serde(flatten)]
    result: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    table_artifacts: Option<TableImageArtifacts>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_logging();

    let config = OcrClientConfig::from_env();
    let threshold = cli.threshold.unwrap_or(config.autofill_confidence);
    let client = AsyncExtractionClient::from_config(&config)?;

    let upload = DocumentUpload::from_path(&cli.file)
        .await
        .with_context(|| format!("Failed to read {}", cli.file.display()))?;
    upload.validate()?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling OCR request");
            on_signal.cancel();
        }
    });

    let mode = cli.mode();
    info!(
        file_name = %upload.file_name,
        content_type = %upload.content_type,
        bytes = upload.len(),
        mode = %mode,
        "Starting extraction"
    );

    let json = if cli.autofill {
        let outcome = client
            .extract_and_autofill(&upload, threshold, mode, &cancel)
            .await
            .inspect_err(|e| error!(error = %e, "Extraction failed"))?;
        let table_artifacts =
            poll_tables(&client, &cli, outcome.extraction.table_job(), &cancel).await?;
        serde_json::to_string_pretty(&Output {
            result: outcome,
            table_artifacts,
        })?
    } else {
        let extraction = client
            .extract_text(&upload, mode, &cancel)
            .await
            .inspect_err(|e| error!(error = %e, "Extraction failed"))?;
        let table_artifacts = poll_tables(&client, &cli, extraction.table_job(), &cancel).await?;
        serde_json::to_string_pretty(&Output {
            result: extraction,
            table_artifacts,
        })?
    };

    println!("{}", json);
    Ok(())
}

async fn poll_tables(
    client: &AsyncExtractionClient,
    cli: &Cli,
    job: Option<JobHandle>,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<TableImageArtifacts>> {
    if !cli.poll_tables {
        return Ok(None);
    }
    let Some(job) = job else {
        warn!("No pending table/image job to poll");
        return Ok(None);
    };

    let artifacts = client
        .poll_table_image_job(&job.job_id, client.table_poll(), cancel)
        .await?;
    Ok(Some(artifacts))
}
