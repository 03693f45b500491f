//! # medcase-ocr
//!
//! Asynchronous OCR extraction client for medcase.
//!
//! This crate provides:
//! - [`AsyncExtractionClient`]: submit a document, transparently poll queued jobs
//! - Bounded, cancellable polling for text and table/image jobs
//! - Autofill of case-template fields from extracted text
//! - reqwest-backed HTTP transport with bearer-token refresh
//! - Environment-driven configuration
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
//!     let upload = DocumentUpload::from_path(std::path::Path::new("referral.png")).await?;
//!     let outcome = client
//!         .extract_and_autofill(&upload, 0.6, ExtractionMode::TextOnly, &CancellationToken::new())
//!         .await?;
//!     println!("{} fields matched", outcome.autofill.metadata.fields_matched_count);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod poll;

// Scripted backend for testing
#[cfg(test)]
pub mod mock;

// Re-export core types
pub use medcase_core::*;

pub use client::AsyncExtractionClient;
pub use config::{ConfigError, ConfigResult, OcrClientConfig, PollSettings};
pub use http::HttpOcrApi;
pub use poll::poll_until_terminal;
