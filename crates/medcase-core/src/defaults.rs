//! Centralized default constants for the medcase OCR client.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and binaries should reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// API
// =============================================================================

/// Default backend base URL.
pub const API_URL: &str = "http://localhost:8000";

/// Default per-request HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Path of the extraction submission endpoint.
pub const EXTRACT_PATH: &str = "/ocr/extract/";

/// Path prefix of the job status endpoint (`/ocr/jobs/{job_id}/`).
pub const JOBS_PATH: &str = "/ocr/jobs/";

/// Path of the autofill endpoint.
pub const AUTOFILL_PATH: &str = "/ocr/autofill/";

/// Path of the access-token refresh endpoint.
pub const TOKEN_REFRESH_PATH: &str = "/auth/token/refresh/";

// =============================================================================
// POLLING
// =============================================================================

/// Poll interval for text extraction jobs.
pub const TEXT_POLL_INTERVAL_MS: u64 = 1000;

/// Wall-clock budget for text extraction jobs (2 minutes).
pub const TEXT_POLL_TIMEOUT_MS: u64 = 120_000;

/// Poll interval for table/image jobs. These take tens of seconds, so poll coarser.
pub const TABLE_POLL_INTERVAL_MS: u64 = 2000;

/// Wall-clock budget for table/image jobs (5 minutes).
pub const TABLE_POLL_TIMEOUT_MS: u64 = 300_000;

// =============================================================================
// UPLOADS
// =============================================================================

/// Largest upload the backend accepts (10 MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// AUTOFILL
// =============================================================================

/// Minimum heading-match confidence for autofill.
pub const AUTOFILL_CONFIDENCE_THRESHOLD: f64 = 0.6;

// =============================================================================
// CACHE
// =============================================================================

/// Default TTL for cached API responses in minutes.
pub const CACHE_TTL_MINUTES: i64 = 5;

// =============================================================================
// ENVIRONMENT VARIABLES
// =============================================================================

pub const ENV_API_URL: &str = "MEDCASE_API_URL";
pub const ENV_ACCESS_TOKEN: &str = "MEDCASE_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "MEDCASE_REFRESH_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "MEDCASE_REQUEST_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "OCR_POLL_INTERVAL_MS";
pub const ENV_POLL_TIMEOUT_MS: &str = "OCR_POLL_TIMEOUT_MS";
pub const ENV_TABLE_POLL_INTERVAL_MS: &str = "OCR_TABLE_POLL_INTERVAL_MS";
pub const ENV_TABLE_POLL_TIMEOUT_MS: &str = "OCR_TABLE_POLL_TIMEOUT_MS";
pub const ENV_AUTOFILL_CONFIDENCE: &str = "OCR_AUTOFILL_CONFIDENCE";
