//! Structured logging field name constants.
//!
//! Fields that are only known after a span has been opened are declared empty
//! and filled in with `Span::record`, which silently drops names the span did
//! not declare. These constants name those fields so the declaration and the
//! record cannot drift apart.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Operation failed in a way the user must see |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Submissions, job completions, lifecycle events |
//! | DEBUG | Poll decisions, intermediate values, config choices |
//! | TRACE | Raw payload sizes and per-page detail |

/// Backend job identifier, known once a submission is queued.
pub const JOB_ID: &str = "job_id";

/// Secondary table/image job queued by a `Full` mode extraction.
pub const TABLE_JOB_ID: &str = "table_job_id";

/// Number of pages returned by an extraction.
pub const PAGE_COUNT: &str = "page_count";

/// Wall-clock duration of a call in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Every field recorded after a span is opened.
pub const RECORDED_FIELDS: &[&str] = &[JOB_ID, TABLE_JOB_ID, PAGE_COUNT, DURATION_MS];
