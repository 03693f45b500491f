//! # medcase-core
//!
//! Core types, traits, and abstractions for the medcase OCR client.
//!
//! This crate provides the domain model for document extraction, the error
//! type shared by every crate, and the [`OcrApi`] collaborator trait that the
//! extraction client is written against.

pub mod cache;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod upload;

// Re-export commonly used types at crate root
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use upload::{detect_content_type, DocumentUpload, ALLOWED_CONTENT_TYPES};
