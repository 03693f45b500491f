//! Document uploads and client-side checks mirroring the backend's limits.

use std::path::Path;

use crate::defaults;
use crate::error::{Error, Result};

/// MIME types the OCR backend accepts.
pub const ALLOWED_CONTENT_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "application/pdf"];

/// A document to submit for extraction.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    /// Create an upload, detecting the content type from magic bytes.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = detect_content_type(&file_name, &bytes);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read an upload from disk.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("document")
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check the upload against the backend's size and type limits.
    pub fn validate(&self) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(Error::InvalidInput(format!(
                "File {} is empty",
                self.file_name
            )));
        }

        if self.bytes.len() > defaults::MAX_UPLOAD_BYTES {
            return Err(Error::InvalidInput(format!(
                "File size exceeds {}MB limit",
                defaults::MAX_UPLOAD_BYTES / (1024 * 1024)
            )));
        }

        if !ALLOWED_CONTENT_TYPES.contains(&self.content_type.as_str()) {
            return Err(Error::InvalidInput(format!(
                "Unsupported file type: {}",
                self.content_type
            )));
        }

        Ok(())
    }
}

/// Detect the content type from magic bytes, falling back to the extension.
///
/// Binary formats always carry magic bytes, so the extension is only trusted
/// when there is nothing to sniff.
pub fn detect_content_type(file_name: &str, data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    if data.is_empty() {
        if let Some(mime) = file_name.rsplit('.').next().and_then(mime_from_extension) {
            return mime.to_string();
        }
    }

    "application/octet-stream".to_string()
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
