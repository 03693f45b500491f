//! OCR client configuration.
//!
//! Configuration is loaded from environment variables (a `.env` file is picked
//! up by the binary through `dotenvy`) and validated before a client is built.
//!
//! # Example
//!
//! ```rust,no_run
//! use medcase_ocr::config::OcrClientConfig;
//!
//! let config = OcrClientConfig::from_env();
//! config.validate().expect("invalid OCR configuration");
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use medcase_core::defaults;
use thiserror::Error;
use tracing::debug;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for medcase_core::Error {
    fn from(e: ConfigError) -> Self {
        medcase_core::Error::Config(e.to_string())
    }
}

/// Fixed-interval polling budget for one job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait between consecutive status queries.
    pub interval: Duration,
    /// Wall-clock budget measured from the first status query.
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_millis(interval_ms: u64, timeout_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
        )
    }

    /// Defaults for text extraction jobs (1s / 2min).
    pub fn text_extraction() -> Self {
        Self::from_millis(
            defaults::TEXT_POLL_INTERVAL_MS,
            defaults::TEXT_POLL_TIMEOUT_MS,
        )
    }

    /// Defaults for table/image jobs (2s / 5min).
    pub fn table_image_extraction() -> Self {
        Self::from_millis(
            defaults::TABLE_POLL_INTERVAL_MS,
            defaults::TABLE_POLL_TIMEOUT_MS,
        )
    }

    /// Validate the settings.
    pub fn validate(&self, name: &str) -> ConfigResult<()> {
        if self.interval.is_zero() {
            return Err(ConfigError::Validation(format!(
                "{} poll interval must be greater than zero",
                name
            )));
        }
        if self.timeout < self.interval {
            return Err(ConfigError::Validation(format!(
                "{} poll timeout ({}ms) must not be shorter than the interval ({}ms)",
                name,
                self.timeout.as_millis(),
                self.interval.as_millis()
            )));
        }
        Ok(())
    }
}

/// Configuration for the extraction client and its HTTP transport.
#[derive(Debug, Clone)]
pub struct OcrClientConfig {
    /// Backend base URL, without a trailing slash.
    pub base_url: String,
    /// Bearer token attached to every request.
    pub access_token: Option<String>,
    /// Token used to obtain a new access token after a 401.
    pub refresh_token: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Polling budget for text extraction jobs.
    pub text_poll: PollSettings,
    /// Polling budget for table/image jobs.
    pub table_poll: PollSettings,
    /// Default autofill confidence threshold.
    pub autofill_confidence: f64,
}

impl Default for OcrClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::API_URL.to_string(),
            access_token: None,
            refresh_token: None,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            text_poll: PollSettings::text_extraction(),
            table_poll: PollSettings::table_image_extraction(),
            autofill_confidence: defaults::AUTOFILL_CONFIDENCE_THRESHOLD,
        }
    }
}

impl OcrClientConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `MEDCASE_API_URL` | `http://localhost:8000` | Backend base URL |
    /// | `MEDCASE_ACCESS_TOKEN` | (unset) | Bearer token |
    /// | `MEDCASE_REFRESH_TOKEN` | (unset) | Refresh token for 401 recovery |
    /// | `MEDCASE_REQUEST_TIMEOUT_SECS` | `60` | Per-request timeout |
    /// | `OCR_POLL_INTERVAL_MS` | `1000` | Text job poll interval |
    /// | `OCR_POLL_TIMEOUT_MS` | `120000` | Text job budget |
    /// | `OCR_TABLE_POLL_INTERVAL_MS` | `2000` | Table/image job poll interval |
    /// | `OCR_TABLE_POLL_TIMEOUT_MS` | `300000` | Table/image job budget |
    /// | `OCR_AUTOFILL_CONFIDENCE` | `0.6` | Autofill threshold |
    pub fn from_env() -> Self {
        let base_url = env::var(defaults::ENV_API_URL)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| defaults::API_URL.to_string());

        let config = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: non_empty_var(defaults::ENV_ACCESS_TOKEN),
            refresh_token: non_empty_var(defaults::ENV_REFRESH_TOKEN),
            request_timeout_secs: parse_var(
                defaults::ENV_REQUEST_TIMEOUT_SECS,
                defaults::REQUEST_TIMEOUT_SECS,
            ),
            text_poll: PollSettings::from_millis(
                parse_var(
                    defaults::ENV_POLL_INTERVAL_MS,
                    defaults::TEXT_POLL_INTERVAL_MS,
                ),
                parse_var(defaults::ENV_POLL_TIMEOUT_MS, defaults::TEXT_POLL_TIMEOUT_MS),
            ),
            table_poll: PollSettings::from_millis(
                parse_var(
                    defaults::ENV_TABLE_POLL_INTERVAL_MS,
                    defaults::TABLE_POLL_INTERVAL_MS,
                ),
                parse_var(
                    defaults::ENV_TABLE_POLL_TIMEOUT_MS,
                    defaults::TABLE_POLL_TIMEOUT_MS,
                ),
            ),
            autofill_confidence: parse_var(
                defaults::ENV_AUTOFILL_CONFIDENCE,
                defaults::AUTOFILL_CONFIDENCE_THRESHOLD,
            ),
        };

        debug!(
            base_url = %config.base_url,
            authenticated = config.access_token.is_some(),
            text_poll_interval_ms = config.text_poll.interval.as_millis() as u64,
            table_poll_interval_ms = config.table_poll.interval.as_millis() as u64,
            "Loaded OCR client configuration"
        );

        config
    }

    /// Create a config pointing at `base_url` with all other defaults.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the bearer access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the refresh token.
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Set the text job polling budget.
    pub fn with_text_poll(mut self, settings: PollSettings) -> Self {
        self.text_poll = settings;
        self
    }

    /// Set the table/image job polling budget.
    pub fn with_table_poll(mut self, settings: PollSettings) -> Self {
        self.table_poll = settings;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Validation(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }

        self.text_poll.validate("Text extraction")?;
        self.table_poll.validate("Table/image extraction")?;

        if !(0.0..=1.0).contains(&self.autofill_confidence) {
            return Err(ConfigError::Validation(format!(
                "autofill_confidence must be within [0, 1], got: {}",
                self.autofill_confidence
            )));
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OcrClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.text_poll.interval, Duration::from_millis(1000));
        assert_eq!(config.text_poll.timeout, Duration::from_millis(120_000));
        assert_eq!(config.table_poll.interval, Duration::from_millis(2000));
        assert_eq!(config.table_poll.timeout, Duration::from_millis(300_000));
        assert_eq!(config.autofill_confidence, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let config = OcrClientConfig::default()
            .with_base_url("https://cases.example.org/api/")
            .with_access_token("abc")
            .with_refresh_token("def");
        assert_eq!(config.base_url, "https://cases.example.org/api");
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.refresh_token.as_deref(), Some("def"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = OcrClientConfig::default().with_base_url("localhost:8000");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http://"));

        let config = OcrClientConfig::default().with_base_url("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config =
            OcrClientConfig::default().with_text_poll(PollSettings::from_millis(0, 1000));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_validate_rejects_timeout_shorter_than_interval() {
        let config =
            OcrClientConfig::default().with_table_poll(PollSettings::from_millis(2000, 500));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Table/image extraction"));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let config = OcrClientConfig {
            autofill_confidence: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_converts_to_core_error() {
        let err: medcase_core::Error = ConfigError::Validation("bad".into()).into();
        assert!(matches!(err, medcase_core::Error::Config(_)));
    }
}
