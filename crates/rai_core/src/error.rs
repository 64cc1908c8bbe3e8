use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure from any stage of the prep, chat or evaluation pipeline.
///
/// `code` is one of [`codes`]; `details` carries the path, URL or status that caused it.
/// `retryable` marks transient failures such as rate limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
    /// Server-requested wait before retrying, from a `Retry-After` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
            retry_after_secs: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_retry_after(mut self, secs: Option<u64>) -> Self {
        self.retry_after_secs = secs;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(details) = self.details.as_deref() {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Stable error codes. Grouped by the stage that raises them.
pub mod codes {
    // Configuration (fatal at startup).
    pub const CONFIG_MISSING_ENV: &str = "CONFIG_MISSING_ENV";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const CONFIG_SOURCES_INVALID: &str = "CONFIG_SOURCES_INVALID";

    // Prep step (per source).
    pub const FETCH_FAILED: &str = "FETCH_FAILED";
    pub const FETCH_DENIED: &str = "FETCH_DENIED";
    pub const CACHE_WRITE_FAILED: &str = "CACHE_WRITE_FAILED";
    pub const CACHE_READ_FAILED: &str = "CACHE_READ_FAILED";

    // Chat step.
    pub const CHAT_UNGROUNDED: &str = "CHAT_UNGROUNDED";
    pub const CHAT_QUERY_EMPTY: &str = "CHAT_QUERY_EMPTY";
    pub const INFERENCE_RATE_LIMITED: &str = "INFERENCE_RATE_LIMITED";
    pub const INFERENCE_AUTH_FAILED: &str = "INFERENCE_AUTH_FAILED";
    pub const INFERENCE_FAILED: &str = "INFERENCE_FAILED";
    pub const ENDPOINT_INVALID: &str = "ENDPOINT_INVALID";

    // Credentials.
    pub const AUTH_TOKEN_FAILED: &str = "AUTH_TOKEN_FAILED";

    // Evaluation batch.
    pub const SCENARIO_LOAD_FAILED: &str = "SCENARIO_LOAD_FAILED";
    pub const SCENARIO_INVALID: &str = "SCENARIO_INVALID";
    pub const EVAL_FAILED: &str = "EVAL_FAILED";
    pub const EVAL_AUTH_FAILED: &str = "EVAL_AUTH_FAILED";
    pub const REPORT_WRITE_FAILED: &str = "REPORT_WRITE_FAILED";
    pub const REPORT_READ_FAILED: &str = "REPORT_READ_FAILED";

    // Shared.
    pub const TIME_FORMAT_FAILED: &str = "TIME_FORMAT_FAILED";
}
