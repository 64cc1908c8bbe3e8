use std::time::Duration;

use rai_core::error::{codes, AppError};
use serde::Serialize;
use tracing::warn;

pub mod azure_openai;

pub use azure_openai::AzureOpenAiChat;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub trait Llm {
    fn complete(&self, req: &CompletionRequest) -> Result<String, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait used when the endpoint does not send `Retry-After`.
    pub rate_limit_backoff: Duration,
    /// Upper bound on a server-requested wait.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_backoff: Duration::from_secs(2),
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// The server's `Retry-After` (capped) when present, else the configured backoff.
    pub fn backoff_for(&self, err: &AppError) -> Duration {
        match err.retry_after_secs {
            Some(secs) => Duration::from_secs(secs).min(self.max_retry_after),
            None => self.rate_limit_backoff,
        }
    }
}

/// Call the model, retrying exactly once when the endpoint rate-limits.
/// Every other failure is returned as-is.
pub fn complete_with_retry(
    llm: &dyn Llm,
    req: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<String, AppError> {
    match llm.complete(req) {
        Err(e) if e.is(codes::INFERENCE_RATE_LIMITED) => {
            let backoff = policy.backoff_for(&e);
            warn!(backoff_ms = backoff.as_millis() as u64, "rate limited; retrying once");
            std::thread::sleep(backoff);
            llm.complete(req)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_prefers_retry_after_and_caps_it() {
        let policy = RetryPolicy {
            rate_limit_backoff: Duration::from_secs(2),
            max_retry_after: Duration::from_secs(10),
        };
        let plain = AppError::new(codes::INFERENCE_RATE_LIMITED, "slow down");
        assert_eq!(policy.backoff_for(&plain), Duration::from_secs(2));
        assert_eq!(
            policy.backoff_for(&plain.clone().with_retry_after(Some(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.backoff_for(&plain.with_retry_after(Some(120))),
            Duration::from_secs(10)
        );
    }
}
