use std::time::Duration;

use rai_core::config::{EvaluationConfig, InferenceConfig};
use rai_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, CompletionRequest, Llm};
use crate::auth::{EvaluationCredential, InferenceCredential, COGNITIVE_SERVICES_SCOPE};
use crate::endpoint::Endpoint;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

enum ScopedCredential {
    Inference(InferenceCredential),
    Evaluation(EvaluationCredential),
}

impl ScopedCredential {
    fn bearer(&self) -> Result<String, AppError> {
        match self {
            ScopedCredential::Inference(c) => c.bearer(),
            ScopedCredential::Evaluation(c) => c.bearer(COGNITIVE_SERVICES_SCOPE),
        }
    }
}

/// Chat-completions client for one Azure OpenAI deployment.
pub struct AzureOpenAiChat {
    endpoint: Endpoint,
    deployment: String,
    api_version: String,
    credential: ScopedCredential,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl AzureOpenAiChat {
    /// Client for the chat path.
    pub fn for_inference(cfg: &InferenceConfig, credential: InferenceCredential) -> Result<Self, AppError> {
        Ok(Self {
            endpoint: Endpoint::parse(&cfg.endpoint)?,
            deployment: cfg.deployment_name.clone(),
            api_version: cfg.api_version.clone(),
            credential: ScopedCredential::Inference(credential),
        })
    }

    /// Judge client on the evaluation resource.
    pub fn for_evaluation(cfg: &EvaluationConfig, credential: EvaluationCredential) -> Result<Self, AppError> {
        Ok(Self {
            endpoint: Endpoint::parse(&cfg.endpoint)?,
            deployment: cfg.deployment_name.clone(),
            api_version: cfg.api_version.clone(),
            credential: ScopedCredential::Evaluation(credential),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    fn completions_url(&self) -> String {
        self.endpoint.url(&format!(
            "/openai/deployments/{}/chat/completions",
            self.deployment
        ))
    }
}

impl Llm for AzureOpenAiChat {
    fn complete(&self, req: &CompletionRequest) -> Result<String, AppError> {
        let token = self.credential.bearer().map_err(|e| {
            AppError::new(codes::INFERENCE_AUTH_FAILED, "Failed to acquire a bearer token")
                .with_details(e.to_string())
        })?;

        let body = ChatCompletionBody {
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };
        let resp = ureq::post(&self.completions_url())
            .query("api-version", &self.api_version)
            .set("Authorization", &format!("Bearer {token}"))
            .timeout(COMPLETION_TIMEOUT)
            .send_json(serde_json::to_value(body).map_err(|e| {
                AppError::new(codes::INFERENCE_FAILED, "Failed to encode completion request")
                    .with_details(e.to_string())
            })?);

        match resp {
            Ok(r) => {
                let v: ChatCompletionResponse = r.into_json().map_err(|e| {
                    AppError::new(codes::INFERENCE_FAILED, "Failed to decode completion response")
                        .with_details(e.to_string())
                })?;
                let content = v
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(AppError::new(
                        codes::INFERENCE_FAILED,
                        "Completion response was empty",
                    ));
                }
                Ok(content)
            }
            Err(ureq::Error::Status(status, r)) => Err(status_error(status, r)),
            Err(e) => Err(
                AppError::new(codes::INFERENCE_FAILED, "Failed to call completion endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}

/// Seconds form of `Retry-After`; the HTTP-date form is ignored.
fn parse_retry_after(value: Option<&str>) -> Option<u64> {
    value?.trim().parse().ok()
}

fn status_error(status: u16, resp: ureq::Response) -> AppError {
    let retry_after = parse_retry_after(resp.header("retry-after"));
    let body: String = resp
        .into_string()
        .unwrap_or_default()
        .chars()
        .take(300)
        .collect();
    match status {
        429 => AppError::new(codes::INFERENCE_RATE_LIMITED, "Completion endpoint rate limited the request")
            .with_details(format!("status=429; body={body}"))
            .with_retryable(true)
            .with_retry_after(retry_after),
        401 | 403 => AppError::new(codes::INFERENCE_AUTH_FAILED, "Completion endpoint denied the request")
            .with_details(format!("status={status}; body={body}")),
        _ => AppError::new(codes::INFERENCE_FAILED, "Completion request failed")
            .with_details(format!("status={status}; body={body}"))
            .with_retryable(status >= 500),
    }
}
