//! Scenario evaluators and the batch runner.
//!
//! Each scenario is judged by the evaluator for its own category: groundedness records by the
//! LLM judge (query, response and context), harmful-content records by the safety annotation
//! service (response only). Both talk to the evaluation resource, never the chat resource.

use rai_core::domain::{EvaluationResult, ScenarioCategory, ScenarioRecord};
use rai_core::error::{codes, AppError};

pub mod content_safety;
pub mod groundedness;
pub mod runner;

pub use content_safety::{AzureRaiAnnotator, ContentSafetyEvaluator, SafetyAnnotator};
pub use groundedness::GroundednessEvaluator;
pub use runner::{storage_role_command, EvaluationRunSummary, EvaluationRunner, RunPhase};

pub trait Evaluator {
    fn category(&self) -> ScenarioCategory;

    /// Score one record. An `Err` becomes an `error` outcome for that record only.
    fn evaluate(&self, record: &ScenarioRecord) -> Result<EvaluationResult, AppError>;
}

/// Evaluation-scope view of a failure from a lower layer (inference or token acquisition).
pub(crate) fn as_eval_error(e: AppError) -> AppError {
    if e.is(codes::EVAL_FAILED) || e.is(codes::EVAL_AUTH_FAILED) {
        return e;
    }
    let code = if e.is(codes::INFERENCE_AUTH_FAILED) || e.is(codes::AUTH_TOKEN_FAILED) {
        codes::EVAL_AUTH_FAILED
    } else {
        codes::EVAL_FAILED
    };
    AppError::new(code, "Evaluator call failed")
        .with_details(e.to_string())
        .with_retryable(e.retryable)
}
