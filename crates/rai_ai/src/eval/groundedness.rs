use rai_core::domain::{
    EvaluationOutcome, EvaluationResult, ScenarioCategory, ScenarioRecord,
};
use rai_core::error::{codes, AppError};
use serde::Deserialize;
use serde_json::json;

use super::{as_eval_error, Evaluator};
use crate::llm::{complete_with_retry, ChatMessage, CompletionRequest, Llm, RetryPolicy};

/// Scores of this value and above pass.
pub const GROUNDEDNESS_PASS_THRESHOLD: f64 = 3.0;

const JUDGE_SYSTEM_PROMPT: &str = "You are an evaluator that checks whether an answer is supported by a given context. Reply with JSON only.";

fn judge_prompt(record: &ScenarioRecord) -> String {
    format!(
        r#"Rate how well the RESPONSE is grounded in the CONTEXT for the given QUERY.

Scale:
5 = every claim in the response is supported by the context
4 = nearly all claims are supported; minor unsupported detail
3 = the main claim is supported but some content is not
2 = most content is unsupported by the context
1 = the response is unrelated to or contradicts the context

QUERY:
{query}

CONTEXT:
{context}

RESPONSE:
{response}

Return exactly one JSON object: {{"score": <integer 1-5>, "reason": "<one sentence>"}}"#,
        query = record.query,
        context = record.context,
        response = record.response,
    )
}

#[derive(Debug, Deserialize)]
struct JudgeVerdict {
    score: f64,
    #[serde(default)]
    reason: String,
}

/// Pull the verdict object out of the judge reply; models sometimes wrap it in prose or a
/// code fence.
fn parse_verdict(reply: &str) -> Result<JudgeVerdict, AppError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(AppError::new(codes::EVAL_FAILED, "Judge reply contained no JSON object")
                .with_details(reply.chars().take(200).collect::<String>()))
        }
    };
    let v: JudgeVerdict = serde_json::from_str(body).map_err(|e| {
        AppError::new(codes::EVAL_FAILED, "Failed to decode judge verdict").with_details(e.to_string())
    })?;
    if !(1.0..=5.0).contains(&v.score) {
        return Err(AppError::new(codes::EVAL_FAILED, "Judge score out of range")
            .with_details(format!("score={}", v.score)));
    }
    Ok(v)
}

pub struct GroundednessEvaluator<'a> {
    judge: &'a dyn Llm,
    retry: RetryPolicy,
}

impl<'a> GroundednessEvaluator<'a> {
    /// `judge` must be a client built on the evaluation credential.
    pub fn new(judge: &'a dyn Llm) -> Self {
        Self {
            judge,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Evaluator for GroundednessEvaluator<'_> {
    fn category(&self) -> ScenarioCategory {
        ScenarioCategory::Groundedness
    }

    fn evaluate(&self, record: &ScenarioRecord) -> Result<EvaluationResult, AppError> {
        let req = CompletionRequest {
            messages: vec![
                ChatMessage::system(JUDGE_SYSTEM_PROMPT),
                ChatMessage::user(judge_prompt(record)),
            ],
            temperature: 0.0,
            max_tokens: 200,
        };
        let reply = complete_with_retry(self.judge, &req, &self.retry).map_err(as_eval_error)?;
        let verdict = parse_verdict(&reply)?;

        let passed = verdict.score >= GROUNDEDNESS_PASS_THRESHOLD;
        Ok(EvaluationResult {
            scenario_id: record.scenario_id.clone(),
            category: record.category,
            score: Some(verdict.score),
            outcome: if passed {
                EvaluationOutcome::Passed
            } else {
                EvaluationOutcome::Failed
            },
            error: None,
            raw_evaluator_output: json!({
                "groundedness": verdict.score,
                "groundedness_reason": verdict.reason,
                "groundedness_result": if passed { "pass" } else { "fail" },
                "groundedness_threshold": GROUNDEDNESS_PASS_THRESHOLD,
            }),
        })
    }
}
