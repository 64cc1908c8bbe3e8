use std::cell::{Cell, RefCell};
use std::time::Duration;

use pretty_assertions::assert_eq;
use rai_ai::chat::prompts::{SYSTEM_PROMPT, UNGROUNDED_ANSWER};
use rai_ai::chat::ChatComposer;
use rai_ai::llm::{CompletionRequest, Llm, RetryPolicy, Role};
use rai_ai::retrieve::{chunk_document, Chunk};
use rai_core::config::RetrievalSettings;
use rai_core::domain::CachedDocument;
use rai_core::error::{codes, AppError};

/// Replays scripted replies in order and records every request.
struct ScriptedLlm {
    replies: RefCell<Vec<Result<String, AppError>>>,
    calls: Cell<u32>,
    last: RefCell<Option<CompletionRequest>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<String, AppError>>) -> Self {
        Self {
            replies: RefCell::new(replies),
            calls: Cell::new(0),
            last: RefCell::new(None),
        }
    }
}

impl Llm for ScriptedLlm {
    fn complete(&self, req: &CompletionRequest) -> Result<String, AppError> {
        self.calls.set(self.calls.get() + 1);
        *self.last.borrow_mut() = Some(req.clone());
        let mut replies = self.replies.borrow_mut();
        if replies.is_empty() {
            return Err(AppError::new(codes::INFERENCE_FAILED, "script exhausted"));
        }
        replies.remove(0)
    }
}

fn rate_limited() -> AppError {
    AppError::new(codes::INFERENCE_RATE_LIMITED, "Completion endpoint rate limited the request")
        .with_retryable(true)
}

fn no_wait() -> RetryPolicy {
    RetryPolicy {
        rate_limit_backoff: Duration::ZERO,
        max_retry_after: Duration::ZERO,
    }
}

fn corpus() -> Vec<Chunk> {
    let docs = [
        ("Responsible AI", "Responsible AI means building AI systems that are fair, reliable, safe and transparent."),
        ("VPN", "Install the VPN client and sign in with your corporate account."),
    ];
    docs.iter()
        .flat_map(|(name, text)| {
            chunk_document(
                &CachedDocument {
                    source_name: name.to_string(),
                    url: format!("https://intranet.example/{}", name.replace(' ', "-").to_lowercase()),
                    raw_text: text.to_string(),
                    fetched_at: "2026-02-10T00:00:00Z".to_string(),
                },
                &RetrievalSettings::default(),
            )
        })
        .collect()
}

#[test]
fn grounded_answer_offers_retrieved_chunks_as_citations() {
    let chunks = corpus();
    let llm = ScriptedLlm::new(vec![Ok("Responsible AI is about fair and safe systems [Source 1].".to_string())]);
    let chat = ChatComposer::new(&llm, &chunks, 3).with_retry_policy(no_wait());

    let answer = chat.answer("  What is Responsible AI?  ").expect("answer");
    assert!(answer.grounded);
    assert_eq!(answer.query, "What is Responsible AI?");
    assert_eq!(answer.answer_text, "Responsible AI is about fair and safe systems [Source 1].");
    assert_eq!(answer.citations.len(), 2);
    assert_eq!(answer.citations[0].source_name, "Responsible AI");
    assert_eq!(answer.citations[0].url, "https://intranet.example/responsible-ai");

    let req = llm.last.borrow().clone().expect("request");
    assert_eq!(req.temperature, 0.7);
    assert_eq!(req.max_tokens, 500);
    assert_eq!(req.messages[0].role, Role::System);
    assert_eq!(req.messages[0].content, SYSTEM_PROMPT);
    let user = &req.messages[1].content;
    assert!(user.starts_with("Based on the following sources, answer the question."));
    assert!(user.contains("Source 1 (https://intranet.example/responsible-ai):\nResponsible AI means"));
    assert!(user.contains("Source 2 (https://intranet.example/vpn):"));
    assert!(user.ends_with("Question: What is Responsible AI?\n\nAnswer:"));
}

#[test]
fn long_chunks_get_truncated_snippets() {
    let text = "alpha ".repeat(100);
    let chunks = chunk_document(
        &CachedDocument {
            source_name: "Long".to_string(),
            url: "https://intranet.example/long".to_string(),
            raw_text: text.trim().to_string(),
            fetched_at: "2026-02-10T00:00:00Z".to_string(),
        },
        &RetrievalSettings::default(),
    );
    let llm = ScriptedLlm::new(vec![Ok("ok".to_string())]);
    let answer = ChatComposer::new(&llm, &chunks, 3).answer("alpha").expect("answer");
    let snippet = &answer.citations[0].snippet;
    assert!(snippet.ends_with("..."));
    assert_eq!(snippet.chars().count(), 203);
}

#[test]
fn no_cached_context_returns_fixed_reply_without_calling_the_model() {
    let llm = ScriptedLlm::new(vec![Ok("should not be used".to_string())]);
    let answer = ChatComposer::new(&llm, &[], 3).answer("What is Responsible AI?").expect("answer");
    assert!(!answer.grounded);
    assert!(answer.citations.is_empty());
    assert_eq!(answer.answer_text, UNGROUNDED_ANSWER);
    assert_eq!(llm.calls.get(), 0);
}

#[test]
fn rate_limit_is_retried_exactly_once() {
    let chunks = corpus();

    let llm = ScriptedLlm::new(vec![Err(rate_limited()), Ok("second try".to_string())]);
    let chat = ChatComposer::new(&llm, &chunks, 3).with_retry_policy(no_wait());
    assert_eq!(chat.answer("vpn").expect("answer").answer_text, "second try");
    assert_eq!(llm.calls.get(), 2);

    let llm = ScriptedLlm::new(vec![Err(rate_limited()), Err(rate_limited()), Ok("never".to_string())]);
    let chat = ChatComposer::new(&llm, &chunks, 3).with_retry_policy(no_wait());
    let err = chat.answer("vpn").expect_err("still limited");
    assert_eq!(err.code, codes::INFERENCE_RATE_LIMITED);
    assert_eq!(llm.calls.get(), 2);
}

#[test]
fn retry_waits_for_server_requested_delay_up_to_the_cap() {
    let chunks = corpus();
    let llm = ScriptedLlm::new(vec![
        Err(rate_limited().with_retry_after(Some(30))),
        Ok("after wait".to_string()),
    ]);
    let policy = RetryPolicy {
        rate_limit_backoff: Duration::ZERO,
        max_retry_after: Duration::from_millis(50),
    };
    let chat = ChatComposer::new(&llm, &chunks, 3).with_retry_policy(policy);

    let started = std::time::Instant::now();
    assert_eq!(chat.answer("vpn").expect("answer").answer_text, "after wait");
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(50), "waited {waited:?}");
    assert!(waited < Duration::from_secs(5), "cap ignored: {waited:?}");
    assert_eq!(llm.calls.get(), 2);
}

#[test]
fn other_inference_failures_propagate_without_retry() {
    let chunks = corpus();
    let llm = ScriptedLlm::new(vec![
        Err(AppError::new(codes::INFERENCE_AUTH_FAILED, "Completion endpoint denied the request")),
        Ok("unused".to_string()),
    ]);
    let chat = ChatComposer::new(&llm, &chunks, 3).with_retry_policy(no_wait());
    let err = chat.answer("vpn").expect_err("auth");
    assert_eq!(err.code, codes::INFERENCE_AUTH_FAILED);
    assert_eq!(llm.calls.get(), 1);
}

#[test]
fn blank_question_is_rejected() {
    let chunks = corpus();
    let llm = ScriptedLlm::new(vec![]);
    let err = ChatComposer::new(&llm, &chunks, 3).answer("   ").expect_err("empty");
    assert_eq!(err.code, codes::CHAT_QUERY_EMPTY);
}
