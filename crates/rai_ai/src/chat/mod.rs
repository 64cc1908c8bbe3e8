use rai_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::{complete_with_retry, ChatMessage, CompletionRequest, Llm, RetryPolicy};
use crate::retrieve::{retrieve, Chunk, ScoredChunk};

pub mod prompts;

pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const CHAT_MAX_TOKENS: u32 = 500;
pub const SNIPPET_MAX_CHARS: usize = 200;

/// A chunk that was placed in the prompt.
///
/// This is *offered context*: the chunks the model was shown, in prompt order. It is not a
/// claim that the answer actually used this text; the answer is never parsed for citations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub source_name: String,
    pub url: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub snippet: String,
}

impl Citation {
    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self {
            source_name: chunk.source_name.clone(),
            url: chunk.url.clone(),
            start_offset: chunk.start_offset,
            end_offset: chunk.end_offset,
            snippet: snippet_first_chars(&chunk.text, SNIPPET_MAX_CHARS),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAnswer {
    pub query: String,
    pub answer_text: String,
    /// Offered context, see [`Citation`].
    pub citations: Vec<Citation>,
    pub grounded: bool,
}

pub struct ChatComposer<'a> {
    llm: &'a dyn Llm,
    chunks: &'a [Chunk],
    top_k: usize,
    retry: RetryPolicy,
}

impl<'a> ChatComposer<'a> {
    pub fn new(llm: &'a dyn Llm, chunks: &'a [Chunk], top_k: usize) -> Self {
        Self {
            llm,
            chunks,
            top_k,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retrieve context for `query` and ask the model.
    ///
    /// With no cached chunks at all the model is not called; the answer is the fixed
    /// "not enough information" reply with `grounded = false`.
    pub fn answer(&self, query: &str) -> Result<ChatAnswer, AppError> {
        let q = query.trim();
        if q.is_empty() {
            return Err(AppError::new(codes::CHAT_QUERY_EMPTY, "Question must not be empty"));
        }

        let context = retrieve(q, self.chunks, self.top_k);
        if context.is_empty() {
            let e = ungrounded_error(q);
            warn!(error = %e, "answering without context");
            return Ok(ChatAnswer {
                query: q.to_string(),
                answer_text: prompts::UNGROUNDED_ANSWER.to_string(),
                citations: Vec::new(),
                grounded: false,
            });
        }

        let req = build_request(q, &context);
        let answer_text = complete_with_retry(self.llm, &req, &self.retry)?;
        info!(chunks = context.len(), "answered with offered context");

        Ok(ChatAnswer {
            query: q.to_string(),
            answer_text,
            citations: context.iter().map(|sc| Citation::for_chunk(&sc.chunk)).collect(),
            grounded: true,
        })
    }
}

pub fn ungrounded_error(query: &str) -> AppError {
    AppError::new(codes::CHAT_UNGROUNDED, "No cached context is available for this question")
        .with_details(format!("query={query}"))
}

pub fn build_request(query: &str, context: &[ScoredChunk]) -> CompletionRequest {
    let blocks = prompts::context_blocks(context);
    CompletionRequest {
        messages: vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompts::grounded_answer_prompt(query, &blocks)),
        ],
        temperature: CHAT_TEMPERATURE,
        max_tokens: CHAT_MAX_TOKENS,
    }
}

fn snippet_first_chars(text: &str, max_chars: usize) -> String {
    let t = text.trim();
    match t.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &t[..cut]),
        None => t.to_string(),
    }
}
