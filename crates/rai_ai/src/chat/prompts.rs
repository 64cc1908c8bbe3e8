use crate::retrieve::ScoredChunk;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on provided sources. Always cite which source you're using.";

pub const UNGROUNDED_ANSWER: &str = "I don't have enough information to answer that question.";

/// Numbered context blocks in retrieval order: `Source N (url):\n<text>`.
pub fn context_blocks(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, sc)| format!("Source {} ({}):\n{}", i + 1, sc.chunk.url, sc.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn grounded_answer_prompt(query: &str, context_blocks: &str) -> String {
    // The model may only answer from the sources and must say so when they are insufficient.
    format!(
        r#"Based on the following sources, answer the question.
If the answer is not in the sources, say so.

Sources:
{context_blocks}

Question: {query}

Answer:"#
    )
}
