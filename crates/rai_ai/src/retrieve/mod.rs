use rai_core::cache::DocumentCache;
use rai_core::config::RetrievalSettings;
use rai_core::domain::Source;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod chunking;
pub mod scoring;

pub use chunking::{chunk_document, Chunk};
pub use scoring::TfidfIndex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub relevance_score: f64,
}

/// Chunk every cached source, in configured source order.
///
/// A source without a readable cache entry contributes no chunks; that is logged, not an error.
pub fn load_corpus(
    sources: &[Source],
    cache: &DocumentCache,
    settings: &RetrievalSettings,
) -> Vec<Chunk> {
    let mut out = Vec::new();
    for source in sources {
        match cache.load(&source.name) {
            Some(doc) => {
                let chunks = chunk_document(&doc, settings);
                debug!(source = %source.name, chunks = chunks.len(), "chunked cached source");
                out.extend(chunks);
            }
            None => warn!(source = %source.name, "no cached text for source; run prep"),
        }
    }
    out
}

/// Top `top_k` chunks for `query`, highest score first.
///
/// Ties keep corpus order (source order, then ordinal). Zero-score chunks are still returned
/// when fewer than `top_k` chunks match.
pub fn retrieve(query: &str, chunks: &[Chunk], top_k: usize) -> Vec<ScoredChunk> {
    if chunks.is_empty() || top_k == 0 {
        return Vec::new();
    }
    let index = TfidfIndex::fit(&chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>());
    let scores = index.scores(query);

    let mut ranked: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
    // Stable sort keeps corpus order among equal scores.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_k);

    ranked
        .into_iter()
        .map(|(i, relevance_score)| ScoredChunk {
            chunk: chunks[i].clone(),
            relevance_score,
        })
        .collect()
}
