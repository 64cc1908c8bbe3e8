use rai_core::config::RetrievalSettings;
use rai_core::domain::CachedDocument;
use serde::{Deserialize, Serialize};

/// A window of consecutive words from one cached document.
///
/// `text` is always `raw_text[start_offset..end_offset]` of the source document (byte offsets).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub source_name: String,
    pub url: String,
    pub ordinal: u32,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Byte spans of whitespace-separated words.
pub(crate) fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

/// Split a document into overlapping word windows.
///
/// Windows advance by `chunk_size_words - chunk_overlap_words`; the last window ends at the
/// last word and no window is emitted that is wholly contained in its predecessor. Settings
/// are assumed to be validated.
pub fn chunk_document(doc: &CachedDocument, settings: &RetrievalSettings) -> Vec<Chunk> {
    let words = word_spans(&doc.raw_text);
    if words.is_empty() {
        return Vec::new();
    }
    let size = settings.chunk_size_words.max(1);
    let step = size.saturating_sub(settings.chunk_overlap_words).max(1);

    let mut out = Vec::new();
    let mut first = 0usize;
    loop {
        let last = (first + size).min(words.len());
        let start_offset = words[first].0;
        let end_offset = words[last - 1].1;
        out.push(Chunk {
            source_name: doc.source_name.clone(),
            url: doc.url.clone(),
            ordinal: out.len() as u32,
            text: doc.raw_text[start_offset..end_offset].to_string(),
            start_offset,
            end_offset,
        });
        if last == words.len() {
            break;
        }
        first += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> CachedDocument {
        CachedDocument {
            source_name: "s".to_string(),
            url: "https://example.com".to_string(),
            raw_text: text.to_string(),
            fetched_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn settings(size: usize, overlap: usize) -> RetrievalSettings {
        RetrievalSettings {
            chunk_size_words: size,
            chunk_overlap_words: overlap,
            ..RetrievalSettings::default()
        }
    }

    #[test]
    fn word_spans_handle_multibyte_text() {
        let text = "héllo  wörld ✓";
        let spans = word_spans(text);
        let words: Vec<&str> = spans.iter().map(|(s, e)| &text[*s..*e]).collect();
        assert_eq!(words, vec!["héllo", "wörld", "✓"]);
    }

    #[test]
    fn windows_overlap_by_configured_words() {
        let text = (1..=10).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_document(&doc(&text), &settings(4, 1));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["w1 w2 w3 w4", "w4 w5 w6 w7", "w7 w8 w9 w10"]);
        assert_eq!(chunks[2].ordinal, 2);
    }

    #[test]
    fn short_and_empty_documents() {
        assert!(chunk_document(&doc(""), &settings(300, 50)).is_empty());
        let one = chunk_document(&doc("just three words"), &settings(300, 50));
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].start_offset, 0);
        assert_eq!(one[0].end_offset, "just three words".len());
    }

    #[test]
    fn exact_multiple_does_not_emit_contained_window() {
        let text = (1..=8).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk_document(&doc(&text), &settings(4, 2));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["w1 w2 w3 w4", "w3 w4 w5 w6", "w5 w6 w7 w8"]);
    }
}
