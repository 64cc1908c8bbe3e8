use pretty_assertions::assert_eq;
use rai_ai::retrieve::{chunk_document, load_corpus, retrieve, Chunk};
use rai_core::cache::DocumentCache;
use rai_core::config::RetrievalSettings;
use rai_core::domain::{CachedDocument, Source};

fn doc(name: &str, text: &str) -> CachedDocument {
    CachedDocument {
        source_name: name.to_string(),
        url: format!("https://example.com/{name}"),
        raw_text: text.to_string(),
        fetched_at: "2026-02-10T00:00:00Z".to_string(),
    }
}

fn source(name: &str) -> Source {
    Source {
        name: name.to_string(),
        url: format!("https://example.com/{name}"),
        description: String::new(),
    }
}

fn settings(size: usize, overlap: usize, top_k: usize) -> RetrievalSettings {
    RetrievalSettings {
        chunk_size_words: size,
        chunk_overlap_words: overlap,
        top_k,
    }
}

fn numbered_words(n: usize) -> String {
    (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn windows_reconstruct_the_document_without_gaps() {
    for (n, size, overlap) in [(1usize, 300usize, 50usize), (299, 300, 50), (300, 300, 50), (301, 300, 50), (1234, 300, 50), (97, 7, 3)] {
        let d = doc("s", &numbered_words(n));
        let chunks = chunk_document(&d, &settings(size, overlap, 3));
        assert!(!chunks.is_empty());

        let mut rebuilt = chunks[0].text.clone();
        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            assert!(next.start_offset <= prev.end_offset, "gap between windows");
            assert!(next.end_offset > prev.end_offset, "window adds nothing");
            rebuilt.push_str(&d.raw_text[prev.end_offset..next.end_offset]);
        }
        assert_eq!(rebuilt, d.raw_text);

        for c in chunks.iter() {
            assert!(c.end_offset <= d.raw_text.len());
            assert_eq!(c.text, &d.raw_text[c.start_offset..c.end_offset]);
            assert!(c.text.split_whitespace().count() <= size);
        }
    }
}

#[test]
fn scores_are_non_increasing_and_ties_keep_corpus_order() {
    let chunks: Vec<Chunk> = vec![
        chunk_document(&doc("a", "printer toner"), &settings(300, 50, 3)),
        chunk_document(&doc("b", "vpn access token"), &settings(300, 50, 3)),
        chunk_document(&doc("c", "printer toner"), &settings(300, 50, 3)),
        chunk_document(&doc("d", "vpn access vpn"), &settings(300, 50, 3)),
    ]
    .into_iter()
    .flatten()
    .collect();

    let hits = retrieve("printer", &chunks, 4);
    assert_eq!(hits.len(), 4);
    for w in hits.windows(2) {
        assert!(w[0].relevance_score >= w[1].relevance_score);
    }
    let order: Vec<&str> = hits.iter().map(|h| h.chunk.source_name.as_str()).collect();
    // a and c tie; b and d both score zero.
    assert_eq!(order, vec!["a", "c", "b", "d"]);

    let top1 = retrieve("printer", &chunks, 1);
    assert_eq!(top1.len(), 1);
    assert_eq!(top1[0].chunk.source_name, "a");
}

#[test]
fn responsible_ai_question_cites_the_matching_source_first() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let cache = DocumentCache::open(tmp.path().to_path_buf());
    cache
        .put(&doc("Password Reset", "To reset your password open the self service portal and follow the prompts."))
        .expect("put");
    cache
        .put(&doc(
            "Responsible AI",
            "Responsible AI is an approach to developing and deploying AI systems safely, ethically and with transparency.",
        ))
        .expect("put");

    let sources = vec![source("Password Reset"), source("Responsible AI"), source("Never Fetched")];
    let chunks = load_corpus(&sources, &cache, &RetrievalSettings::default());
    assert_eq!(chunks.len(), 2);

    let hits = retrieve("What is Responsible AI?", &chunks, 3);
    assert!(!hits.is_empty());
    assert_eq!(hits[0].chunk.source_name, "Responsible AI");
    assert!(hits[0].relevance_score > 0.0);
}

#[test]
fn empty_corpus_retrieves_nothing() {
    assert!(retrieve("anything", &[], 3).is_empty());
}
