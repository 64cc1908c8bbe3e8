//! TF-IDF cosine scoring.
//!
//! Tokens are lowercased runs of two or more word characters with common English stop words
//! removed. The vocabulary and inverse document frequencies are fitted on the chunk texts;
//! query terms outside that vocabulary are ignored. Idf is smoothed:
//! `ln((1 + n) / (1 + df)) + 1`. Vectors are L2-normalised, so the score is a dot product.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here", "hereafter",
    "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his", "how", "however",
    "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its",
    "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd", "made", "many", "may",
    "me", "meanwhile", "might", "mill", "mine", "more", "moreover", "most", "mostly", "move",
    "much", "must", "my", "myself", "name", "namely", "neither", "never", "nevertheless", "next",
    "nine", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of",
    "off", "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise",
    "our", "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put",
    "rather", "re", "same", "see", "seem", "seemed", "seeming", "seems", "serious", "several",
    "she", "should", "show", "side", "since", "sincere", "six", "sixty", "so", "some", "somehow",
    "someone", "something", "sometime", "sometimes", "somewhere", "still", "such", "system",
    "take", "ten", "than", "that", "the", "their", "them", "themselves", "then", "thence",
    "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they",
    "thick", "thin", "third", "this", "those", "though", "three", "through", "throughout", "thru",
    "thus", "to", "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "un",
    "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who", "whoever",
    "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you",
    "your", "yours", "yourself", "yourselves",
];

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("static regex"))
}

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    token_re()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !stop_words().contains(t))
        .map(str::to_string)
        .collect()
}

/// Sparse L2-normalised vector keyed by vocabulary index.
type SparseVec = BTreeMap<usize, f64>;

#[derive(Debug, Clone)]
pub struct TfidfIndex {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
    docs: Vec<SparseVec>,
}

impl TfidfIndex {
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t.as_ref())).collect();

        let mut vocab: HashMap<String, usize> = HashMap::new();
        let mut df: Vec<usize> = Vec::new();
        for toks in tokenized.iter() {
            let unique: HashSet<&String> = toks.iter().collect();
            for t in unique {
                let next = vocab.len();
                let idx = *vocab.entry(t.clone()).or_insert(next);
                if idx == df.len() {
                    df.push(0);
                }
                df[idx] += 1;
            }
        }

        let n = texts.len() as f64;
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let mut index = Self {
            vocab,
            idf,
            docs: Vec::new(),
        };
        index.docs = tokenized.iter().map(|toks| index.vectorize(toks)).collect();
        index
    }

    fn vectorize(&self, tokens: &[String]) -> SparseVec {
        let mut v: SparseVec = BTreeMap::new();
        for t in tokens {
            if let Some(&idx) = self.vocab.get(t) {
                *v.entry(idx).or_insert(0.0) += 1.0;
            }
        }
        for (idx, w) in v.iter_mut() {
            *w *= self.idf[*idx];
        }
        let norm = v.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for w in v.values_mut() {
                *w /= norm;
            }
        }
        v
    }

    /// Cosine similarity of `query` against every fitted text, in fit order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let q = self.vectorize(&tokenize(query));
        self.docs
            .iter()
            .map(|d| q.iter().filter_map(|(i, w)| d.get(i).map(|x| x * w)).sum::<f64>())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_short_tokens_and_stop_words() {
        assert_eq!(
            tokenize("What is Responsible AI? A B-2 plan."),
            vec!["responsible", "ai", "plan"]
        );
    }

    #[test]
    fn identical_text_scores_one_and_disjoint_scores_zero() {
        let idx = TfidfIndex::fit(&["password reset portal", "printer toner cartridge"]);
        let s = idx.scores("password reset portal");
        assert!((s[0] - 1.0).abs() < 1e-9);
        assert_eq!(s[1], 0.0);
    }

    #[test]
    fn unknown_query_terms_score_zero() {
        let idx = TfidfIndex::fit(&["alpha beta"]);
        assert_eq!(idx.scores("gamma"), vec![0.0]);
        assert_eq!(idx.len(), 1);
    }
}
