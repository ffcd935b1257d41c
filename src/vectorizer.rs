use std::cmp::Reverse;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Hard cap on the learned vocabulary size.
pub const MAX_VOCABULARY: usize = 50_000;

/// A sparse feature vector: parallel index/value arrays, indices ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f64>,
}

impl SparseVector {
    pub fn get(&self, feature: u32) -> f64 {
        match self.indices.binary_search(&feature) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product against a dense weight slice.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.indices
            .iter()
            .zip(&self.values)
            .map(|(&i, &v)| weights.get(i as usize).copied().unwrap_or(0.0) * v)
            .sum()
    }
}

/// TF-IDF vectorizer over combined word and character n-grams (n in {1,2})
/// of the raw URL string.
///
/// The vocabulary is learned once during `fit` and frozen afterwards: it is
/// part of the serialized model artifact, and `transform` is a pure function
/// of it. Unseen terms contribute zero; they never trigger refitting.
///
/// Conventions follow the common TF-IDF formulation: smooth IDF
/// `ln((1 + n) / (1 + df)) + 1` and L2-normalized rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f64>,
    max_features: usize,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self::with_max_features(MAX_VOCABULARY)
    }

    pub fn with_max_features(max_features: usize) -> Self {
        Self {
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            max_features,
        }
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    /// Learn the vocabulary and IDF weights from the training corpus.
    ///
    /// When the vocabulary would exceed the cap, the lowest-frequency terms
    /// are dropped by corpus-frequency rank with a lexicographic tie-break,
    /// so the same training set always yields the same vocabulary.
    pub fn fit(&mut self, docs: &[String]) {
        let mut term_counts: HashMap<String, u64> = HashMap::new();
        let mut doc_freq: HashMap<String, u64> = HashMap::new();

        for doc in docs {
            let counts = count_terms(doc);
            for (term, count) in counts {
                *term_counts.entry(term.clone()).or_insert(0) += count;
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = term_counts.into_iter().collect();
        ranked.sort_by(|a, b| (Reverse(a.1), &a.0).cmp(&(Reverse(b.1), &b.0)));
        ranked.truncate(self.max_features);

        let mut kept: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        kept.sort();

        let n_docs = docs.len() as f64;
        self.idf = kept
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term, i as u32))
            .collect();

        info!(
            "Fitted vectorizer: {} terms from {} documents",
            self.vocabulary.len(),
            docs.len()
        );
    }

    /// Map documents onto the frozen vocabulary. Pure: the same input and
    /// vocabulary always produce identical vectors.
    pub fn transform(&self, docs: &[String]) -> Vec<SparseVector> {
        docs.iter().map(|doc| self.transform_one(doc)).collect()
    }

    fn transform_one(&self, doc: &str) -> SparseVector {
        let counts = count_terms(doc);

        let mut entries: Vec<(u32, f64)> = counts
            .into_iter()
            .filter_map(|(term, count)| {
                self.vocabulary
                    .get(&term)
                    .map(|&idx| (idx, count as f64 * self.idf[idx as usize]))
            })
            .collect();
        entries.sort_by_key(|&(idx, _)| idx);

        let norm: f64 = entries.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for entry in &mut entries {
                entry.1 /= norm;
            }
        }

        let (indices, values) = entries.into_iter().unzip();
        SparseVector { indices, values }
    }

    pub fn fit_transform(&mut self, docs: &[String]) -> Vec<SparseVector> {
        self.fit(docs);
        self.transform(docs)
    }
}

/// Term counts for one document: word 1/2-grams plus char 1/2-grams.
fn count_terms(doc: &str) -> HashMap<String, u64> {
    let lowered = doc.to_lowercase();
    let mut counts = HashMap::new();

    let words = word_tokens(&lowered);
    for word in &words {
        *counts.entry(word.clone()).or_insert(0) += 1;
    }
    for pair in words.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0) += 1;
    }

    // Char grams get a "c:" prefix so they live in the same vocabulary as
    // word grams without colliding (word tokens never contain ':').
    let chars: Vec<char> = lowered.chars().collect();
    for ch in &chars {
        *counts.entry(format!("c:{ch}")).or_insert(0) += 1;
    }
    for pair in chars.windows(2) {
        *counts.entry(format!("c:{}{}", pair[0], pair[1])).or_insert(0) += 1;
    }

    counts
}

/// Maximal runs of alphanumerics, two or more characters long.
fn word_tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|tok| tok.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}
