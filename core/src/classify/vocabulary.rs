use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Sparse feature vector: (term index, value), sorted by index.
pub type SparseVec = Vec<(usize, f64)>;

/// Term → feature index, assigned in lexicographic term order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    index: HashMap<String, usize>,
    terms: Vec<String>,
}

impl Vocabulary {
    pub fn fit<'a>(token_lists: impl IntoIterator<Item = &'a Vec<String>>) -> Self {
        let terms: BTreeSet<&String> = token_lists.into_iter().flatten().collect();
        let terms: Vec<String> = terms.into_iter().cloned().collect();
        let index = terms.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();
        Self { index, terms }
    }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    pub fn get(&self, term: &str) -> Option<usize> { self.index.get(term).copied() }

    pub fn term(&self, idx: usize) -> &str { &self.terms[idx] }

    /// Raw term counts for in-vocabulary tokens; unknown tokens are skipped.
    pub fn counts(&self, tokens: &[String]) -> SparseVec {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for tok in tokens {
            if let Some(i) = self.get(tok) {
                *counts.entry(i).or_insert(0.0) += 1.0;
            }
        }
        let mut v: SparseVec = counts.into_iter().collect();
        v.sort_by_key(|(i, _)| *i);
        v
    }
}

/// TF-IDF weighting fitted on a training corpus, producing L2-normalised rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TfIdf {
    pub vocabulary: Vocabulary,
    idf: Vec<f64>,
}

impl TfIdf {
    /// Smoothed idf `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit(token_lists: &[Vec<String>]) -> Self {
        let vocabulary = Vocabulary::fit(token_lists);
        let mut df = vec![0u32; vocabulary.len()];
        for tokens in token_lists {
            for (i, _) in vocabulary.counts(tokens) {
                df[i] += 1;
            }
        }
        let n = token_lists.len() as f64;
        let idf = df.iter().map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0).collect();
        Self { vocabulary, idf }
    }

    pub fn transform_tokens(&self, tokens: &[String]) -> SparseVec {
        let mut v = self.vocabulary.counts(tokens);
        for (i, x) in v.iter_mut() {
            *x *= self.idf[*i];
        }
        let norm = v.iter().map(|(_, x)| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, x) in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }

    pub fn transform(&self, text: &str) -> SparseVec {
        self.transform_tokens(&tokenize(text))
    }
}
