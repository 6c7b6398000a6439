use super::vocabulary::Vocabulary;
use super::{categories_of, softmax, Scored};
use crate::corpus::TrainingDocument;
use crate::error::{Error, Result};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};

/// Multinomial Naive Bayes with Laplace smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayes {
    pub vocabulary: Vocabulary,
    pub categories: Vec<String>,
    /// `ln P(c)` per category.
    pub log_priors: Vec<f64>,
    /// `ln P(t|c)`, indexed `[category][term]`.
    pub log_likelihoods: Vec<Vec<f64>>,
    pub trained_doc_count: usize,
}

impl NaiveBayes {
    pub fn train(documents: &[TrainingDocument]) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let categories = categories_of(documents);
        let tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(&d.text)).collect();
        let vocabulary = Vocabulary::fit(&tokens);
        let v = vocabulary.len();

        let mut doc_counts = vec![0usize; categories.len()];
        let mut term_counts = vec![vec![0.0f64; v]; categories.len()];
        for (doc, toks) in documents.iter().zip(&tokens) {
            let c = categories.binary_search(&doc.category).unwrap_or(0);
            doc_counts[c] += 1;
            for (i, n) in vocabulary.counts(toks) {
                term_counts[c][i] += n;
            }
        }

        let n = documents.len() as f64;
        let log_priors = doc_counts.iter().map(|&k| (k as f64 / n).ln()).collect();
        let log_likelihoods = term_counts
            .iter()
            .map(|counts| {
                let total: f64 = counts.iter().sum();
                let denom = total + v as f64;
                counts.iter().map(|&k| ((k + 1.0) / denom).ln()).collect()
            })
            .collect();

        tracing::info!(documents = documents.len(), vocabulary = v, categories = categories.len(), "trained naive bayes");
        Ok(Self { vocabulary, categories, log_priors, log_likelihoods, trained_doc_count: documents.len() })
    }

    pub(crate) fn score(&self, text: &str) -> Scored {
        let counts = self.vocabulary.counts(&tokenize(text));
        let log_posteriors: Vec<f64> = self
            .log_priors
            .iter()
            .zip(&self.log_likelihoods)
            .map(|(prior, ll)| prior + counts.iter().map(|(i, n)| n * ll[*i]).sum::<f64>())
            .collect();

        let contributions = self
            .log_likelihoods
            .iter()
            .map(|ll| {
                counts
                    .iter()
                    .map(|(i, _)| (self.vocabulary.term(*i).to_string(), ll[*i].exp()))
                    .collect()
            })
            .collect();

        Scored { probabilities: softmax(&log_posteriors), contributions }
    }
}
