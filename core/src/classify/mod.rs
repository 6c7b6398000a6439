//! Text classification over a labeled corpus.
//!
//! Two model families share one surface: multinomial Naive Bayes and
//! softmax Logistic Regression. Callers pick one with [`ModelType`] and
//! get back a [`ClassifierModel`], which is immutable once trained.

pub mod logistic;
pub mod naive_bayes;
pub mod vocabulary;

use crate::corpus::TrainingDocument;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub use logistic::{LogisticRegression, LogisticRegressionConfig};
pub use naive_bayes::NaiveBayes;
pub use vocabulary::{SparseVec, TfIdf, Vocabulary};

/// Number of contributing terms named in an explanation.
const EXPLANATION_TERMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    NaiveBayes,
    LogisticRegression,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::NaiveBayes, ModelType::LogisticRegression];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::NaiveBayes => "naive_bayes",
            ModelType::LogisticRegression => "logistic_regression",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive_bayes" => Ok(ModelType::NaiveBayes),
            "logistic_regression" => Ok(ModelType::LogisticRegression),
            other => Err(Error::UnknownModelType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_category: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
    pub explanation: String,
    pub model_used: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: ModelType,
    pub is_trained: bool,
    pub total_documents: usize,
    pub categories: Vec<String>,
}

impl ModelInfo {
    pub fn untrained(model_type: ModelType) -> Self {
        Self { model_type, is_trained: false, total_documents: 0, categories: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_type: ModelType,
    pub training_size: usize,
    pub vocabulary_size: usize,
    pub categories: Vec<String>,
    /// Share of the training documents the fitted model labels correctly.
    pub training_accuracy: f64,
}

/// A trained classifier of either family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierModel {
    NaiveBayes(NaiveBayes),
    LogisticRegression(LogisticRegression),
}

impl ClassifierModel {
    pub fn train(model_type: ModelType, documents: &[TrainingDocument]) -> Result<Self> {
        match model_type {
            ModelType::NaiveBayes => NaiveBayes::train(documents).map(ClassifierModel::NaiveBayes),
            ModelType::LogisticRegression => {
                LogisticRegression::train(documents, &LogisticRegressionConfig::default())
                    .map(ClassifierModel::LogisticRegression)
            }
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            ClassifierModel::NaiveBayes(_) => ModelType::NaiveBayes,
            ClassifierModel::LogisticRegression(_) => ModelType::LogisticRegression,
        }
    }

    pub fn categories(&self) -> &[String] {
        match self {
            ClassifierModel::NaiveBayes(m) => &m.categories,
            ClassifierModel::LogisticRegression(m) => &m.categories,
        }
    }

    pub fn total_documents(&self) -> usize {
        match self {
            ClassifierModel::NaiveBayes(m) => m.trained_doc_count,
            ClassifierModel::LogisticRegression(m) => m.trained_doc_count,
        }
    }

    pub fn vocabulary_size(&self) -> usize {
        match self {
            ClassifierModel::NaiveBayes(m) => m.vocabulary.len(),
            ClassifierModel::LogisticRegression(m) => m.tfidf.vocabulary.len(),
        }
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            model_type: self.model_type(),
            is_trained: true,
            total_documents: self.total_documents(),
            categories: self.categories().to_vec(),
        }
    }

    pub fn predict(&self, text: &str) -> Result<ClassificationResult> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        let scored = match self {
            ClassifierModel::NaiveBayes(m) => m.score(text),
            ClassifierModel::LogisticRegression(m) => m.score(text),
        };
        Ok(scored.into_result(self.categories(), self.model_type()))
    }

    /// Fraction of `documents` whose label matches the model's prediction.
    pub fn accuracy(&self, documents: &[TrainingDocument]) -> f64 {
        if documents.is_empty() { return 0.0; }
        let correct = documents
            .iter()
            .filter(|d| self.predict(&d.text).map_or(false, |r| r.predicted_category == d.category))
            .count();
        correct as f64 / documents.len() as f64
    }

    pub fn report(&self, documents: &[TrainingDocument]) -> TrainingReport {
        TrainingReport {
            model_type: self.model_type(),
            training_size: self.total_documents(),
            vocabulary_size: self.vocabulary_size(),
            categories: self.categories().to_vec(),
            training_accuracy: self.accuracy(documents),
        }
    }
}

/// Per-category probabilities plus the (term, contribution) pairs that support
/// each category, as produced by one of the model families.
pub(crate) struct Scored {
    pub probabilities: Vec<f64>,
    pub contributions: Vec<Vec<(String, f64)>>,
}

impl Scored {
    fn into_result(self, categories: &[String], model_type: ModelType) -> ClassificationResult {
        let best = argmax(&self.probabilities);
        let predicted_category = categories[best].clone();
        let confidence = self.probabilities[best];
        let probabilities: BTreeMap<String, f64> =
            categories.iter().cloned().zip(self.probabilities.iter().copied()).collect();

        let mut terms = self.contributions.into_iter().nth(best).unwrap_or_default();
        terms.retain(|(_, c)| *c > 0.0);
        terms.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        let top: Vec<String> = terms.into_iter().take(EXPLANATION_TERMS).map(|(t, _)| t).collect();

        let explanation = explain(model_type, &predicted_category, confidence, &probabilities, &top);
        ClassificationResult {
            predicted_category,
            confidence,
            probabilities,
            explanation,
            model_used: model_type.to_string(),
        }
    }
}

/// Discover the sorted category set of a corpus.
pub(crate) fn categories_of(documents: &[TrainingDocument]) -> Vec<String> {
    documents.iter().map(|d| d.category.clone()).collect::<BTreeSet<_>>().into_iter().collect()
}

/// Index of the largest value; ties go to the lowest index.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Numerically stable softmax.
pub(crate) fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn explain(
    model_type: ModelType,
    category: &str,
    confidence: f64,
    probabilities: &BTreeMap<String, f64>,
    top_terms: &[String],
) -> String {
    let level = if confidence >= 0.8 {
        "high"
    } else if confidence >= 0.6 {
        "moderate"
    } else {
        "low"
    };
    let mut out = format!(
        "The {} model classified this text as '{}' with {:.1}% confidence ({}-confidence prediction).",
        model_type.as_str().replace('_', " "),
        category,
        confidence * 100.0,
        level
    );
    if top_terms.is_empty() {
        out.push_str(" No informative terms were found in the text; the prediction reflects category priors only.");
    } else {
        out.push_str(&format!(" Top contributing terms: {}.", top_terms.join(", ")));
    }
    let mut alternatives: Vec<(&String, &f64)> = probabilities.iter().filter(|(c, _)| c.as_str() != category).collect();
    alternatives.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
    if !alternatives.is_empty() {
        let alts: Vec<String> = alternatives.iter().map(|(c, p)| format!("{}: {:.1}%", c, *p * 100.0)).collect();
        out.push_str(&format!(" Alternative classifications: {}", alts.join(", ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_round_trips_through_strings() {
        for mt in ModelType::ALL {
            assert_eq!(mt.as_str().parse::<ModelType>().unwrap(), mt);
        }
        assert!(matches!("svm".parse::<ModelType>(), Err(Error::UnknownModelType(_))));
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[-1000.0, -1001.0, -999.5]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(argmax(&p), 2);
    }

    #[test]
    fn explanation_mentions_missing_terms() {
        let mut probs = BTreeMap::new();
        probs.insert("a".to_string(), 0.5);
        probs.insert("b".to_string(), 0.5);
        let text = explain(ModelType::NaiveBayes, "a", 0.5, &probs, &[]);
        assert!(text.contains("No informative terms"));
        assert!(text.contains("b: 50.0%"));
    }
}
