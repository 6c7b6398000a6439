use super::vocabulary::{SparseVec, TfIdf};
use super::{categories_of, softmax, Scored};
use crate::corpus::TrainingDocument;
use crate::error::{Error, Result};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};

/// Optimiser settings for [`LogisticRegression`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticRegressionConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop once every gradient component is below this magnitude.
    pub tol: f64,
    /// L2 penalty applied to the weights (not the intercepts).
    pub l2: f64,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self { learning_rate: 1.0, max_iter: 500, tol: 1e-5, l2: 1e-3 }
    }
}

impl LogisticRegressionConfig {
    #[must_use]
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    #[must_use]
    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }
}

/// Multinomial (softmax) logistic regression over TF-IDF features, fitted
/// with full-batch gradient descent on L2-regularised cross-entropy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub tfidf: TfIdf,
    pub categories: Vec<String>,
    /// `[category][term]`
    pub weights: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub trained_doc_count: usize,
    pub iterations: usize,
}

impl LogisticRegression {
    pub fn train(documents: &[TrainingDocument], config: &LogisticRegressionConfig) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let categories = categories_of(documents);
        let tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(&d.text)).collect();
        let tfidf = TfIdf::fit(&tokens);
        let features: Vec<SparseVec> = tokens.iter().map(|t| tfidf.transform_tokens(t)).collect();
        let labels: Vec<usize> = documents
            .iter()
            .map(|d| categories.binary_search(&d.category).unwrap_or(0))
            .collect();

        let k = categories.len();
        let v = tfidf.vocabulary.len();
        let mut model = Self {
            tfidf,
            categories,
            weights: vec![vec![0.0; v]; k],
            intercepts: vec![0.0; k],
            trained_doc_count: documents.len(),
            iterations: 0,
        };

        let n = documents.len() as f64;
        for iter in 0..config.max_iter {
            let mut grad_w = vec![vec![0.0; v]; k];
            let mut grad_b = vec![0.0; k];

            for (x, &y) in features.iter().zip(&labels) {
                let probs = softmax(&model.linear_scores(x));
                for c in 0..k {
                    let err = probs[c] - if c == y { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    for (j, value) in x {
                        grad_w[c][*j] += err * value;
                    }
                }
            }

            let mut max_grad = 0.0f64;
            for c in 0..k {
                grad_b[c] /= n;
                max_grad = max_grad.max(grad_b[c].abs());
                model.intercepts[c] -= config.learning_rate * grad_b[c];
                for j in 0..v {
                    let g = grad_w[c][j] / n + config.l2 * model.weights[c][j];
                    max_grad = max_grad.max(g.abs());
                    model.weights[c][j] -= config.learning_rate * g;
                }
            }

            model.iterations = iter + 1;
            if max_grad < config.tol {
                break;
            }
        }

        tracing::info!(
            documents = documents.len(),
            vocabulary = v,
            categories = k,
            iterations = model.iterations,
            "trained logistic regression"
        );
        Ok(model)
    }

    fn linear_scores(&self, x: &SparseVec) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.intercepts)
            .map(|(w, b)| b + x.iter().map(|(j, value)| w[*j] * value).sum::<f64>())
            .collect()
    }

    pub(crate) fn score(&self, text: &str) -> Scored {
        let x = self.tfidf.transform(text);
        let probabilities = softmax(&self.linear_scores(&x));
        let contributions = self
            .weights
            .iter()
            .map(|w| {
                x.iter()
                    .map(|(j, value)| (self.tfidf.vocabulary.term(*j).to_string(), w[*j] * value))
                    .collect()
            })
            .collect();
        Scored { probabilities, contributions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str, category: &str) -> TrainingDocument {
        TrainingDocument { text: text.into(), category: category.into() }
    }

    #[test]
    fn separates_disjoint_vocabularies() {
        let docs = vec![
            doc("profit revenue market", "business"),
            doc("market stock profit", "business"),
            doc("vaccine hospital patient", "health"),
            doc("patient treatment vaccine", "health"),
        ];
        let lr = LogisticRegression::train(&docs, &LogisticRegressionConfig::default()).unwrap();
        let p = lr.score("hospital vaccine").probabilities;
        assert!(p[1] > p[0]);
        let p = lr.score("stock revenue").probabilities;
        assert!(p[0] > p[1]);
    }

    #[test]
    fn respects_iteration_budget() {
        let docs = vec![doc("alpha beta", "x"), doc("gamma delta", "y")];
        let cfg = LogisticRegressionConfig::default().with_max_iter(3);
        let lr = LogisticRegression::train(&docs, &cfg).unwrap();
        assert!(lr.iterations <= 3);
    }

    #[test]
    fn weights_penalised_towards_zero() {
        let docs = vec![doc("alpha", "x"), doc("beta", "y")];
        let loose = LogisticRegression::train(&docs, &LogisticRegressionConfig::default().with_l2(0.0)).unwrap();
        let tight = LogisticRegression::train(&docs, &LogisticRegressionConfig::default().with_l2(0.5)).unwrap();
        let mag = |m: &LogisticRegression| m.weights.iter().flatten().map(|w| w.abs()).sum::<f64>();
        assert!(mag(&tight) < mag(&loose));
    }
}
