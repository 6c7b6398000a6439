//! K-means grouping of the labeled corpus, with each cluster named after
//! the majority category of its members.

use crate::classify::{categories_of, SparseVec, TfIdf};
use crate::corpus::TrainingDocument;
use crate::error::{Error, Result};
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const MAX_ROUNDS: usize = 100;
const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    pub tfidf: TfIdf,
    /// Dense centroids, `[cluster][term]`.
    pub centroids: Vec<Vec<f64>>,
    pub labels: Vec<String>,
    pub sizes: Vec<usize>,
    pub categories: Vec<String>,
    pub trained_doc_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub clusters: usize,
    pub cluster_sizes: BTreeMap<usize, usize>,
    pub cluster_labels: BTreeMap<usize, String>,
    pub total_documents: usize,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub cluster_id: usize,
    pub cluster_label: String,
    pub distance_to_centroid: f64,
    pub text_length: usize,
    pub processed_text_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub is_trained: bool,
    pub clusters: usize,
    pub total_documents: usize,
    pub categories: Vec<String>,
    pub cluster_labels: BTreeMap<usize, String>,
}

impl ClusterInfo {
    pub fn untrained() -> Self {
        Self { is_trained: false, clusters: 0, total_documents: 0, categories: Vec::new(), cluster_labels: BTreeMap::new() }
    }
}

fn densify(x: &SparseVec, dim: usize) -> Vec<f64> {
    let mut v = vec![0.0; dim];
    for (i, value) in x {
        v[*i] = *value;
    }
    v
}

fn sq_distance(x: &SparseVec, centroid: &[f64], centroid_sq_norm: f64) -> f64 {
    // |x - c|^2 = |x|^2 - 2 x·c + |c|^2
    let x_sq: f64 = x.iter().map(|(_, v)| v * v).sum();
    let dot: f64 = x.iter().map(|(i, v)| v * centroid[*i]).sum();
    (x_sq - 2.0 * dot + centroid_sq_norm).max(0.0)
}

fn sq_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

fn nearest(x: &SparseVec, centroids: &[Vec<f64>], norms: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, (centroid, norm)) in centroids.iter().zip(norms).enumerate() {
        let d = sq_distance(x, centroid, *norm);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

impl ClusterModel {
    /// Cluster `documents` into `max(2, categories)` groups (capped at the document count).
    pub fn train(documents: &[TrainingDocument]) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let categories = categories_of(documents);
        let tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(&d.text)).collect();
        let tfidf = TfIdf::fit(&tokens);
        let dim = tfidf.vocabulary.len();
        let features: Vec<SparseVec> = tokens.iter().map(|t| tfidf.transform_tokens(t)).collect();
        let k = categories.len().max(2).min(documents.len());

        // farthest-first seeding from the first document
        let mut centroids = vec![densify(&features[0], dim)];
        while centroids.len() < k {
            let norms: Vec<f64> = centroids.iter().map(|c| sq_norm(c)).collect();
            let mut far = (0, -1.0);
            for (i, x) in features.iter().enumerate() {
                let (_, d) = nearest(x, &centroids, &norms);
                if d > far.1 {
                    far = (i, d);
                }
            }
            centroids.push(densify(&features[far.0], dim));
        }

        let mut assignments = vec![usize::MAX; features.len()];
        for round in 0..MAX_ROUNDS {
            let norms: Vec<f64> = centroids.iter().map(|c| sq_norm(c)).collect();
            let mut changed = false;
            for (i, x) in features.iter().enumerate() {
                let (c, _) = nearest(x, &centroids, &norms);
                if assignments[i] != c {
                    assignments[i] = c;
                    changed = true;
                }
            }
            if !changed {
                tracing::debug!(round, "k-means converged");
                break;
            }
            let mut sums = vec![vec![0.0; dim]; k];
            let mut counts = vec![0usize; k];
            for (x, &c) in features.iter().zip(&assignments) {
                counts[c] += 1;
                for (j, value) in x {
                    sums[c][*j] += value;
                }
            }
            for c in 0..k {
                // an empty cluster keeps its previous centroid
                if counts[c] > 0 {
                    centroids[c] = sums[c].iter().map(|s| s / counts[c] as f64).collect();
                }
            }
        }

        let mut sizes = vec![0usize; k];
        let mut votes: Vec<HashMap<&str, usize>> = vec![HashMap::new(); k];
        for (doc, &c) in documents.iter().zip(&assignments) {
            sizes[c] += 1;
            *votes[c].entry(doc.category.as_str()).or_insert(0) += 1;
        }
        let labels = votes
            .iter()
            .map(|v| {
                v.iter()
                    .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                    .map(|(cat, _)| cat.to_string())
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
            })
            .collect();

        tracing::info!(documents = documents.len(), clusters = k, "trained cluster model");
        Ok(Self { tfidf, centroids, labels, sizes, categories, trained_doc_count: documents.len() })
    }

    pub fn assign(&self, text: &str) -> Result<ClusterAssignment> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        let tokens = tokenize(text);
        let x = self.tfidf.transform_tokens(&tokens);
        let norms: Vec<f64> = self.centroids.iter().map(|c| sq_norm(c)).collect();
        let (cluster_id, d) = nearest(&x, &self.centroids, &norms);
        Ok(ClusterAssignment {
            cluster_id,
            cluster_label: self.labels[cluster_id].clone(),
            distance_to_centroid: d.sqrt(),
            text_length: text.chars().count(),
            processed_text_length: tokens.join(" ").chars().count(),
        })
    }

    fn cluster_labels(&self) -> BTreeMap<usize, String> {
        self.labels.iter().cloned().enumerate().collect()
    }

    pub fn report(&self) -> ClusterReport {
        ClusterReport {
            clusters: self.centroids.len(),
            cluster_sizes: self.sizes.iter().copied().enumerate().collect(),
            cluster_labels: self.cluster_labels(),
            total_documents: self.trained_doc_count,
            categories: self.categories.clone(),
        }
    }

    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            is_trained: true,
            clusters: self.centroids.len(),
            total_documents: self.trained_doc_count,
            categories: self.categories.clone(),
            cluster_labels: self.cluster_labels(),
        }
    }
}
