//! Process-wide holder for the live index and trained models.
//!
//! Every slot holds an immutable snapshot behind an `Arc`. Rebuilding or
//! retraining produces a complete new value off to the side and publishes
//! it with a single pointer swap, so readers only ever see finished
//! structures. At most one writer per slot runs at a time; a second one
//! is refused instead of queued.
//!
//! Search responses are cached per index snapshot: every published index
//! gets a new generation number, which is part of the cache key, and the
//! cache is emptied on publish.

use crate::cache::{Lookup, SearchCache};
use crate::classify::{ClassificationResult, ClassifierModel, ModelInfo, ModelType, TrainingReport};
use crate::cluster::{ClusterAssignment, ClusterInfo, ClusterModel, ClusterReport};
use crate::corpus::TrainingDocument;
use crate::error::{Error, Result};
use crate::index::{InvertedIndex, Publication};
use crate::search::{search, SearchParams, SearchResponse};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub struct Slot<T> {
    current: RwLock<Option<Arc<T>>>,
    writing: AtomicBool,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self { current: RwLock::new(None), writing: AtomicBool::new(false) }
    }
}

/// Held while a writer owns a slot; releases it on drop, including on panic.
pub struct WriteGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl<T> Slot<T> {
    pub fn load(&self) -> Option<Arc<T>> {
        self.current.read().clone()
    }

    pub fn publish(&self, value: Arc<T>) -> Option<Arc<T>> {
        self.current.write().replace(value)
    }

    pub fn try_begin_write(&self) -> Option<WriteGuard<'_>> {
        self.writing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| WriteGuard { flag: &self.writing })
    }

    pub fn is_writing(&self) -> bool {
        self.writing.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct Registry {
    index: Slot<InvertedIndex>,
    generation: AtomicU64,
    cache: SearchCache,
    naive_bayes: Slot<ClassifierModel>,
    logistic_regression: Slot<ClassifierModel>,
    clusters: Slot<ClusterModel>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    pub fn with_cache(cache: SearchCache) -> Self {
        Self { cache, ..Self::default() }
    }

    pub fn cache(&self) -> &SearchCache { &self.cache }

    /// Number of the live index snapshot; bumped by every publish.
    pub fn index_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // --- index ---

    pub fn index(&self) -> Result<Arc<InvertedIndex>> {
        self.index.load().ok_or(Error::IndexUnavailable)
    }

    pub fn publish_index(&self, index: InvertedIndex) -> Arc<InvertedIndex> {
        let index = Arc::new(index);
        self.index.publish(index.clone());
        // bumped after the swap, so a response keyed with the new number never
        // comes from the old snapshot
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cache.clear();
        tracing::info!(generation, num_docs = index.num_docs, num_terms = index.num_terms(), "published index snapshot");
        index
    }

    /// Build a new index from `publications` and swap it in.
    pub fn rebuild_index(&self, publications: Vec<Publication>) -> Result<Arc<InvertedIndex>> {
        let _guard = self.index.try_begin_write().ok_or(Error::IndexBuildInProgress)?;
        Ok(self.publish_index(InvertedIndex::build(publications)))
    }

    /// Rank `params` against the live index, through the search cache.
    pub fn search(&self, params: &SearchParams) -> Result<(Arc<SearchResponse>, Lookup)> {
        let key = params.cache_key(self.index_generation());
        self.cache.get_or_compute(&key, || {
            let index = self.index()?;
            Ok(search(&index, params))
        })
    }

    // --- classifiers ---

    fn classifier_slot(&self, model_type: ModelType) -> &Slot<ClassifierModel> {
        match model_type {
            ModelType::NaiveBayes => &self.naive_bayes,
            ModelType::LogisticRegression => &self.logistic_regression,
        }
    }

    pub fn classifier(&self, model_type: ModelType) -> Result<Arc<ClassifierModel>> {
        self.classifier_slot(model_type).load().ok_or(Error::ModelNotTrained(model_type))
    }

    pub fn publish_classifier(&self, model: ClassifierModel) {
        let model_type = model.model_type();
        self.classifier_slot(model_type).publish(Arc::new(model));
        tracing::info!(%model_type, "published classifier");
    }

    pub fn train(&self, model_type: ModelType, documents: &[TrainingDocument]) -> Result<(Arc<ClassifierModel>, TrainingReport)> {
        let slot = self.classifier_slot(model_type);
        let _guard = slot.try_begin_write().ok_or(Error::TrainingInProgress(model_type))?;
        tracing::info!(%model_type, documents = documents.len(), "training classifier");
        let model = ClassifierModel::train(model_type, documents)?;
        let report = model.report(documents);
        let model = Arc::new(model);
        slot.publish(model.clone());
        Ok((model, report))
    }

    /// Train every model type on `documents` and publish them together.
    ///
    /// All write slots are claimed before any training starts, and nothing is
    /// published unless every model trained, so a failure leaves the previous
    /// models in place.
    pub fn train_all(&self, documents: &[TrainingDocument]) -> Result<Vec<(Arc<ClassifierModel>, TrainingReport)>> {
        let _guards = ModelType::ALL
            .iter()
            .map(|mt| self.classifier_slot(*mt).try_begin_write().ok_or(Error::TrainingInProgress(*mt)))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(documents = documents.len(), "training all classifiers");
        let trained = ModelType::ALL
            .iter()
            .map(|mt| {
                let model = ClassifierModel::train(*mt, documents)?;
                let report = model.report(documents);
                Ok((Arc::new(model), report))
            })
            .collect::<Result<Vec<_>>>()?;
        for (model, _) in &trained {
            self.classifier_slot(model.model_type()).publish(model.clone());
        }
        Ok(trained)
    }

    pub fn classify(&self, model_type: ModelType, text: &str) -> Result<ClassificationResult> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        self.classifier(model_type)?.predict(text)
    }

    pub fn model_info(&self, model_type: ModelType) -> ModelInfo {
        self.classifier_slot(model_type)
            .load()
            .map(|m| m.info())
            .unwrap_or_else(|| ModelInfo::untrained(model_type))
    }

    pub fn is_training(&self, model_type: ModelType) -> bool {
        self.classifier_slot(model_type).is_writing()
    }

    // --- clustering ---

    pub fn train_clusters(&self, documents: &[TrainingDocument]) -> Result<ClusterReport> {
        let _guard = self.clusters.try_begin_write().ok_or(Error::ClusteringInProgress)?;
        let model = ClusterModel::train(documents)?;
        let report = model.report();
        self.clusters.publish(Arc::new(model));
        Ok(report)
    }

    pub fn assign_cluster(&self, text: &str) -> Result<ClusterAssignment> {
        if text.trim().is_empty() {
            return Err(Error::EmptyText);
        }
        self.clusters.load().ok_or(Error::ClusterModelNotTrained)?.assign(text)
    }

    pub fn cluster_info(&self) -> ClusterInfo {
        self.clusters.load().map(|m| m.info()).unwrap_or_else(ClusterInfo::untrained)
    }
}
