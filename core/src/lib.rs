//! Retrieval and classification backend for a corpus of academic publications.
//!
//! The pieces, leaves first: [`tokenizer`], [`index`] (inverted index),
//! [`search`] (ranker), [`cache`] (search cache), [`classify`] and
//! [`cluster`] (text models), and [`registry`], which owns the live
//! snapshots of all of them.

pub mod cache;
pub mod classify;
pub mod cluster;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod registry;
pub mod search;
pub mod tokenizer;

pub use cache::{Lookup, SearchCache};
pub use classify::{ClassificationResult, ClassifierModel, ModelInfo, ModelType, TrainingReport};
pub use cluster::{ClusterAssignment, ClusterInfo, ClusterModel, ClusterReport};
pub use corpus::TrainingDocument;
pub use error::{Error, Result};
pub use index::{Author, DocId, InvertedIndex, Posting, Publication, TermId};
pub use registry::Registry;
pub use search::{SearchKey, SearchParams, SearchResponse, SearchResult, SortBy};
