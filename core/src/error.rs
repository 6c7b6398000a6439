use crate::classify::ModelType;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("search index is not available yet")]
    IndexUnavailable,

    #[error("an index rebuild is already in progress")]
    IndexBuildInProgress,

    #[error("{0} model has not been trained")]
    ModelNotTrained(ModelType),

    #[error("training of the {0} model is already in progress")]
    TrainingInProgress(ModelType),

    #[error("cluster model has not been trained")]
    ClusterModelNotTrained,

    #[error("cluster model training is already in progress")]
    ClusteringInProgress,

    #[error("unknown model type '{0}', expected naive_bayes or logistic_regression")]
    UnknownModelType(String),

    #[error("text is required")]
    EmptyText,

    #[error("training corpus is empty")]
    EmptyCorpus,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl Error {
    /// Stable identifier clients can branch on.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::IndexUnavailable => "index_unavailable",
            Error::IndexBuildInProgress => "index_build_in_progress",
            Error::ModelNotTrained(_) => "model_not_trained",
            Error::TrainingInProgress(_) => "training_in_progress",
            Error::ClusterModelNotTrained => "cluster_model_not_trained",
            Error::ClusteringInProgress => "clustering_in_progress",
            Error::UnknownModelType(_) => "unknown_model_type",
            Error::EmptyText => "empty_text",
            Error::EmptyCorpus => "empty_corpus",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Csv(_) => "csv",
            Error::Bincode(_) => "encoding",
        }
    }
}
