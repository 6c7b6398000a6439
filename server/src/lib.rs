use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, response::{IntoResponse, Response}, routing::{get, post}, Json, Router};
use scholar_core::corpus::{load_publications, load_training_documents};
use scholar_core::persist::{load_index, load_model, save_index, save_model, DataPaths};
use scholar_core::{
    ClassificationResult, ClusterAssignment, ClusterInfo, ClusterReport, Error, Lookup, ModelInfo, ModelType,
    Registry, SearchCache, SearchParams, SearchResponse, SortBy, TrainingReport,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Everything the service needs at startup, with defaults matching the CLI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
    pub cache_max: usize,
    pub request_timeout: Duration,
    pub train_on_start: bool,
    pub admin_token: Option<String>,
    /// Comma-separated list; `None` allows any origin.
    pub cors_allow_origin: Option<String>,
}

impl ServerConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            cache_ttl: Duration::from_secs(60),
            cache_max: 128,
            request_timeout: Duration::from_secs(30),
            train_on_start: true,
            admin_token: None,
            cors_allow_origin: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub data_dir: Arc<PathBuf>,
    pub admin_token: Option<Arc<str>>,
}

// --- errors ---

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, kind: "internal", message: message.into() }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self { status: StatusCode::UNAUTHORIZED, kind: "unauthorized", message: message.into() }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::UnknownModelType(_) | Error::EmptyText => StatusCode::BAD_REQUEST,
            Error::IndexUnavailable | Error::ModelNotTrained(_) | Error::ClusterModelNotTrained | Error::EmptyCorpus => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::TrainingInProgress(_) | Error::IndexBuildInProgress | Error::ClusteringInProgress => StatusCode::CONFLICT,
            Error::Io(_) | Error::Json(_) | Error::Csv(_) | Error::Bincode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, kind: err.kind(), message: err.to_string() }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "background task failed");
        ApiError::internal("background task failed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(kind = self.kind, error = %self.message, "request failed");
        }
        let body = serde_json::json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// --- startup ---

/// Populate a registry from the data directory: persisted index or a fresh
/// build from the publications file, saved classifiers or fresh training.
pub fn load_state(config: &ServerConfig) -> Result<AppState> {
    let registry = Arc::new(Registry::with_cache(SearchCache::new(config.cache_ttl, config.cache_max)));
    let paths = DataPaths::new(&config.data_dir);

    if paths.has_index() {
        let index = load_index(&paths)?;
        registry.publish_index(index);
    } else {
        match load_publications(&config.data_dir) {
            Ok(publications) => {
                registry.rebuild_index(publications)?;
            }
            Err(err) => tracing::warn!(error = %err, "no publications loaded, search unavailable until rebuild"),
        }
    }

    for model_type in ModelType::ALL {
        match load_model(&paths, model_type) {
            Ok(Some(model)) => registry.publish_classifier(model),
            Ok(None) => {}
            Err(err) => tracing::warn!(%model_type, error = %err, "ignoring unreadable saved model"),
        }
    }

    if config.train_on_start {
        let documents = load_training_documents(&config.data_dir)?;
        for model_type in ModelType::ALL {
            if registry.model_info(model_type).is_trained {
                continue;
            }
            match registry.train(model_type, &documents) {
                Ok((model, report)) => {
                    tracing::info!(%model_type, accuracy = report.training_accuracy, "trained at startup");
                    if let Err(err) = save_model(&paths, &model) {
                        tracing::warn!(%model_type, error = %err, "could not persist model");
                    }
                }
                Err(err) => tracing::warn!(%model_type, error = %err, "startup training failed"),
            }
        }
        if let Err(err) = registry.train_clusters(&documents) {
            tracing::warn!(error = %err, "cluster training failed");
        }
    }

    Ok(AppState {
        registry,
        data_dir: Arc::new(config.data_dir.clone()),
        admin_token: config.admin_token.as_deref().map(Arc::from),
    })
}

pub fn build_app(config: ServerConfig) -> Result<Router> {
    let state = load_state(&config)?;
    Ok(router(state, &config))
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let cors = match &config.cors_allow_origin {
        Some(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/classify", post(classify_handler))
        .route("/model-info", get(model_info_handler))
        .route("/train-models", post(train_models_handler))
        .route("/cluster", post(cluster_handler))
        .route("/cluster-model-info", get(cluster_model_info_handler))
        .route("/train-cluster-model", post(train_cluster_model_handler))
        .route("/index/rebuild", post(index_rebuild_handler))
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

// --- search ---

/// Query string as sent by clients. Everything is optional text so that
/// malformed numbers fall back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct RawSearchParams {
    pub query: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
    pub author: Option<String>,
    pub year_from: Option<String>,
    pub year_to: Option<String>,
    pub sort: Option<String>,
}

fn parse_num<T: std::str::FromStr>(raw: &Option<String>) -> Option<T> {
    raw.as_deref().and_then(|s| s.trim().parse().ok())
}

impl RawSearchParams {
    pub fn into_params(self) -> SearchParams {
        SearchParams::new(self.query.clone().unwrap_or_default())
            .with_author(self.author.as_deref())
            .with_years(parse_num(&self.year_from), parse_num(&self.year_to))
            .with_sort(self.sort.as_deref().map(SortBy::parse_lenient).unwrap_or_default())
            .with_page(parse_num(&self.page).unwrap_or(1))
            .with_size(parse_num(&self.size).unwrap_or(scholar_core::search::DEFAULT_PAGE_SIZE as i64))
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(raw): Query<RawSearchParams>) -> ApiResult<SearchResponse> {
    let params = raw.into_params();
    let (response, lookup) = tokio::task::spawn_blocking(move || state.registry.search(&params)).await??;
    tracing::debug!(hit = lookup == Lookup::Hit, total = response.total, "search served");
    Ok(Json(SearchResponse::clone(&response)))
}

// --- classification ---

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub model_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModelTypeParams {
    pub model_type: Option<String>,
}

fn model_type_or_default(raw: Option<&str>) -> std::result::Result<ModelType, ApiError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(s.parse()?),
        _ => Ok(ModelType::NaiveBayes),
    }
}

pub async fn classify_handler(State(state): State<AppState>, Json(req): Json<ClassifyRequest>) -> ApiResult<ClassificationResult> {
    let model_type = model_type_or_default(req.model_type.as_deref())?;
    Ok(Json(state.registry.classify(model_type, &req.text)?))
}

pub async fn model_info_handler(State(state): State<AppState>, Query(params): Query<ModelTypeParams>) -> ApiResult<ModelInfo> {
    let model_type = model_type_or_default(params.model_type.as_deref())?;
    Ok(Json(state.registry.model_info(model_type)))
}

#[derive(Debug, Serialize)]
pub struct TrainResponse<T> {
    pub message: &'static str,
    pub results: T,
}

pub async fn train_models_handler(State(state): State<AppState>) -> ApiResult<TrainResponse<BTreeMap<ModelType, TrainingReport>>> {
    let results = tokio::task::spawn_blocking(move || -> scholar_core::Result<_> {
        let documents = load_training_documents(&state.data_dir)?;
        let paths = DataPaths::new(state.data_dir.as_path());
        let mut results = BTreeMap::new();
        for (model, report) in state.registry.train_all(&documents)? {
            if let Err(err) = save_model(&paths, &model) {
                tracing::warn!(model_type = %model.model_type(), error = %err, "could not persist model");
            }
            results.insert(model.model_type(), report);
        }
        Ok(results)
    })
    .await??;
    Ok(Json(TrainResponse { message: "Models trained successfully", results }))
}

// --- clustering ---

#[derive(Debug, Deserialize)]
pub struct ClusterRequest {
    #[serde(default)]
    pub text: String,
}

pub async fn cluster_handler(State(state): State<AppState>, Json(req): Json<ClusterRequest>) -> ApiResult<ClusterAssignment> {
    Ok(Json(state.registry.assign_cluster(&req.text)?))
}

pub async fn cluster_model_info_handler(State(state): State<AppState>) -> Json<ClusterInfo> {
    Json(state.registry.cluster_info())
}

pub async fn train_cluster_model_handler(State(state): State<AppState>) -> ApiResult<TrainResponse<ClusterReport>> {
    let results = tokio::task::spawn_blocking(move || -> scholar_core::Result<_> {
        let documents = load_training_documents(&state.data_dir)?;
        state.registry.train_clusters(&documents)
    })
    .await??;
    Ok(Json(TrainResponse { message: "Cluster model trained successfully", results }))
}

// --- admin / status ---

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let publications = state.registry.index().map(|idx| idx.num_docs).unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "publications": publications,
        "cache_entries": state.registry.cache().len(),
        "data_dir": state.data_dir.display().to_string(),
    }))
}

async fn index_rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<serde_json::Value> {
    authorize(&state, &headers)?;
    let index = tokio::task::spawn_blocking(move || -> scholar_core::Result<_> {
        let publications = load_publications(&state.data_dir)?;
        let index = state.registry.rebuild_index(publications)?;
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into());
        if let Err(err) = save_index(&DataPaths::new(state.data_dir.as_path()), &index, created_at) {
            tracing::warn!(error = %err, "could not persist rebuilt index");
        }
        Ok(index)
    })
    .await??;
    Ok(Json(serde_json::json!({ "num_docs": index.num_docs, "num_terms": index.num_terms() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> std::result::Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::unauthorized("ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required.as_ref() {
        Ok(())
    } else {
        Err(ApiError::unauthorized("invalid admin token"))
    }
}
