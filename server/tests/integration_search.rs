use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, ServerConfig};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const PUBLICATIONS: &str = r#"[
  {
    "title": "Deep learning for medical imaging",
    "link": "https://example.org/pub/1",
    "authors": [{"name": "Alice Smith", "profile": "https://example.org/alice"}],
    "published_date": "2021-05-01",
    "abstract": "Convolutional networks detect tumours."
  },
  {
    "title": "Econometrics of housing markets",
    "link": "https://example.org/pub/2",
    "authors": ["Bob Jones"],
    "published_date": "15 Mar 2019",
    "abstract": "Housing prices respond to interest rates."
  },
  {
    "title": "Learning to rank documents",
    "link": "https://example.org/pub/3",
    "authors": [{"name": "Alice Smith"}],
    "date": "2023",
    "abstract": "Ranking with deep models."
  }
]"#;

const TRAINING: &str = "text,category
Interest rates and stock market earnings reports,business
Quarterly revenue growth for the retail company,business
Investors react to bank profit forecasts,business
Hospital trial of a new vaccine against influenza,health
Doctors recommend exercise to reduce heart disease,health
Clinical study of patients with chronic illness,health
";

fn write_data(dir: &Path) {
    fs::write(dir.join("publications.json"), PUBLICATIONS).unwrap();
    fs::write(dir.join("training_documents.csv"), TRAINING).unwrap();
}

fn app_with(dir: &Path, admin_token: Option<&str>) -> Router {
    let config = ServerConfig { admin_token: admin_token.map(String::from), ..ServerConfig::new(dir) };
    build_app(config).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = tower::ServiceExt::oneshot(app, req).await.unwrap();
    let status = resp.status();
    let body: Bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), None);

    let (status, json) = get(app, "/search?query=deep%20learning").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results[0]["title"], "Deep learning for medical imaging");
    assert_eq!(results[1]["title"], "Learning to rank documents");
    assert!(results[0]["score"].as_f64().unwrap() >= results[1]["score"].as_f64().unwrap());
    assert_eq!(results[0]["authors"][0]["name"], "Alice Smith");
    assert_eq!(results[0]["abstract"], "Convolutional networks detect tumours.");
}

#[tokio::test]
async fn search_paginates_and_filters() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), None);

    let (status, json) = get(app.clone(), "/search?query=&size=2&page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 3);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["results"].as_array().unwrap().len(), 1);

    let (_, json) = get(app.clone(), "/search?author=alice").await;
    assert_eq!(json["total"], 2);

    let (_, json) = get(app.clone(), "/search?year_from=2020").await;
    assert_eq!(json["total"], 2);

    // malformed numbers fall back to defaults
    let (status, json) = get(app, "/search?query=housing&page=abc&size=-5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["page"], 1);
    assert_eq!(json["size"], 1);
    assert_eq!(json["results"][0]["title"], "Econometrics of housing markets");
}

#[tokio::test]
async fn search_without_publications_is_unavailable() {
    let dir = tempdir().unwrap();
    let app = app_with(dir.path(), None);

    let (status, json) = get(app, "/search?query=anything").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["kind"], "index_unavailable");
}

#[tokio::test]
async fn classify_uses_trained_models() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), None);

    let (status, json) = post_json(app.clone(), "/classify", serde_json::json!({ "text": "new vaccine trial for patients" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["predicted_category"], "health");
    assert_eq!(json["model_used"], "naive_bayes");
    let total: f64 = json["probabilities"].as_object().unwrap().values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-6);

    let (status, json) = post_json(
        app.clone(),
        "/classify",
        serde_json::json!({ "text": "bank profit and stock market earnings", "model_type": "logistic_regression" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["predicted_category"], "business");
    assert_eq!(json["model_used"], "logistic_regression");

    let (status, json) = post_json(app.clone(), "/classify", serde_json::json!({ "text": "x", "model_type": "svm" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "unknown_model_type");

    let (status, json) = post_json(app, "/classify", serde_json::json!({ "text": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "empty_text");
}

#[tokio::test]
async fn model_info_and_retraining() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), None);

    let (status, json) = get(app.clone(), "/model-info?model_type=logistic_regression").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_trained"], true);
    assert_eq!(json["total_documents"], 6);
    assert_eq!(json["categories"], serde_json::json!(["business", "health"]));

    let (status, json) = post_json(app, "/train-models", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"]["naive_bayes"]["training_size"], 6);
    assert_eq!(json["results"]["logistic_regression"]["training_size"], 6);
    assert!(dir.path().join("models").join("naive_bayes.bin").is_file());
}

#[tokio::test]
async fn models_are_untrained_when_startup_training_is_off() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let config = ServerConfig { train_on_start: false, ..ServerConfig::new(dir.path()) };
    let app = build_app(config).unwrap();

    let (_, json) = get(app.clone(), "/model-info").await;
    assert_eq!(json["is_trained"], false);
    assert_eq!(json["total_documents"], 0);

    let (status, json) = post_json(app, "/classify", serde_json::json!({ "text": "stock market" })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["kind"], "model_not_trained");
}

#[tokio::test]
async fn cluster_endpoints() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), None);

    let (status, json) = get(app.clone(), "/cluster-model-info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_trained"], true);
    assert_eq!(json["clusters"], 2);

    let (status, json) = post_json(app.clone(), "/cluster", serde_json::json!({ "text": "vaccine for influenza patients" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["cluster_id"].as_u64().unwrap() < 2);
    assert!(json["cluster_label"].is_string());

    let (status, json) = post_json(app, "/train-cluster-model", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"]["total_documents"], 6);
}

#[tokio::test]
async fn index_rebuild_requires_admin_token() {
    let dir = tempdir().unwrap();
    write_data(dir.path());

    let app = app_with(dir.path(), None);
    let (status, _) = send(app, Request::post("/index/rebuild").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let app = app_with(dir.path(), Some("secret"));
    let req = Request::post("/index/rebuild").header("X-ADMIN-TOKEN", "wrong").body(Body::empty()).unwrap();
    let (status, _) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::post("/index/rebuild").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 3);
    assert!(dir.path().join("index").join("index.bin").is_file());
}

#[tokio::test]
async fn health_reports_loaded_publications() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), None);

    let (status, json) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["publications"], 3);

    let (status, json) = get(app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn rebuild_invalidates_cached_searches() {
    let dir = tempdir().unwrap();
    write_data(dir.path());
    let app = app_with(dir.path(), Some("secret"));

    let (_, json) = get(app.clone(), "/search?query=housing").await;
    assert_eq!(json["total"], 1);

    let mut publications: Value = serde_json::from_str(PUBLICATIONS).unwrap();
    publications.as_array_mut().unwrap().push(serde_json::json!({
        "title": "Housing supply and zoning",
        "link": "https://example.org/pub/4",
        "authors": ["Carol White"],
        "published_date": "2022",
        "abstract": "Zoning limits new housing."
    }));
    fs::write(dir.path().join("publications.json"), publications.to_string()).unwrap();

    let req = Request::post("/index/rebuild").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, _) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = get(app, "/search?query=housing").await;
    assert_eq!(json["total"], 2);
}
