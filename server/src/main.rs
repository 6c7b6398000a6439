use anyhow::Result;
use axum::Router;
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use server::{build_app, ServerConfig};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "server", about = "Publication search and text classification service")]
struct Args {
    /// Directory holding publications.json, training_documents.csv, index/ and models/
    #[arg(long, env = "DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,
    /// Host to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Seconds a cached search response stays fresh
    #[arg(long, env = "SEARCH_CACHE_TTL", default_value_t = 60)]
    cache_ttl_secs: u64,
    /// Maximum number of cached search responses
    #[arg(long, env = "SEARCH_CACHE_MAX", default_value_t = 128)]
    cache_max: usize,
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,
    /// Train classifiers and clusters at startup when no saved model exists
    #[arg(long, env = "TRAIN_ON_START", default_value_t = true, action = ArgAction::Set)]
    train_on_start: bool,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| match std::env::var("LOG_LEVEL") {
            Ok(level) if !level.trim().is_empty() => EnvFilter::try_new(level),
            _ => Ok(EnvFilter::new("info")),
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(env_filter()).init();
    let args = Args::parse();

    let config = ServerConfig {
        cache_ttl: Duration::from_secs(args.cache_ttl_secs),
        cache_max: args.cache_max,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        train_on_start: args.train_on_start,
        admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
        cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        ..ServerConfig::new(args.data_dir)
    };
    let app: Router = tokio::task::spawn_blocking(move || build_app(config)).await??;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
