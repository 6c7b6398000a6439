use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scholar_core::corpus::{load_publications, read_publications};
use scholar_core::persist::{load_meta, save_index, DataPaths};
use scholar_core::{InvertedIndex, Publication};
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect the publication inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from the publications collection
    Build {
        /// Data directory; the index is written to <data-dir>/index
        #[arg(long, default_value = "./data")]
        data_dir: String,
        /// Publications JSON file or a directory of them (default: <data-dir>/publications.json)
        #[arg(long)]
        input: Option<String>,
    },
    /// Print the metadata of a built index
    Inspect {
        #[arg(long, default_value = "./data")]
        data_dir: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { data_dir, input } => build_index(&data_dir, input.as_deref()),
        Commands::Inspect { data_dir } => {
            let meta = load_meta(&DataPaths::new(&data_dir)).context("no index metadata found")?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
    }
}

fn build_index(data_dir: &str, input: Option<&str>) -> Result<()> {
    let data_path = Path::new(data_dir);
    let publications = match input {
        Some(input) => collect_publications(Path::new(input))?,
        None => load_publications(data_path)
            .with_context(|| format!("reading publications from {}", data_path.display()))?,
    };
    tracing::info!(num_docs = publications.len(), "loaded publications");

    let index = InvertedIndex::build(publications);
    tracing::info!(num_docs = index.num_docs, num_terms = index.num_terms(), "ingested documents");

    let paths = DataPaths::new(data_path);
    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    save_index(&paths, &index, created_at)?;

    tracing::info!(output = %paths.index_dir().display(), "index build complete");
    Ok(())
}

fn collect_publications(input_path: &Path) -> Result<Vec<Publication>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(p.to_path_buf());
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input {} does not exist", input_path.display());
    }

    let mut publications = Vec::new();
    for file in files {
        let batch = read_publications(&file).with_context(|| format!("parsing {}", file.display()))?;
        tracing::debug!(file = %file.display(), count = batch.len(), "read publications");
        publications.extend(batch);
    }
    Ok(publications)
}
