//! Loading of the two input collections: publication records (JSON) and
//! labeled training text (CSV).

use crate::error::{Error, Result};
use crate::index::{Author, Publication};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const PUBLICATIONS_FILE: &str = "publications.json";
pub const PUBLICATIONS_FALLBACK_FILE: &str = "publications_links.json";
pub const TRAINING_FILE: &str = "training_documents.csv";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingDocument {
    pub text: String,
    pub category: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAuthor {
    Named { name: String, #[serde(default, alias = "profile_url")] profile: Option<String> },
    Plain(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAuthors {
    Many(Vec<RawAuthor>),
    One(String),
}

/// Publication record as written by the ingestion side. Field shapes vary
/// between crawler versions, so everything is optional here.
#[derive(Deserialize)]
struct RawPublication {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    authors: Option<RawAuthors>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
}

impl From<RawPublication> for Publication {
    fn from(raw: RawPublication) -> Self {
        let authors = match raw.authors {
            Some(RawAuthors::Many(list)) => list
                .into_iter()
                .map(|a| match a {
                    RawAuthor::Named { name, profile } => Author { name: name.trim().to_string(), profile },
                    RawAuthor::Plain(name) => Author { name: name.trim().to_string(), profile: None },
                })
                .collect(),
            Some(RawAuthors::One(name)) => vec![Author { name: name.trim().to_string(), profile: None }],
            None => Vec::new(),
        };
        let published_date = raw.date.filter(|d| !d.is_empty()).or(raw.published_date).unwrap_or_default();
        Publication {
            title: raw.title.unwrap_or_default(),
            link: raw.link.unwrap_or_default(),
            authors: authors.into_iter().filter(|a| !a.name.is_empty()).collect(),
            published_date,
            abstract_text: raw.abstract_text.unwrap_or_default(),
        }
    }
}

/// Parse a JSON array of publication records.
pub fn parse_publications(json: &str) -> Result<Vec<Publication>> {
    let raw: Vec<RawPublication> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(Publication::from).collect())
}

pub fn read_publications(path: &Path) -> Result<Vec<Publication>> {
    let mut buf = String::new();
    BufReader::new(File::open(path)?).read_to_string(&mut buf)?;
    parse_publications(&buf)
}

/// Load `publications.json` from `data_dir`, falling back to `publications_links.json`.
pub fn load_publications(data_dir: &Path) -> Result<Vec<Publication>> {
    let primary = data_dir.join(PUBLICATIONS_FILE);
    match read_publications(&primary) {
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            let fallback = data_dir.join(PUBLICATIONS_FALLBACK_FILE);
            tracing::warn!(primary = %primary.display(), fallback = %fallback.display(), "publications file missing, using fallback");
            read_publications(&fallback)
        }
        other => other,
    }
}

pub fn parse_training_documents<R: Read>(reader: R) -> Result<Vec<TrainingDocument>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut documents = Vec::new();
    for row in rdr.deserialize() {
        let doc: TrainingDocument = row?;
        let category = doc.category.trim();
        if doc.text.trim().is_empty() || category.is_empty() {
            continue;
        }
        documents.push(TrainingDocument { text: doc.text, category: category.to_string() });
    }
    Ok(documents)
}

/// Load `training_documents.csv` from `data_dir`, or the built-in corpus when it is absent.
pub fn load_training_documents(data_dir: &Path) -> Result<Vec<TrainingDocument>> {
    let path = data_dir.join(TRAINING_FILE);
    match File::open(&path) {
        Ok(f) => parse_training_documents(BufReader::new(f)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "training corpus missing, using built-in documents");
            Ok(fallback_training_documents())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn fallback_training_documents() -> Vec<TrainingDocument> {
    let docs: &[(&str, &str)] = &[
        ("Company reports record revenue and higher profit margins.", "business"),
        ("Startup secures new funding round to expand market operations.", "business"),
        ("Stock market volatility impacts investor confidence this quarter.", "business"),
        ("The new film premiere draws large crowds and critical acclaim.", "entertainment"),
        ("Music festival lineup includes award-winning international artists.", "entertainment"),
        ("Streaming series finale boosts subscription numbers worldwide.", "entertainment"),
        ("Researchers discover a new treatment for chronic disease.", "health"),
        ("Hospitals adopt improved surgical protocols to reduce recovery time.", "health"),
        ("Public health study links exercise to lower cardiovascular risk.", "health"),
    ];
    docs.iter().map(|(text, category)| TrainingDocument { text: text.to_string(), category: category.to_string() }).collect()
}
