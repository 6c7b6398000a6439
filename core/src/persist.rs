use crate::classify::{ClassifierModel, ModelType};
use crate::error::Result;
use crate::index::InvertedIndex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, rename, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

/// On-disk layout under the data directory.
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index_dir(&self) -> PathBuf { self.root.join("index") }
    fn index(&self) -> PathBuf { self.index_dir().join("index.bin") }
    fn meta(&self) -> PathBuf { self.index_dir().join("meta.json") }
    fn models_dir(&self) -> PathBuf { self.root.join("models") }
    fn model(&self, model_type: ModelType) -> PathBuf { self.models_dir().join(format!("{model_type}.bin")) }

    pub fn has_index(&self) -> bool { self.index().is_file() }
}

// Written to a temp file and renamed into place.
fn write_bincode<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut f = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut f, value)?;
        f.flush()?;
    }
    rename(&tmp, path)?;
    Ok(())
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(f)?)
}

pub fn save_index(paths: &DataPaths, index: &InvertedIndex, created_at: String) -> Result<()> {
    write_bincode(&paths.index(), index)?;
    let meta = MetaFile { num_docs: index.num_docs, num_terms: index.num_terms(), created_at, version: FORMAT_VERSION };
    save_meta(paths, &meta)
}

pub fn load_index(paths: &DataPaths) -> Result<InvertedIndex> {
    read_bincode(&paths.index())
}

pub fn save_meta(paths: &DataPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(paths.index_dir())?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &DataPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

pub fn save_model(paths: &DataPaths, model: &ClassifierModel) -> Result<()> {
    write_bincode(&paths.model(model.model_type()), model)
}

/// Previously saved model of `model_type`, or `None` if there is none on disk.
pub fn load_model(paths: &DataPaths, model_type: ModelType) -> Result<Option<ClassifierModel>> {
    let path = paths.model(model_type);
    if !path.is_file() {
        return Ok(None);
    }
    read_bincode(&path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::fallback_training_documents;
    use crate::index::publication;
    use crate::search::{search, SearchParams};

    #[test]
    fn index_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        assert!(!paths.has_index());
        let index = InvertedIndex::build(vec![publication("graph theory", ""), publication("number theory", "")]);
        save_index(&paths, &index, "2024-01-01T00:00:00Z".into()).unwrap();
        assert!(paths.has_index());

        let loaded = load_index(&paths).unwrap();
        let params = SearchParams::new("graph");
        assert_eq!(search(&index, &params), search(&loaded, &params));
        let meta = load_meta(&paths).unwrap();
        assert_eq!(meta.num_docs, 2);
        assert_eq!(meta.version, FORMAT_VERSION);
    }

    #[test]
    fn models_are_saved_per_type() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        assert!(load_model(&paths, ModelType::NaiveBayes).unwrap().is_none());
        let model = ClassifierModel::train(ModelType::NaiveBayes, &fallback_training_documents()).unwrap();
        save_model(&paths, &model).unwrap();
        let loaded = load_model(&paths, ModelType::NaiveBayes).unwrap().unwrap();
        assert_eq!(loaded.predict("stock market").unwrap(), model.predict("stock market").unwrap());
        assert!(load_model(&paths, ModelType::LogisticRegression).unwrap().is_none());
    }
}
