//! Run configuration persisted for the training and inference stages.

use crate::corpus::{Corpus, Vocabulary};
use crate::types::{DatasetError, DatasetResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "configs.json";

/// Immutable record of everything a later stage needs to reconstruct the exact
/// symbol-index mapping and tensor shapes used at training time. Constructed
/// once with the corpus-derived fields, then passed by reference; saved before
/// any stochastic step so the vocabulary on disk is stable and complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Vocabulary serialized as a string; character position is the index.
    pub vocab: String,
    pub max_text_length: usize,
    pub width: u32,
    pub height: u32,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub train_epochs: usize,
    pub train_workers: usize,
    pub model_path: PathBuf,
}

impl TrainingConfig {
    /// Defaults plus the fields derived from a scanned corpus.
    pub fn for_corpus(corpus: &Corpus, model_path: impl Into<PathBuf>) -> Self {
        Self {
            vocab: corpus.vocab.as_string(),
            max_text_length: corpus.max_text_length,
            width: 200,
            height: 50,
            batch_size: 16,
            learning_rate: 1e-3,
            train_epochs: 1000,
            train_workers: 20,
            model_path: model_path.into(),
        }
    }

    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::from_string(&self.vocab)
    }

    pub fn config_path(&self) -> PathBuf {
        self.model_path.join(CONFIG_FILE)
    }

    pub fn save(&self) -> DatasetResult<()> {
        let path = self.config_path();
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| DatasetError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let data =
            serde_json::to_vec_pretty(self).map_err(|e| DatasetError::Other(e.to_string()))?;
        fs::write(&path, data).map_err(|e| DatasetError::Io { path, source: e })
    }

    pub fn load(path: &Path) -> DatasetResult<Self> {
        let raw = fs::read(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_slice(&raw).map_err(|e| DatasetError::Json {
            path: path.to_path_buf(),
            source: e,
        })
    }
}
