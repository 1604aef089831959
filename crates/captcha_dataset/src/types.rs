//! Core types and error definitions for captcha_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {msg}")]
    Download { url: String, msg: String },
    #[error("bad archive from {url}: {msg}")]
    Archive { url: String, msg: String },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("label {label:?} contains {symbol:?} which is not in the vocabulary")]
    UnknownSymbol { label: String, symbol: char },
    #[error("{0}")]
    Other(String),
}

/// One corpus entry: the image path and the ground-truth text it encodes.
/// The label is the file name minus its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image: PathBuf,
    pub label: String,
}

/// Counters from a corpus scan, reported once after listing the directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Files accepted as labeled samples.
    pub accepted: usize,
    /// Directory entries that were not regular files.
    pub skipped_non_files: usize,
    /// Files whose name yielded no usable label (empty or non-UTF-8 stem).
    pub skipped_unnamed: usize,
}
