//! Corpus scanning and label/vocabulary derivation.
//!
//! The corpus is a flat directory of images whose file name (minus extension)
//! *is* the label. Scanning materializes the full sample list sorted by file
//! name, so downstream split boundaries do not depend on filesystem listing
//! order.

use crate::types::{DatasetError, DatasetResult, Sample, ScanSummary};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// The symbol vocabulary: distinct characters across all labels, sorted so
/// index assignment is stable across runs and processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    chars: Vec<char>,
}

impl Vocabulary {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let set: BTreeSet<char> = labels.into_iter().flat_map(|l| l.chars()).collect();
        Self {
            chars: set.into_iter().collect(),
        }
    }

    /// Rebuild from the serialized form written to the run configuration.
    /// Character order in the string is the index assignment.
    pub fn from_string(vocab: &str) -> Self {
        Self {
            chars: vocab.chars().collect(),
        }
    }

    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn index_of(&self, symbol: char) -> Option<u32> {
        self.chars.iter().position(|c| *c == symbol).map(|i| i as u32)
    }

    pub fn char_at(&self, index: u32) -> Option<char> {
        self.chars.get(index as usize).copied()
    }

    /// Reserved padding index, one past the last real symbol index. Never
    /// collides with `index_of` output.
    pub fn pad_value(&self) -> u32 {
        self.chars.len() as u32
    }

    /// Map a label to its symbol indices. A character outside the vocabulary
    /// is an error (it cannot occur when the vocabulary was derived from the
    /// same label set, but can when loading a stale configuration).
    pub fn encode(&self, label: &str) -> DatasetResult<Vec<u32>> {
        label
            .chars()
            .map(|symbol| {
                self.index_of(symbol).ok_or_else(|| DatasetError::UnknownSymbol {
                    label: label.to_string(),
                    symbol,
                })
            })
            .collect()
    }
}

/// A scanned corpus: sorted samples plus the derived vocabulary and the
/// longest label length.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub samples: Vec<Sample>,
    pub vocab: Vocabulary,
    pub max_text_length: usize,
    pub summary: ScanSummary,
}

/// List the corpus directory, deriving each sample's label from its file name.
pub fn scan_corpus(dir: &Path) -> DatasetResult<Corpus> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut samples = Vec::new();
    let mut summary = ScanSummary::default();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            summary.skipped_non_files += 1;
            continue;
        }
        let Some(label) = path.file_stem().and_then(|s| s.to_str()) else {
            summary.skipped_unnamed += 1;
            continue;
        };
        if label.is_empty() {
            summary.skipped_unnamed += 1;
            continue;
        }
        samples.push(Sample {
            label: label.to_string(),
            image: path,
        });
    }
    samples.sort_by(|a, b| a.image.cmp(&b.image));
    summary.accepted = samples.len();

    let vocab = Vocabulary::from_labels(samples.iter().map(|s| s.label.as_str()));
    let max_text_length = samples
        .iter()
        .map(|s| s.label.chars().count())
        .max()
        .unwrap_or(0);

    Ok(Corpus {
        samples,
        vocab,
        max_text_length,
        summary,
    })
}
