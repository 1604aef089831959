//! Dataset acquisition, labeling, and batching for CAPTCHA text recognition.
//!
//! This crate provides utilities for:
//! - Fetching and unpacking the labeled image corpus
//! - Deriving labels and the symbol vocabulary from filenames
//! - Persisting the run configuration consumed by training and inference
//! - Deterministic preprocessing (decode, resize, label encoding, padding)
//! - Train/val splitting with reproducible ordering
//! - Randomized augmentation for the training split
//! - Burn-compatible batch iteration

// Module declarations
pub mod acquire;
pub mod aug;
pub mod config;
pub mod corpus;
pub mod pipeline;
pub mod splits;
pub mod types;

#[cfg(feature = "burn-runtime")]
pub mod batch;

// Re-export public API
pub use acquire::ensure_corpus;
pub use aug::{AugmentorChain, AugmentorConfig};
pub use config::TrainingConfig;
pub use corpus::{scan_corpus, Corpus, Vocabulary};
pub use pipeline::{EncodedSample, TransformPipeline};
pub use splits::{shuffle_samples, split_samples, write_split_csv};
pub use types::*;

#[cfg(feature = "burn-runtime")]
pub use batch::{build_train_val_providers, CaptchaBatch, DataProvider};
