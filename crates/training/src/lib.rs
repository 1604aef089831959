#![recursion_limit = "256"]

pub mod model;
pub mod util;

pub use model::{CaptchaRecognizer, CaptchaRecognizerConfig};
pub use util::{char_error_rate, run_train, TrainArgs};

/// Backend alias for training/eval.
pub type TrainBackend = burn_ndarray::NdArray<f32>;
