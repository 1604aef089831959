//! Batch materialization for training and validation.

use crate::aug::AugmentorChain;
use crate::pipeline::TransformPipeline;
use crate::splits::split_samples;
use crate::types::{DatasetResult, Sample};
use burn::tensor::{Int, Tensor, TensorData};
use rand::{seq::SliceRandom, SeedableRng};
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

/// One training batch: normalized images and padded label indices.
pub struct CaptchaBatch<B: burn::tensor::backend::Backend> {
    /// Shape [batch, 3, height, width].
    pub images: Tensor<B, 4>,
    /// Shape [batch, max_text_length]; unused positions hold the padding sentinel.
    pub targets: Tensor<B, 2, Int>,
}

/// A sample subset plus its step chain. Train and validation providers share
/// the pipeline definition and diverge in augmentation and subset. Sample
/// materialization is a pure function per sample, so batches may be pulled by
/// parallel workers without shared mutable state.
pub struct DataProvider {
    samples: Vec<Sample>,
    pipeline: TransformPipeline,
    augmentors: Option<AugmentorChain>,
    shuffle: bool,
    rng: rand::rngs::StdRng,
    drop_last: bool,
    cursor: usize,
    processed_samples: usize,
    processed_batches: usize,
    skipped_errors: usize,
    warn_once: bool,
    warned_counts: bool,
    started: Instant,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    permissive_errors: bool,
    images_buf: Vec<f32>,
}

impl DataProvider {
    pub fn new(samples: Vec<Sample>, pipeline: TransformPipeline) -> Self {
        let log_every_samples = match std::env::var("CAPTCHA_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let permissive_errors = std::env::var("CAPTCHA_DATASET_PERMISSIVE")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .map(|v| v == "0" || v == "false" || v == "off")
            .map(|strict| !strict)
            .unwrap_or(true);
        let warn_once = std::env::var("CAPTCHA_DATASET_WARN_ONCE")
            .ok()
            .map(|v| v.trim().to_ascii_lowercase())
            .map(|v| v == "1" || v == "true" || v == "on")
            .unwrap_or(false);
        let now = Instant::now();
        Self {
            samples,
            pipeline,
            augmentors: None,
            shuffle: false,
            rng: rand::rngs::StdRng::from_rng(&mut rand::rng()),
            drop_last: false,
            cursor: 0,
            processed_samples: 0,
            processed_batches: 0,
            skipped_errors: 0,
            warn_once,
            warned_counts: false,
            started: now,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            permissive_errors,
            images_buf: Vec::new(),
        }
    }

    /// Attach the randomized augmentor chain. Training providers only.
    pub fn with_augmentors(mut self, chain: AugmentorChain) -> Self {
        self.augmentors = Some(chain);
        self
    }

    /// Reshuffle the subset on every [`reset`](Self::reset). Seeded for
    /// reproducible epoch orderings, unseeded for fresh entropy.
    pub fn with_shuffle(mut self, seed: Option<u64>) -> Self {
        self.shuffle = true;
        if let Some(seed) = seed {
            self.rng = rand::rngs::StdRng::seed_from_u64(seed);
        }
        self
    }

    /// Drop the final partial batch (training stability for small batches).
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Rewind for the next epoch, reshuffling when configured.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.shuffle {
            self.samples.shuffle(&mut self.rng);
        }
    }

    /// Materialize the next batch. Samples that fail preprocessing are logged
    /// and skipped rather than aborting the epoch; set
    /// `CAPTCHA_DATASET_PERMISSIVE=0` to make them fatal.
    pub fn next_batch<B: burn::tensor::backend::Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<CaptchaBatch<B>>> {
        let batch_size = batch_size.max(1);
        let max_len = self.pipeline.max_text_length();
        loop {
            if self.cursor >= self.samples.len() {
                return Ok(None);
            }
            let start = self.cursor;
            let end = (start + batch_size).min(self.samples.len());
            self.cursor = end;

            self.images_buf.clear();
            let mut targets_buf: Vec<i64> = Vec::with_capacity(batch_size * max_len);

            let augmentors = self.augmentors.as_ref();
            let pipeline = &self.pipeline;
            let mut loaded: Vec<_> = self.samples[start..end]
                .par_iter()
                .enumerate()
                .map(|(i, sample)| {
                    let ordinal = (start + i) as u64;
                    (i, sample, pipeline.apply_with(sample, augmentors, ordinal))
                })
                .collect();
            loaded.sort_by_key(|(i, _, _)| *i);

            for (_i, sample, res) in loaded {
                let encoded = match res {
                    Ok(s) => s,
                    Err(e) => {
                        if self.permissive_errors {
                            if !self.warn_once {
                                eprintln!(
                                    "Warning: skipping sample {}: {e}",
                                    sample.image.display()
                                );
                            }
                            self.skipped_errors += 1;
                            continue;
                        } else {
                            return Err(e);
                        }
                    }
                };
                self.images_buf.extend_from_slice(&encoded.image_chw);
                targets_buf.extend(encoded.indices.iter().map(|v| *v as i64));
            }

            let batch_len = targets_buf.len() / max_len.max(1);
            if batch_len == 0 {
                // Every sample in this slice was skipped; try the next slice.
                continue;
            }
            if self.drop_last && batch_len < batch_size {
                if self.cursor >= self.samples.len() {
                    return Ok(None);
                } else {
                    continue;
                }
            }

            let (width, height) = (self.pipeline.width as usize, self.pipeline.height as usize);
            let images = Tensor::<B, 1>::from_floats(self.images_buf.as_slice(), device)
                .reshape([batch_len, 3, height, width]);
            let targets =
                Tensor::<B, 2, Int>::from_data(TensorData::new(targets_buf, [batch_len, max_len]), device);

            self.processed_samples += batch_len;
            self.processed_batches += 1;
            self.maybe_log_progress();

            return Ok(Some(CaptchaBatch { images, targets }));
        }
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let since_last = self.last_log.elapsed();
        let should_log = processed_since >= threshold || since_last >= Duration::from_secs(30);
        if !should_log {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let rate = self.processed_samples as f32 / secs;
        if !self.warn_once || !self.warned_counts {
            eprintln!(
                "[dataset] batches={} samples={} skipped_errors={} elapsed={:.1}s rate={:.1} img/s",
                self.processed_batches, self.processed_samples, self.skipped_errors, secs, rate
            );
        }
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
        if self.warn_once {
            self.warned_counts = true;
        }
    }
}

/// Split samples and wrap both subsets. The validation provider gets no
/// augmentation and no shuffling, so repeated materializations are identical.
pub fn build_train_val_providers(
    samples: Vec<Sample>,
    pipeline: &TransformPipeline,
    train_fraction: f32,
    augmentors: Option<AugmentorChain>,
    epoch_shuffle_seed: Option<u64>,
) -> (DataProvider, DataProvider) {
    let (train_samples, val_samples) = split_samples(samples, train_fraction);
    let mut train =
        DataProvider::new(train_samples, pipeline.clone()).with_shuffle(epoch_shuffle_seed);
    if let Some(chain) = augmentors {
        train = train.with_augmentors(chain);
    }
    let val = DataProvider::new(val_samples, pipeline.clone());
    (train, val)
}
