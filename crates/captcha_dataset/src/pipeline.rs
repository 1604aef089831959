//! Deterministic per-sample preprocessing: decode, resize, encode, pad.

use crate::aug::AugmentorChain;
use crate::config::TrainingConfig;
use crate::corpus::Vocabulary;
use crate::types::{DatasetError, DatasetResult, Sample};
use image::imageops::FilterType;
use image::RgbImage;

/// A preprocessed sample ready for batch assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedSample {
    /// Image in CHW layout, normalized to [0, 1].
    pub image_chw: Vec<f32>,
    pub width: u32,
    pub height: u32,
    /// Symbol indices padded to the configured maximum length with the
    /// vocabulary's padding sentinel.
    pub indices: Vec<u32>,
}

/// The ordered deterministic step chain applied to every sample: image read,
/// resize to a fixed size, label indexing, padding. Shared by the train and
/// validation providers; augmentation is attached separately.
#[derive(Debug, Clone)]
pub struct TransformPipeline {
    pub width: u32,
    pub height: u32,
    vocab: Vocabulary,
    max_text_length: usize,
}

impl TransformPipeline {
    pub fn new(cfg: &TrainingConfig) -> Self {
        Self::from_parts(cfg.width, cfg.height, cfg.vocabulary(), cfg.max_text_length)
    }

    pub fn from_parts(
        width: u32,
        height: u32,
        vocab: Vocabulary,
        max_text_length: usize,
    ) -> Self {
        Self {
            width,
            height,
            vocab,
            max_text_length,
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn max_text_length(&self) -> usize {
        self.max_text_length
    }

    /// Decode the sample's image and stretch it to the configured size.
    pub fn load_image(&self, sample: &Sample) -> DatasetResult<RgbImage> {
        let img = image::open(&sample.image)
            .map_err(|e| DatasetError::Image {
                path: sample.image.clone(),
                source: e,
            })?
            .to_rgb8();
        Ok(image::imageops::resize(
            &img,
            self.width,
            self.height,
            FilterType::Triangle,
        ))
    }

    /// Index the label and pad to the fixed width with the sentinel.
    pub fn encode_label(&self, label: &str) -> DatasetResult<Vec<u32>> {
        let mut indices = self.vocab.encode(label)?;
        indices.truncate(self.max_text_length);
        indices.resize(self.max_text_length, self.vocab.pad_value());
        Ok(indices)
    }

    /// Apply the deterministic chain only. Repeated calls on the same sample
    /// produce identical output.
    pub fn apply(&self, sample: &Sample) -> DatasetResult<EncodedSample> {
        self.apply_with(sample, None, 0)
    }

    /// Apply the chain, optionally perturbing the image with an augmentor
    /// chain first. `ordinal` feeds the augmentors' per-sample seeding.
    pub fn apply_with(
        &self,
        sample: &Sample,
        augmentors: Option<&AugmentorChain>,
        ordinal: u64,
    ) -> DatasetResult<EncodedSample> {
        let mut img = self.load_image(sample)?;
        if let Some(chain) = augmentors {
            chain.apply(&mut img, ordinal);
        }
        let indices = self.encode_label(&sample.label)?;
        Ok(EncodedSample {
            image_chw: to_chw(&img),
            width: self.width,
            height: self.height,
            indices,
        })
    }
}

fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut chw = vec![0.0f32; plane * 3];
    for (x, y, pixel) in img.enumerate_pixels() {
        let base = (y * width + x) as usize;
        chw[base] = pixel[0] as f32 / 255.0;
        chw[plane + base] = pixel[1] as f32 / 255.0;
        chw[2 * plane + base] = pixel[2] as f32 / 255.0;
    }
    chw
}
