//! Burn model for fixed-length CAPTCHA text recognition.
//!
//! A small convolutional stem followed by a per-position classification head.
//! The head emits `vocab_len + 1` classes per text position; the extra class
//! is the padding sentinel, so the loss can ignore unused positions.

use burn::module::Module;
use burn::nn;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::Tensor;
use captcha_dataset::TrainingConfig;

#[derive(Debug, Clone)]
pub struct CaptchaRecognizerConfig {
    pub width: u32,
    pub height: u32,
    pub max_text_length: usize,
    /// Real vocabulary size; the head adds one class for the sentinel.
    pub vocab_len: usize,
    pub hidden: usize,
    pub dropout: f64,
}

impl CaptchaRecognizerConfig {
    pub fn from_training_config(cfg: &TrainingConfig) -> Self {
        Self {
            width: cfg.width,
            height: cfg.height,
            max_text_length: cfg.max_text_length,
            vocab_len: cfg.vocabulary().len(),
            hidden: 256,
            dropout: 0.2,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.vocab_len + 1
    }
}

#[derive(Debug, Module)]
pub struct CaptchaRecognizer<B: burn::tensor::backend::Backend> {
    conv1: nn::conv::Conv2d<B>,
    conv2: nn::conv::Conv2d<B>,
    conv3: nn::conv::Conv2d<B>,
    pool: MaxPool2d,
    linear1: nn::Linear<B>,
    head: nn::Linear<B>,
    dropout: nn::Dropout,
    max_text_length: usize,
    num_classes: usize,
}

impl<B: burn::tensor::backend::Backend> CaptchaRecognizer<B> {
    pub fn new(cfg: CaptchaRecognizerConfig, device: &B::Device) -> Self {
        let conv1 = nn::conv::Conv2dConfig::new([3, 16], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv2 = nn::conv::Conv2dConfig::new([16, 32], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv3 = nn::conv::Conv2dConfig::new([32, 64], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        let flat = 64 * pooled(cfg.height as usize, 3) * pooled(cfg.width as usize, 3);
        let linear1 = nn::LinearConfig::new(flat, cfg.hidden).init(device);
        let num_classes = cfg.num_classes();
        let head =
            nn::LinearConfig::new(cfg.hidden, cfg.max_text_length * num_classes).init(device);
        let dropout = nn::DropoutConfig::new(cfg.dropout).init();

        Self {
            conv1,
            conv2,
            conv3,
            pool,
            linear1,
            head,
            dropout,
            max_text_length: cfg.max_text_length,
            num_classes,
        }
    }

    /// Forward pass: images [batch, 3, height, width] to per-position logits
    /// [batch, max_text_length, vocab_len + 1].
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = self.pool.forward(relu(self.conv3.forward(x)));

        let [batch, channels, h, w] = x.dims();
        let x = x.reshape([batch, channels * h * w]);
        let x = self.dropout.forward(relu(self.linear1.forward(x)));
        self.head
            .forward(x)
            .reshape([batch, self.max_text_length, self.num_classes])
    }
}

/// Spatial extent after `n` rounds of 2x2/stride-2 pooling.
fn pooled(mut dim: usize, n: usize) -> usize {
    for _ in 0..n {
        dim = dim.saturating_sub(2) / 2 + 1;
    }
    dim
}
