//! Randomized, label-preserving image augmentors for the training split.

use image::RgbImage;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct AugmentorConfig {
    /// Probability of applying a brightness shift.
    pub brightness_prob: f32,
    /// Max relative brightness shift (0-1 range).
    pub brightness_max_delta: f32,
    /// Probability of applying a small rotation.
    pub rotate_prob: f32,
    /// Max rotation angle in degrees, either direction.
    pub rotate_max_degrees: f32,
    /// Probability of applying stroke erosion or dilation.
    pub erode_dilate_prob: f32,
    /// Seed for reproducible perturbation; mixed with each sample's ordinal.
    pub seed: Option<u64>,
}

impl Default for AugmentorConfig {
    fn default() -> Self {
        Self {
            brightness_prob: 0.5,
            brightness_max_delta: 0.3,
            rotate_prob: 0.5,
            rotate_max_degrees: 10.0,
            erode_dilate_prob: 0.5,
            seed: None,
        }
    }
}

/// Ordered chain of augmentors, applied per-sample at batch-materialization
/// time. Attached to the training provider only; validation stays fixed.
#[derive(Debug, Clone)]
pub struct AugmentorChain {
    cfg: AugmentorConfig,
}

impl AugmentorChain {
    pub fn new(cfg: AugmentorConfig) -> Self {
        Self { cfg }
    }

    pub fn apply(&self, img: &mut RgbImage, ordinal: u64) {
        // Seeded if configured (per-sample deterministic), else thread-local.
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn rand::RngCore = if let Some(seed) = self.cfg.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ ordinal);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };

        maybe_brightness(img, self.cfg.brightness_prob, self.cfg.brightness_max_delta, rng);
        maybe_rotate(img, self.cfg.rotate_prob, self.cfg.rotate_max_degrees, rng);
        maybe_erode_dilate(img, self.cfg.erode_dilate_prob, rng);
    }
}

pub(crate) fn maybe_brightness(
    img: &mut RgbImage,
    prob: f32,
    max_delta: f32,
    rng: &mut dyn rand::RngCore,
) {
    if prob <= 0.0 || max_delta <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) >= prob {
        return;
    }
    let delta = rng.random_range(-max_delta..max_delta);
    for pixel in img.pixels_mut() {
        for c in 0..3 {
            let v = (pixel[c] as f32 / 255.0 + delta).clamp(0.0, 1.0);
            pixel[c] = (v * 255.0) as u8;
        }
    }
}

pub(crate) fn maybe_rotate(
    img: &mut RgbImage,
    prob: f32,
    max_degrees: f32,
    rng: &mut dyn rand::RngCore,
) {
    if prob <= 0.0 || max_degrees <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) >= prob {
        return;
    }
    let degrees = rng.random_range(-max_degrees..max_degrees);
    // Fill exposed corners with the background, approximated by the top-left pixel.
    let fill = *img.get_pixel(0, 0);
    let rotated = rotate_about_center(
        img,
        degrees.to_radians(),
        Interpolation::Bilinear,
        fill,
    );
    *img = rotated;
}

pub(crate) fn maybe_erode_dilate(img: &mut RgbImage, prob: f32, rng: &mut dyn rand::RngCore) {
    if prob <= 0.0 {
        return;
    }
    if rng.random_range(0.0..1.0) >= prob {
        return;
    }
    // Dark glyphs on light ground: a min filter thickens strokes, max thins them.
    let take_min = rng.random_range(0.0..1.0) < 0.5;
    *img = minmax_filter3(img, take_min);
}

fn minmax_filter3(img: &RgbImage, take_min: bool) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    for y in 0..height {
        for x in 0..width {
            let mut acc = [if take_min { u8::MAX } else { u8::MIN }; 3];
            let x0 = x.saturating_sub(1);
            let y0 = y.saturating_sub(1);
            for ny in y0..=(y + 1).min(height - 1) {
                for nx in x0..=(x + 1).min(width - 1) {
                    let p = img.get_pixel(nx, ny);
                    for c in 0..3 {
                        acc[c] = if take_min {
                            acc[c].min(p[c])
                        } else {
                            acc[c].max(p[c])
                        };
                    }
                }
            }
            out.put_pixel(x, y, image::Rgb(acc));
        }
    }
    out
}

#[cfg(test)]
mod aug_tests {
    use super::*;
    use rand::rngs::StdRng;

    fn gradient_image() -> RgbImage {
        RgbImage::from_fn(8, 4, |x, y| image::Rgb([(x * 30) as u8, (y * 60) as u8, 128]))
    }

    #[test]
    fn brightness_keeps_dimensions() {
        let mut img = gradient_image();
        let mut rng = StdRng::seed_from_u64(7);
        maybe_brightness(&mut img, 1.0, 0.3, &mut rng);
        assert_eq!(img.dimensions(), (8, 4));
    }

    #[test]
    fn rotation_keeps_dimensions() {
        let mut img = gradient_image();
        let mut rng = StdRng::seed_from_u64(7);
        maybe_rotate(&mut img, 1.0, 10.0, &mut rng);
        assert_eq!(img.dimensions(), (8, 4));
    }

    #[test]
    fn seeded_chain_is_reproducible_per_ordinal() {
        let chain = AugmentorChain::new(AugmentorConfig {
            seed: Some(99),
            ..Default::default()
        });
        let mut a = gradient_image();
        let mut b = gradient_image();
        chain.apply(&mut a, 3);
        chain.apply(&mut b, 3);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn dilate_never_darkens() {
        let img = gradient_image();
        let dilated = minmax_filter3(&img, false);
        for (p, q) in img.pixels().zip(dilated.pixels()) {
            for c in 0..3 {
                assert!(q[c] >= p[c]);
            }
        }
    }
}
