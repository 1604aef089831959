use captcha_dataset::{
    scan_corpus, AugmentorChain, AugmentorConfig, TransformPipeline, Vocabulary,
};
use image::RgbImage;
use std::path::Path;

fn write_captcha(dir: &Path, name: &str) {
    let img = RgbImage::from_fn(24, 12, |x, y| {
        image::Rgb([(x * 10) as u8, (y * 20) as u8, 200])
    });
    img.save(dir.join(name)).unwrap();
}

#[test]
fn deterministic_chain_resizes_and_pads() {
    let tmp = tempfile::tempdir().unwrap();
    write_captcha(tmp.path(), "9k.png");
    write_captcha(tmp.path(), "ab3x.png");
    let corpus = scan_corpus(tmp.path()).unwrap();

    let pipeline =
        TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), corpus.max_text_length);
    let encoded = pipeline.apply(&corpus.samples[0]).unwrap();

    assert_eq!((encoded.width, encoded.height), (16, 8));
    assert_eq!(encoded.image_chw.len(), 3 * 16 * 8);
    assert!(encoded.image_chw.iter().all(|v| (0.0..=1.0).contains(v)));

    // "9k" padded to the corpus max length with the sentinel.
    assert_eq!(encoded.indices, vec![1, 4, 6, 6]);
    assert_eq!(encoded.indices.len(), corpus.max_text_length);
}

#[test]
fn repeated_materialization_is_identical_without_augmentors() {
    let tmp = tempfile::tempdir().unwrap();
    write_captcha(tmp.path(), "9k.png");
    let corpus = scan_corpus(tmp.path()).unwrap();

    let pipeline = TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), 4);
    let a = pipeline.apply(&corpus.samples[0]).unwrap();
    let b = pipeline.apply(&corpus.samples[0]).unwrap();
    assert_eq!(a, b);
}

#[test]
fn augmented_materialization_varies_but_preserves_the_label() {
    let tmp = tempfile::tempdir().unwrap();
    write_captcha(tmp.path(), "9k.png");
    let corpus = scan_corpus(tmp.path()).unwrap();

    let pipeline = TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), 4);
    let chain = AugmentorChain::new(AugmentorConfig {
        brightness_prob: 1.0,
        rotate_prob: 1.0,
        erode_dilate_prob: 1.0,
        seed: Some(42),
        ..Default::default()
    });

    let a = pipeline
        .apply_with(&corpus.samples[0], Some(&chain), 0)
        .unwrap();
    let b = pipeline
        .apply_with(&corpus.samples[0], Some(&chain), 1)
        .unwrap();

    assert_ne!(a.image_chw, b.image_chw);
    assert_eq!(a.indices, b.indices);

    // Same ordinal reproduces the same perturbation.
    let c = pipeline
        .apply_with(&corpus.samples[0], Some(&chain), 0)
        .unwrap();
    assert_eq!(a.image_chw, c.image_chw);
}

#[test]
fn encoding_fails_for_symbols_outside_a_stale_vocabulary() {
    let tmp = tempfile::tempdir().unwrap();
    write_captcha(tmp.path(), "9k.png");
    let corpus = scan_corpus(tmp.path()).unwrap();

    // A vocabulary computed from a different label set misses '9'.
    let stale = Vocabulary::from_string("abc");
    let pipeline = TransformPipeline::from_parts(16, 8, stale, 4);
    assert!(pipeline.apply(&corpus.samples[0]).is_err());
}

#[test]
fn overlong_labels_are_truncated_to_the_configured_width() {
    let vocab = Vocabulary::from_string("ab");
    let pipeline = TransformPipeline::from_parts(16, 8, vocab, 2);
    let indices = pipeline.encode_label("abab").unwrap();
    assert_eq!(indices, vec![0, 1]);
}
