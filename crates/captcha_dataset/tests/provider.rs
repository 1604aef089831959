#![cfg(feature = "burn-runtime")]

use burn::tensor::backend::Backend;
use burn_ndarray::NdArray;
use captcha_dataset::{
    build_train_val_providers, scan_corpus, AugmentorChain, AugmentorConfig, DataProvider,
    TransformPipeline,
};
use image::RgbImage;
use std::fs;
use std::path::Path;

type B = NdArray<f32>;

fn write_captcha(dir: &Path, name: &str) {
    let img = RgbImage::from_fn(20, 10, |x, y| image::Rgb([(x * 12) as u8, (y * 25) as u8, 90]));
    img.save(dir.join(name)).unwrap();
}

fn device() -> <B as Backend>::Device {
    Default::default()
}

#[test]
fn batches_have_image_and_target_shapes() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["ab.png", "cd.png", "ef.png", "gh.png"] {
        write_captcha(tmp.path(), name);
    }
    let corpus = scan_corpus(tmp.path()).unwrap();
    let pipeline =
        TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), corpus.max_text_length);

    let mut provider = DataProvider::new(corpus.samples, pipeline);
    let batch = provider
        .next_batch::<B>(2, &device())
        .unwrap()
        .expect("first batch");
    assert_eq!(batch.images.dims(), [2, 3, 8, 16]);
    assert_eq!(batch.targets.dims(), [2, 2]);

    let second = provider.next_batch::<B>(2, &device()).unwrap();
    assert!(second.is_some());
    let done = provider.next_batch::<B>(2, &device()).unwrap();
    assert!(done.is_none());
}

#[test]
fn target_indices_stay_below_the_sentinel_or_equal_it_only_as_padding() {
    let tmp = tempfile::tempdir().unwrap();
    write_captcha(tmp.path(), "ab3x.png");
    write_captcha(tmp.path(), "9k.png");
    let corpus = scan_corpus(tmp.path()).unwrap();
    let sentinel = corpus.vocab.pad_value() as i64;
    let pipeline =
        TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), corpus.max_text_length);

    let mut provider = DataProvider::new(corpus.samples, pipeline);
    let batch = provider.next_batch::<B>(2, &device()).unwrap().unwrap();
    let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
    assert!(targets.iter().all(|v| *v <= sentinel));
    // "9k" row: two real indices then sentinel padding out to length four.
    assert!(targets.contains(&sentinel));
}

#[test]
fn validation_materialization_is_deterministic() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["ab.png", "cd.png", "ef.png", "gh.png"] {
        write_captcha(tmp.path(), name);
    }
    let corpus = scan_corpus(tmp.path()).unwrap();
    let pipeline =
        TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), corpus.max_text_length);

    let mut first = DataProvider::new(corpus.samples.clone(), pipeline.clone());
    let mut second = DataProvider::new(corpus.samples, pipeline);

    let a = first.next_batch::<B>(4, &device()).unwrap().unwrap();
    let b = second.next_batch::<B>(4, &device()).unwrap().unwrap();
    assert_eq!(
        a.images.into_data().to_vec::<f32>().unwrap(),
        b.images.into_data().to_vec::<f32>().unwrap()
    );
    assert_eq!(
        a.targets.into_data().to_vec::<i64>().unwrap(),
        b.targets.into_data().to_vec::<i64>().unwrap()
    );
}

#[test]
fn corrupt_images_are_skipped_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["ab.png", "cd.png", "ef.png", "gh.png"] {
        write_captcha(tmp.path(), name);
    }
    fs::write(tmp.path().join("zz.png"), b"not an image").unwrap();
    let corpus = scan_corpus(tmp.path()).unwrap();
    assert_eq!(corpus.samples.len(), 5);
    let pipeline =
        TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), corpus.max_text_length);

    let mut provider = DataProvider::new(corpus.samples, pipeline);
    let batch = provider.next_batch::<B>(5, &device()).unwrap().unwrap();
    assert_eq!(batch.images.dims()[0], 4);
}

#[test]
fn split_providers_are_disjoint_and_covering() {
    let tmp = tempfile::tempdir().unwrap();
    for i in 0..10 {
        write_captcha(tmp.path(), &format!("s{i}.png"));
    }
    let corpus = scan_corpus(tmp.path()).unwrap();
    let pipeline =
        TransformPipeline::from_parts(16, 8, corpus.vocab.clone(), corpus.max_text_length);
    let chain = AugmentorChain::new(AugmentorConfig::default());

    let (train, val) =
        build_train_val_providers(corpus.samples.clone(), &pipeline, 0.9, Some(chain), Some(7));
    assert_eq!(train.len(), 9);
    assert_eq!(val.len(), 1);
    assert_eq!(train.len() + val.len(), corpus.samples.len());
    for sample in val.samples() {
        assert!(!train.samples().contains(sample));
    }
}
