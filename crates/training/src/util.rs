use burn::backend::Autodiff;
use burn::module::{AutodiffModule, Module};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{CaptchaRecognizer, CaptchaRecognizerConfig, TrainBackend};
use captcha_dataset::{
    build_train_val_providers, ensure_corpus, scan_corpus, shuffle_samples, write_split_csv,
    AugmentorChain, AugmentorConfig, TrainingConfig, TransformPipeline,
};

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the CAPTCHA text recognizer")]
pub struct TrainArgs {
    /// Zip archive holding the labeled corpus.
    #[arg(
        long,
        default_value = "https://github.com/AakashKumarNain/CaptchaCracker/raw/master/captcha_images_v2.zip"
    )]
    pub dataset_url: String,
    /// Directory the corpus is downloaded into.
    #[arg(long, default_value = "datasets")]
    pub datasets_root: PathBuf,
    /// Corpus subdirectory inside the datasets root (also the archive layout).
    #[arg(long, default_value = "captcha_images_v2")]
    pub corpus: String,
    /// Output directory for config, split CSVs, and the checkpoint.
    #[arg(long, default_value = "models/captcha_recognizer")]
    pub model_path: PathBuf,
    /// Input image width after resize.
    #[arg(long, default_value_t = 200)]
    pub width: u32,
    /// Input image height after resize.
    #[arg(long, default_value_t = 50)]
    pub height: u32,
    /// Batch size.
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,
    /// Number of epochs.
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,
    /// Worker threads for batch materialization.
    #[arg(long, default_value_t = 20)]
    pub workers: usize,
    /// Fraction of samples assigned to the training split.
    #[arg(long, default_value_t = 0.9)]
    pub train_split: f32,
    /// Seed for the pre-split shuffle and per-epoch reshuffling.
    #[arg(long, default_value_t = 42)]
    pub split_seed: u64,
    /// Split in sorted filename order instead of shuffling first.
    #[arg(long, default_value_t = false)]
    pub no_shuffle: bool,
    /// Seed for reproducible augmentation; omit for fresh entropy per run.
    #[arg(long)]
    pub aug_seed: Option<u64>,
}

type ADBackend = Autodiff<TrainBackend>;

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(args.workers)
        .build_global()
    {
        eprintln!("note: worker pool already initialized: {e}");
    }

    let corpus_dir = ensure_corpus(&args.dataset_url, &args.datasets_root, &args.corpus)?;
    println!("corpus at {}", corpus_dir.display());

    let corpus = scan_corpus(&corpus_dir)?;
    if corpus.samples.is_empty() {
        anyhow::bail!("no samples found under {}", corpus_dir.display());
    }
    println!(
        "[dataset] samples={} skipped_non_files={} skipped_unnamed={} vocab={:?} max_text_length={}",
        corpus.summary.accepted,
        corpus.summary.skipped_non_files,
        corpus.summary.skipped_unnamed,
        corpus.vocab.as_string(),
        corpus.max_text_length
    );

    let cfg = TrainingConfig {
        width: args.width,
        height: args.height,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        train_epochs: args.epochs,
        train_workers: args.workers,
        ..TrainingConfig::for_corpus(&corpus, &args.model_path)
    };
    fs::create_dir_all(&cfg.model_path)?;
    // Persisted before any stochastic step so the symbol-index mapping on disk
    // is exactly the one training uses.
    cfg.save()?;

    let mut samples = corpus.samples;
    if !args.no_shuffle {
        shuffle_samples(&mut samples, args.split_seed);
    }

    let pipeline = TransformPipeline::new(&cfg);
    let augmentors = AugmentorChain::new(AugmentorConfig {
        seed: args.aug_seed,
        ..Default::default()
    });
    let (mut train, mut val) = build_train_val_providers(
        samples,
        &pipeline,
        args.train_split,
        Some(augmentors),
        Some(args.split_seed),
    );
    if train.is_empty() {
        anyhow::bail!("training split is empty; lower --train-split or add samples");
    }
    write_split_csv(&cfg.model_path.join("train.csv"), train.samples())?;
    write_split_csv(&cfg.model_path.join("val.csv"), val.samples())?;
    println!(
        "split: train={} val={} ({}% train)",
        train.len(),
        val.len(),
        (args.train_split * 100.0).round()
    );

    let device = <ADBackend as burn::tensor::backend::Backend>::Device::default();
    let mut model = CaptchaRecognizer::<ADBackend>::new(
        CaptchaRecognizerConfig::from_training_config(&cfg),
        &device,
    );
    let mut optim = AdamConfig::new().init();

    let pad = pipeline.vocab().pad_value() as usize;
    let max_len = cfg.max_text_length;
    let num_classes = pad + 1;
    let loss_fn = CrossEntropyLossConfig::new()
        .with_pad_tokens(Some(vec![pad]))
        .init(&device);

    for epoch in 0..cfg.train_epochs {
        train.reset();
        let mut losses = Vec::new();
        loop {
            let batch = match train.next_batch::<ADBackend>(cfg.batch_size, &device)? {
                Some(batch) => batch,
                None => break,
            };
            let batch_len = batch.images.dims()[0];
            let logits = model
                .forward(batch.images)
                .reshape([batch_len * max_len, num_classes]);
            let targets = batch.targets.reshape([batch_len * max_len]);

            let loss = loss_fn.forward(logits, targets);
            let loss_detached = loss.clone().detach();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.learning_rate, model, grads);

            let loss_val: f32 = loss_detached
                .into_data()
                .to_vec::<f32>()
                .unwrap_or_default()
                .into_iter()
                .next()
                .unwrap_or(0.0);
            losses.push(loss_val);
        }
        let avg_loss: f32 = if losses.is_empty() {
            0.0
        } else {
            losses.iter().sum::<f32>() / losses.len() as f32
        };

        match validate_epoch(&model.valid(), &mut val, &cfg, pad as i64)? {
            Some(cer) => println!("epoch {epoch}: avg loss {avg_loss:.4} val_cer {cer:.3}"),
            None => println!("epoch {epoch}: avg loss {avg_loss:.4}"),
        }
    }

    let ckpt_path = cfg.model_path.join("model.bin");
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(Path::new(&ckpt_path), &recorder)
        .map_err(|e| anyhow::anyhow!("failed to save checkpoint: {e}"))?;
    println!("Saved checkpoint to {}", ckpt_path.display());

    Ok(())
}

fn validate_epoch(
    model: &CaptchaRecognizer<TrainBackend>,
    val: &mut captcha_dataset::DataProvider,
    cfg: &TrainingConfig,
    pad: i64,
) -> anyhow::Result<Option<f32>> {
    if val.is_empty() {
        return Ok(None);
    }
    let device = <TrainBackend as burn::tensor::backend::Backend>::Device::default();
    let max_len = cfg.max_text_length;
    val.reset();
    let mut cer_sum = 0.0f32;
    let mut count = 0usize;
    loop {
        let batch = match val.next_batch::<TrainBackend>(cfg.batch_size, &device)? {
            Some(batch) => batch,
            None => break,
        };
        let batch_len = batch.images.dims()[0];
        let preds = model
            .forward(batch.images)
            .argmax(2)
            .reshape([batch_len * max_len])
            .into_data()
            .to_vec::<i64>()
            .unwrap_or_default();
        let targets = batch
            .targets
            .reshape([batch_len * max_len])
            .into_data()
            .to_vec::<i64>()
            .unwrap_or_default();
        for (pred_row, target_row) in preds.chunks(max_len).zip(targets.chunks(max_len)) {
            cer_sum += char_error_rate(pred_row, target_row, pad);
            count += 1;
        }
    }
    if count == 0 {
        return Ok(None);
    }
    Ok(Some(cer_sum / count as f32))
}

/// Character error rate: edit distance between the prediction and the target
/// after stripping padding, normalized by the target length.
pub fn char_error_rate(pred: &[i64], target: &[i64], pad: i64) -> f32 {
    let pred: Vec<i64> = pred.iter().copied().filter(|v| *v != pad).collect();
    let target: Vec<i64> = target.iter().copied().filter(|v| *v != pad).collect();
    if target.is_empty() {
        return if pred.is_empty() { 0.0 } else { 1.0 };
    }
    levenshtein(&pred, &target) as f32 / target.len() as f32
}

fn levenshtein(a: &[i64], b: &[i64]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
