//! Reproducible train/validation splitting and split artifacts.

use crate::types::{DatasetError, DatasetResult, Sample};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Seeded in-place shuffle, for callers that want a representative validation
/// set while keeping the split reproducible.
pub fn shuffle_samples(samples: &mut [Sample], seed: u64) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);
}

/// Partition into disjoint, covering train/validation subsets. The boundary is
/// `floor(len * train_fraction)`; ordering is preserved, so the split is
/// deterministic for a given input order.
pub fn split_samples(samples: Vec<Sample>, train_fraction: f32) -> (Vec<Sample>, Vec<Sample>) {
    let fraction = train_fraction.clamp(0.0, 1.0);
    let boundary = ((samples.len() as f32) * fraction) as usize;
    let boundary = boundary.min(samples.len());
    let mut train = samples;
    let val = train.split_off(boundary);
    (train, val)
}

/// Record the sample-to-label assignment actually used, one `path,label` row
/// per sample, for auditing by external tooling.
pub fn write_split_csv(path: &Path, samples: &[Sample]) -> DatasetResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if !parent.exists() {
        fs::create_dir_all(parent).map_err(|e| DatasetError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut file = fs::File::create(path).map_err(|e| DatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut write = |line: String| -> DatasetResult<()> {
        writeln!(file, "{line}").map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    };
    write("path,label".to_string())?;
    for sample in samples {
        write(format!(
            "{},{}",
            csv_field(&sample.image.display().to_string()),
            csv_field(&sample.label)
        ))?;
    }
    Ok(())
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod split_tests {
    use super::*;
    use std::path::PathBuf;

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample {
                image: PathBuf::from(format!("corpus/{i:03}.png")),
                label: format!("{i:03}"),
            })
            .collect()
    }

    #[test]
    fn split_is_disjoint_and_covering() {
        let all = samples(10);
        let (train, val) = split_samples(all.clone(), 0.9);
        assert_eq!(train.len(), 9);
        assert_eq!(val.len(), 1);
        let mut merged = train.clone();
        merged.extend(val.clone());
        assert_eq!(merged, all);
        for t in &train {
            assert!(!val.contains(t));
        }
    }

    #[test]
    fn split_fraction_rounds_down() {
        let (train, val) = split_samples(samples(7), 0.5);
        assert_eq!(train.len(), 3);
        assert_eq!(val.len(), 4);
    }

    #[test]
    fn extreme_fractions_are_clamped() {
        let (train, val) = split_samples(samples(4), 1.5);
        assert_eq!((train.len(), val.len()), (4, 0));
        let (train, val) = split_samples(samples(4), -0.1);
        assert_eq!((train.len(), val.len()), (0, 4));
    }

    #[test]
    fn csv_records_the_assignment_actually_used() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("artifacts").join("train.csv");
        let (train, _val) = split_samples(samples(5), 0.6);
        write_split_csv(&path, &train).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines[0], "path,label");
        assert_eq!(lines.len(), 1 + train.len());
        assert!(lines[1].ends_with(",000"));
    }

    #[test]
    fn seeded_shuffle_is_reproducible() {
        let mut a = samples(20);
        let mut b = samples(20);
        shuffle_samples(&mut a, 42);
        shuffle_samples(&mut b, 42);
        assert_eq!(a, b);
        let mut c = samples(20);
        shuffle_samples(&mut c, 43);
        assert_ne!(a, c);
    }
}
