//! Corpus acquisition: fetch and unpack the labeled image archive.

use crate::types::{DatasetError, DatasetResult};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOWNLOAD_ATTEMPTS: u32 = 3;
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Ensure `datasets_root/corpus_subdir` exists, downloading and extracting the
/// archive at `url` if it does not. Returns the corpus directory.
///
/// Re-running with an existing corpus is a no-op. Extraction goes through a
/// temporary sibling directory and is renamed into place only on success, so a
/// failed run never leaves a half-populated corpus behind the existence check.
pub fn ensure_corpus(url: &str, datasets_root: &Path, corpus_subdir: &str) -> DatasetResult<PathBuf> {
    let corpus_dir = datasets_root.join(corpus_subdir);
    if corpus_dir.exists() {
        return Ok(corpus_dir);
    }

    fs::create_dir_all(datasets_root).map_err(|e| DatasetError::Io {
        path: datasets_root.to_path_buf(),
        source: e,
    })?;

    let bytes = fetch_with_retry(url)?;
    extract_archive(url, &bytes, datasets_root, corpus_subdir)?;

    if !corpus_dir.exists() {
        return Err(DatasetError::Archive {
            url: url.to_string(),
            msg: format!("archive did not contain {corpus_subdir}"),
        });
    }
    Ok(corpus_dir)
}

fn fetch_with_retry(url: &str) -> DatasetResult<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| DatasetError::Download {
            url: url.to_string(),
            msg: e.to_string(),
        })?;

    let mut last_err = String::new();
    for attempt in 0..DOWNLOAD_ATTEMPTS {
        if attempt > 0 {
            eprintln!("[dataset] download attempt {} of {DOWNLOAD_ATTEMPTS} for {url}", attempt + 1);
            std::thread::sleep(Duration::from_secs(1u64 << attempt));
        }
        match client.get(url).send().and_then(|r| r.error_for_status()) {
            Ok(response) => match response.bytes() {
                Ok(body) => return Ok(body.to_vec()),
                Err(e) => last_err = e.to_string(),
            },
            Err(e) => last_err = e.to_string(),
        }
    }
    Err(DatasetError::Download {
        url: url.to_string(),
        msg: last_err,
    })
}

fn extract_archive(
    url: &str,
    bytes: &[u8],
    datasets_root: &Path,
    corpus_subdir: &str,
) -> DatasetResult<()> {
    let staging = datasets_root.join(format!(".{corpus_subdir}.partial"));
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| DatasetError::Io {
            path: staging.clone(),
            source: e,
        })?;
    }
    fs::create_dir_all(&staging).map_err(|e| DatasetError::Io {
        path: staging.clone(),
        source: e,
    })?;

    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| DatasetError::Archive {
            url: url.to_string(),
            msg: e.to_string(),
        })?;
    archive.extract(&staging).map_err(|e| DatasetError::Archive {
        url: url.to_string(),
        msg: e.to_string(),
    })?;

    // The archive may carry the corpus directory as its top-level entry, or be
    // a flat file listing; both land at datasets_root/corpus_subdir.
    let nested = staging.join(corpus_subdir);
    let source = if nested.is_dir() { nested } else { staging.clone() };
    let target = datasets_root.join(corpus_subdir);
    fs::rename(&source, &target).map_err(|e| DatasetError::Io {
        path: target,
        source: e,
    })?;
    let _ = fs::remove_dir_all(&staging);
    Ok(())
}
