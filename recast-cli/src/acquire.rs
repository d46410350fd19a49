//! Source video acquisition.
//!
//! Downloads the remote source file into the work directory before the
//! streaming loop starts. Acquisition failures are fatal and never retried
//! here: a bad source URL or an auth problem does not fix itself, the
//! operator has to correct the configuration.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use indicatif::ProgressBar;
use reqwest::StatusCode;
use reqwest::header::REFERER;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

/// Browser-like User-Agent; some CDNs reject unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("downloaded file not found at {} and no fallback candidate present", expected.display())]
    MissingOutput { expected: PathBuf },
}

/// Download the source video and return the confirmed local path.
pub async fn fetch(config: &AppConfig) -> Result<PathBuf, AcquireError> {
    let expected = config.media_path();
    remove_stale(&expected).await?;

    info!(url = %config.source_url, "downloading source video");

    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let referer = config.source_url.origin().ascii_serialization();
    let response = client
        .get(config.source_url.clone())
        .header(REFERER, referer)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AcquireError::HttpStatus {
            status: response.status(),
            url: config.source_url.to_string(),
        });
    }

    let progress = match response.content_length() {
        Some(len) => ProgressBar::new(len),
        None => ProgressBar::new_spinner(),
    };

    let mut file = File::create(&expected).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress.set_position(written);
    }
    file.flush().await?;
    progress.finish_and_clear();

    info!(path = %expected.display(), bytes = written, "source video downloaded");

    verify(&expected).await
}

/// Confirm the expected file exists, falling back to any sibling that shares
/// its stem (e.g. `video.webm` when `video.mp4` was expected).
async fn verify(expected: &Path) -> Result<PathBuf, AcquireError> {
    if tokio::fs::try_exists(expected).await? {
        return Ok(expected.to_path_buf());
    }

    if let Some(found) = discover_by_stem(expected).await? {
        warn!(
            expected = %expected.display(),
            path = %found.display(),
            "expected file missing, using fallback"
        );
        return Ok(found);
    }

    Err(AcquireError::MissingOutput {
        expected: expected.to_path_buf(),
    })
}

/// Scan the download directory for a file with the expected stem.
async fn discover_by_stem(expected: &Path) -> Result<Option<PathBuf>, AcquireError> {
    let Some(stem) = expected.file_stem() else {
        return Ok(None);
    };
    let dir = match expected.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && path.file_stem() == Some(stem) {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Delete a leftover download from a previous run, if any.
async fn remove_stale(path: &Path) -> Result<(), AcquireError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale download");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
