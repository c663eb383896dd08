//! Single-attempt artifact download streamed to disk.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::Method;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::DownloadError;
use super::path::partial_path;
use crate::fetch::{AttemptFailure, Fetcher};

/// Downloads artifacts through the shared [`Fetcher`] connection pool.
///
/// Retries are the engine's job; every call here is exactly one request.
#[derive(Debug, Clone)]
pub struct ArtifactClient {
    fetcher: Fetcher,
}

/// Removes the partial file on drop unless the download was kept.
///
/// Covers early returns and tasks aborted mid-stream alike.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed && std::fs::remove_file(&self.path).is_ok() {
            debug!(path = %self.path.display(), "removed partial file");
        }
    }
}

impl ArtifactClient {
    /// Creates a client sharing `fetcher`'s HTTP settings.
    #[must_use]
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Streams `url` to `dest` through a `.part` file and returns the byte count.
    ///
    /// `dest` only ever appears complete: the body goes to a sibling `.part`
    /// file that is renamed once the stream ends with at least one byte.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`], [`DownloadError::HttpStatus`],
    /// [`DownloadError::Network`], [`DownloadError::EmptyBody`] or
    /// [`DownloadError::Io`]; no partial file is left behind in any case.
    #[instrument(skip(self), fields(dest = %dest.display()))]
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .fetcher
            .attempt(Method::GET, &parsed)
            .await
            .map_err(|failure| attempt_error(url, failure))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        let part = PartialFile::new(partial_path(dest));
        let file = File::create(&part.path)
            .await
            .map_err(|e| DownloadError::io(&part.path, e))?;
        let bytes = stream_to_file(file, response, url, &part.path).await?;

        if bytes == 0 {
            return Err(DownloadError::empty_body(url));
        }

        tokio::fs::rename(&part.path, dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;
        part.keep();

        info!(bytes, "artifact saved");
        Ok(bytes)
    }
}

/// True when `path` is an existing non-empty file.
pub async fn is_complete_artifact(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

fn attempt_error(url: &str, failure: AttemptFailure) -> DownloadError {
    match failure.status {
        Some(status) => DownloadError::http_status(url, status),
        None => DownloadError::network(url, failure.message),
    }
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e.to_string()))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
