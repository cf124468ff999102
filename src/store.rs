//! Artifact download and filename-keyed cache.

use crate::config::CrawlConfig;
use crate::model::ArtifactDescriptor;
use crate::traits::{ArtifactSource, FetchError, FetchedArtifact};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace};

/// Downloads artifacts into the working directory, once per file name.
///
/// A file already present under the derived name is reused as-is; no
/// checksum is verified.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    http: Client,
    work_dir: PathBuf,
    chunk_size: usize,
}

impl ArtifactStore {
    pub fn new(config: &CrawlConfig, http: Client) -> Self {
        Self {
            http,
            work_dir: config.work_dir.clone(),
            chunk_size: config.chunk_size,
        }
    }

    /// Local path an artifact is stored under.
    pub fn path_for(&self, artifact: &ArtifactDescriptor) -> PathBuf {
        self.work_dir.join(&artifact.filename)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Nothing appears under `dest` until the transfer completed.
        let partial = partial_path(dest);
        let file = fs::File::create(&partial).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        let result: Result<(), FetchError> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                writer.write_all(&chunk).await?;
                written += chunk.len() as u64;
                trace!(bytes = written, "Download progress");
            }
            writer.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

#[async_trait]
impl ArtifactSource for ArtifactStore {
    async fn fetch(&self, artifact: &ArtifactDescriptor) -> Result<FetchedArtifact, FetchError> {
        let path = self.path_for(artifact);

        let is_cached = match fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if is_cached {
            info!(file = %artifact.filename, "Using cached artifact");
            return Ok(FetchedArtifact {
                path,
                cached: true,
                bytes_downloaded: 0,
            });
        }

        info!(url = %artifact.url, file = %artifact.filename, "Downloading artifact");
        let bytes = self.download(&artifact.url, &path).await?;
        debug!(file = %artifact.filename, bytes, "Download complete");

        Ok(FetchedArtifact {
            path,
            cached: false,
            bytes_downloaded: bytes,
        })
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
