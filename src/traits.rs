use crate::model::{ArtifactDescriptor, PackageName};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index lookup for '{name}' failed with status {status}")]
    LookupFailed { name: String, status: u16 },
    #[error("No artifact link found for '{0}'")]
    NoArtifactLink(String),
    #[error("Invalid index URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download of '{url}' failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PackageIndex: Send + Sync {
    /// Returns a short identifier for logging (e.g., the index host).
    fn index_id(&self) -> &str;

    /// Locates the preferred downloadable artifact for `name`.
    async fn resolve(&self, name: &PackageName) -> Result<ArtifactDescriptor, IndexError>;
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Makes the artifact available locally and returns its path.
    async fn fetch(&self, artifact: &ArtifactDescriptor) -> Result<FetchedArtifact, FetchError>;
}

/// A locally available artifact.
#[derive(Debug, Clone)]
pub struct FetchedArtifact {
    pub path: PathBuf,

    /// `true` when an existing file was reused instead of downloaded
    pub cached: bool,

    /// Bytes written by this fetch (0 on cache hits)
    pub bytes_downloaded: u64,
}
