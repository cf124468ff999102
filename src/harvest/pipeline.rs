//! Per-package harvest pipeline.
//!
//! This module provides the [`HarvestPipeline`] coordinator that runs the
//! stages for one package (Resolve → Fetch → Extract → Parse) with:
//! - Async execution via `tokio`, blocking archive work on the blocking pool
//! - Configurable timeout per stage
//! - Structured logging via `tracing`
//! - Best-effort cleanup of extracted metadata files

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn, Span};

use crate::harvest::formats::extract_metadata;
use crate::harvest::traits::ExtractionError;
use crate::model::{ArtifactDescriptor, ArtifactFormat, PackageName};
use crate::parser::parse_dependencies;
use crate::traits::{ArtifactSource, FetchError, FetchedArtifact, IndexError, PackageIndex};

// ============================================================================
// Pipeline Types
// ============================================================================

/// Outcome of running the pipeline for one package.
#[derive(Debug)]
pub struct PackageHarvest {
    pub name: PackageName,

    /// Artifact chosen from the index
    pub artifact: ArtifactDescriptor,

    /// Where the artifact lives locally
    pub fetched: FetchedArtifact,

    /// Direct dependencies in declaration order.
    ///
    /// `None` when the artifact is a known leaf or carries no metadata; such
    /// packages contribute no edges.
    pub dependencies: Option<Vec<PackageName>>,

    pub stats: HarvestStats,
}

/// Timing for one package.
#[derive(Debug, Default, Clone)]
pub struct HarvestStats {
    /// Total time spent on the package (milliseconds)
    pub total_duration_ms: u64,

    /// Time spent on the index lookup (milliseconds)
    pub resolve_duration_ms: u64,

    /// Time spent downloading or locating the artifact (milliseconds)
    pub fetch_duration_ms: u64,

    /// Time spent extracting and parsing metadata (milliseconds)
    pub extraction_duration_ms: u64,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that abandon one package.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// Stage execution exceeded timeout
    #[error("Stage '{stage}' timed out after {timeout_secs}s")]
    StageTimeout { stage: String, timeout_secs: u64 },

    /// Index lookup failed or found no usable link
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Artifact download failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Archive could not be read
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The blocking extraction task panicked or was cancelled
    #[error("Task join error: {0}")]
    Task(String),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Runs the harvest stages for a single package.
///
/// Stages run strictly one after another. Each stage is bounded by the stage
/// timeout (default: 5 minutes).
pub struct HarvestPipeline<I, S>
where
    I: PackageIndex,
    S: ArtifactSource,
{
    /// Index lookup implementation
    index: I,

    /// Artifact download implementation
    source: S,

    /// Directory transient metadata files are extracted into
    work_dir: PathBuf,

    /// Timeout for each stage
    stage_timeout: Duration,
}

impl<I, S> HarvestPipeline<I, S>
where
    I: PackageIndex,
    S: ArtifactSource,
{
    /// Creates a pipeline extracting into `work_dir`.
    ///
    /// Default configuration:
    /// - Timeout: 5 minutes per stage
    pub fn new(index: I, source: S, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            index,
            source,
            work_dir: work_dir.into(),
            stage_timeout: Duration::from_secs(300),
        }
    }

    /// Sets the timeout for each pipeline stage.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    async fn run_stage<T, E, F>(&self, stage: &str, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        PipelineError: From<E>,
    {
        timeout(self.stage_timeout, fut)
            .await
            .map_err(|_| PipelineError::StageTimeout {
                stage: stage.to_string(),
                timeout_secs: self.stage_timeout.as_secs(),
            })?
            .map_err(PipelineError::from)
    }

    /// Runs every stage for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if:
    /// - Any stage times out
    /// - The index has no page or no usable link for the package
    /// - The download fails
    /// - The archive cannot be read
    ///
    /// Missing metadata and cleanup failures are not errors.
    #[instrument(skip(self), fields(package = %name))]
    pub async fn execute(
        &self,
        name: &PackageName,
        include_extras: bool,
    ) -> Result<PackageHarvest, PipelineError> {
        let start = Instant::now();
        let mut stats = HarvestStats::default();

        // ====================================================================
        // Stage 1: Resolve
        // ====================================================================

        info!(index = self.index.index_id(), "Getting info about package");
        let stage_start = Instant::now();
        let artifact = self.run_stage("resolve", self.index.resolve(name)).await?;
        stats.resolve_duration_ms = stage_start.elapsed().as_millis() as u64;

        // ====================================================================
        // Stage 2: Fetch
        // ====================================================================

        let stage_start = Instant::now();
        let fetched = self.run_stage("fetch", self.source.fetch(&artifact)).await?;
        stats.fetch_duration_ms = stage_start.elapsed().as_millis() as u64;
        debug!(
            duration_ms = stats.fetch_duration_ms,
            path = %fetched.path.display(),
            cached = fetched.cached,
            "Fetch completed"
        );

        if artifact.no_dependencies {
            debug!(file = %artifact.filename, "Leaf artifact, skipping metadata");
            stats.total_duration_ms = start.elapsed().as_millis() as u64;
            return Ok(PackageHarvest {
                name: name.clone(),
                artifact,
                fetched,
                dependencies: None,
                stats,
            });
        }

        // ====================================================================
        // Stage 3: Extract + Parse
        // ====================================================================

        info!("Extracting metadata");
        let stage_start = Instant::now();

        let archive = fetched.path.clone();
        let format = artifact.format;
        let work_dir = self.work_dir.clone();
        let span = Span::current();

        // A timed-out blocking task cannot be aborted; the flag makes it stop
        // touching `work_dir` at its next checkpoint.
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let task = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                harvest_dependencies(&archive, format, &work_dir, include_extras, &flag)
            })
        });

        let dependencies = match timeout(self.stage_timeout, task).await {
            Ok(joined) => joined.map_err(|e| PipelineError::Task(e.to_string()))??,
            Err(_) => {
                cancelled.store(true, Ordering::Relaxed);
                return Err(PipelineError::StageTimeout {
                    stage: "extract".to_string(),
                    timeout_secs: self.stage_timeout.as_secs(),
                });
            }
        };

        stats.extraction_duration_ms = stage_start.elapsed().as_millis() as u64;
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        match &dependencies {
            Some(deps) => info!(
                dependencies = ?deps.iter().map(PackageName::as_str).collect::<Vec<_>>(),
                binary_file = %artifact.filename,
                duration_ms = stats.total_duration_ms,
                "Package harvested"
            ),
            None => info!(file = %artifact.filename, "No suitable metadata found"),
        }

        Ok(PackageHarvest {
            name: name.clone(),
            artifact,
            fetched,
            dependencies,
            stats,
        })
    }
}

/// Extracts, parses and cleans up; runs on the blocking pool.
///
/// Once `cancelled` is set nothing new is written to `work_dir`, and a file
/// extracted before the flag was seen is removed without being parsed.
fn harvest_dependencies(
    archive: &Path,
    format: ArtifactFormat,
    work_dir: &Path,
    include_extras: bool,
    cancelled: &AtomicBool,
) -> Result<Option<Vec<PackageName>>, ExtractionError> {
    if cancelled.load(Ordering::Relaxed) {
        return Ok(None);
    }

    let Some(document) = extract_metadata(archive, format, work_dir)? else {
        return Ok(None);
    };

    let deps = if cancelled.load(Ordering::Relaxed) {
        None
    } else {
        Some(parse_dependencies(&document.text, document.kind, include_extras))
    };

    if let Some(entry) = document.extracted {
        debug!(member = %document.member, "Cleaning up extracted metadata");
        if let Err(e) = entry.cleanup() {
            warn!(error = %e, "Can't clean up extracted metadata");
        }
    }

    Ok(deps)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::formats::testutil::{write_sdist, write_wheel};
    use crate::model::TarCompression;
    use async_trait::async_trait;
    use tempfile::{tempdir, TempDir};

    // Mock index returning a fixed artifact for every name
    struct MockIndex {
        artifact: Option<ArtifactDescriptor>,
        delay: Duration,
    }

    #[async_trait]
    impl PackageIndex for MockIndex {
        fn index_id(&self) -> &str {
            "mock"
        }

        async fn resolve(&self, name: &PackageName) -> Result<ArtifactDescriptor, IndexError> {
            tokio::time::sleep(self.delay).await;
            self.artifact.clone().ok_or_else(|| IndexError::LookupFailed {
                name: name.to_string(),
                status: 404,
            })
        }
    }

    // Mock source pointing into a prepared directory
    struct MockSource {
        dir: PathBuf,
    }

    #[async_trait]
    impl ArtifactSource for MockSource {
        async fn fetch(
            &self,
            artifact: &ArtifactDescriptor,
        ) -> Result<FetchedArtifact, FetchError> {
            let path = self.dir.join(&artifact.filename);
            if !path.exists() {
                return Err(FetchError::Status {
                    url: artifact.url.clone(),
                    status: 500,
                });
            }
            Ok(FetchedArtifact {
                path,
                cached: true,
                bytes_downloaded: 0,
            })
        }
    }

    fn pipeline(dir: &TempDir, artifact: Option<ArtifactDescriptor>) -> HarvestPipeline<MockIndex, MockSource> {
        HarvestPipeline::new(
            MockIndex {
                artifact,
                delay: Duration::ZERO,
            },
            MockSource {
                dir: dir.path().to_path_buf(),
            },
            dir.path(),
        )
    }

    fn demo() -> PackageName {
        PackageName::new("demo").unwrap()
    }

    #[tokio::test]
    async fn test_wheel_pipeline() {
        let dir = tempdir().unwrap();
        write_wheel(
            &dir.path().join("demo-1.0-py3-none-any.whl"),
            &[(
                "demo-1.0.dist-info/METADATA",
                "Name: demo\nRequires-Dist: six\nRequires-Dist: pytest ; extra == 'test'\n",
            )],
        );
        let artifact = ArtifactDescriptor::new(
            "https://files.example.org/demo-1.0-py3-none-any.whl",
            ArtifactFormat::WheelLike,
            false,
        );

        let harvest = pipeline(&dir, Some(artifact)).execute(&demo(), false).await.unwrap();

        let deps = harvest.dependencies.unwrap();
        assert_eq!(deps, vec![PackageName::new("six").unwrap()]);
        // Extracted metadata is cleaned up.
        assert!(!dir.path().join("demo-1.0.dist-info").exists());
        assert!(harvest.stats.total_duration_ms >= harvest.stats.extraction_duration_ms);
    }

    #[tokio::test]
    async fn test_sdist_pipeline() {
        let dir = tempdir().unwrap();
        write_sdist(
            &dir.path().join("demo-1.0.tar.gz"),
            TarCompression::Gzip,
            &[("demo-1.0/demo.egg-info/requires.txt", "six\n\nidna\n")],
        );
        let artifact = ArtifactDescriptor::new(
            "https://files.example.org/demo-1.0.tar.gz",
            ArtifactFormat::SourceArchive(TarCompression::Gzip),
            false,
        );

        let harvest = pipeline(&dir, Some(artifact)).execute(&demo(), false).await.unwrap();
        let deps: Vec<_> = harvest.dependencies.unwrap().into_iter().map(|d| d.to_string()).collect();
        assert_eq!(deps, vec!["six", "idna"]);
    }

    #[tokio::test]
    async fn test_egg_is_leaf() {
        let dir = tempdir().unwrap();
        // Not even a valid zip: the leaf shortcut never opens it.
        std::fs::write(dir.path().join("demo-1.0.egg"), b"egg").unwrap();
        let artifact = ArtifactDescriptor::new(
            "https://files.example.org/demo-1.0.egg",
            ArtifactFormat::WheelLike,
            true,
        );

        let harvest = pipeline(&dir, Some(artifact)).execute(&demo(), false).await.unwrap();
        assert!(harvest.dependencies.is_none());
    }

    #[tokio::test]
    async fn test_missing_metadata_is_not_an_error() {
        let dir = tempdir().unwrap();
        write_wheel(&dir.path().join("demo-1.0.whl"), &[("demo/__init__.py", "")]);
        let artifact = ArtifactDescriptor::new("https://x/demo-1.0.whl", ArtifactFormat::WheelLike, false);

        let harvest = pipeline(&dir, Some(artifact)).execute(&demo(), false).await.unwrap();
        assert!(harvest.dependencies.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_dependencies() {
        let dir = tempdir().unwrap();
        // Cleanup only removes `pkg/`, which still holds the dist-info dir.
        write_wheel(
            &dir.path().join("demo-1.0-py3-none-any.whl"),
            &[("pkg/demo-1.0.dist-info/METADATA", "Requires-Dist: six\n")],
        );
        let artifact = ArtifactDescriptor::new(
            "https://files.example.org/demo-1.0-py3-none-any.whl",
            ArtifactFormat::WheelLike,
            false,
        );

        let harvest = pipeline(&dir, Some(artifact)).execute(&demo(), false).await.unwrap();

        assert_eq!(harvest.dependencies, Some(vec![PackageName::new("six").unwrap()]));
        assert!(!dir.path().join("pkg/demo-1.0.dist-info/METADATA").exists());
        assert!(dir.path().join("pkg/demo-1.0.dist-info").exists());
    }

    #[test]
    fn test_cancelled_extraction_leaves_work_dir_alone() {
        let dir = tempdir().unwrap();
        let wheel = dir.path().join("demo-1.0-py3-none-any.whl");
        write_wheel(&wheel, &[("demo-1.0.dist-info/METADATA", "Requires-Dist: six\n")]);

        let cancelled = AtomicBool::new(true);
        let deps =
            harvest_dependencies(&wheel, ArtifactFormat::WheelLike, dir.path(), false, &cancelled)
                .unwrap();

        assert!(deps.is_none());
        assert!(!dir.path().join("demo-1.0.dist-info").exists());
    }

    #[tokio::test]
    async fn test_stage_errors() {
        let dir = tempdir().unwrap();

        let result = pipeline(&dir, None).execute(&demo(), false).await;
        assert!(matches!(
            result,
            Err(PipelineError::Index(IndexError::LookupFailed { status: 404, .. }))
        ));

        let artifact = ArtifactDescriptor::new("https://x/absent-1.0.whl", ArtifactFormat::WheelLike, false);
        let result = pipeline(&dir, Some(artifact)).execute(&demo(), false).await;
        assert!(matches!(result, Err(PipelineError::Fetch(FetchError::Status { status: 500, .. }))));
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let dir = tempdir().unwrap();
        let pipeline = HarvestPipeline::new(
            MockIndex {
                artifact: None,
                delay: Duration::from_secs(5),
            },
            MockSource {
                dir: dir.path().to_path_buf(),
            },
            dir.path(),
        )
        .with_timeout(Duration::from_millis(20));

        let result = pipeline.execute(&demo(), false).await;
        match result {
            Err(PipelineError::StageTimeout { stage, .. }) => assert_eq!(stage, "resolve"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
