use crate::config::CrawlConfig;
use crate::harvest::pipeline::HarvestPipeline;
use crate::index::{http_client, IndexClient};
use crate::model::{DependencyGraph, PackageName};
use crate::store::ArtifactStore;
use crate::traits::{ArtifactSource, PackageIndex};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// A package abandoned during a crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlFailure {
    pub name: PackageName,
    pub error: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CrawlStats {
    pub packages_processed: usize,
    pub packages_failed: usize,
    pub cache_hits: usize,
    pub bytes_downloaded: u64,
    pub total_duration_ms: u64,
}

/// Everything a finished crawl produced.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub graph: DependencyGraph,

    /// Local artifact per successfully fetched package
    pub artifacts: IndexMap<PackageName, PathBuf>,

    pub failures: Vec<CrawlFailure>,
    pub stats: CrawlStats,
}

impl CrawlReport {
    /// Artifact downloaded for the root package, if any.
    pub fn root_artifact(&self) -> Option<&PathBuf> {
        self.artifacts.get(&self.graph.root)
    }
}

/// Breadth-first crawl over the dependency graph.
///
/// Names are marked visited when enqueued, so each name reaches the index at
/// most once. Any failure abandons only the package it happened in.
pub struct CrawlScheduler<I, S>
where
    I: PackageIndex,
    S: ArtifactSource,
{
    pipeline: HarvestPipeline<I, S>,
}

impl CrawlScheduler<IndexClient, ArtifactStore> {
    /// Scheduler talking to the HTTP index described by `config`.
    pub fn from_config(config: &CrawlConfig) -> Result<Self, reqwest::Error> {
        let http = http_client(config)?;
        let pipeline = HarvestPipeline::new(
            IndexClient::new(config, http.clone()),
            ArtifactStore::new(config, http),
            config.work_dir.clone(),
        )
        .with_timeout(config.stage_timeout);
        Ok(Self::new(pipeline))
    }
}

impl<I, S> CrawlScheduler<I, S>
where
    I: PackageIndex,
    S: ArtifactSource,
{
    pub fn new(pipeline: HarvestPipeline<I, S>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &HarvestPipeline<I, S> {
        &self.pipeline
    }

    #[instrument(skip(self), fields(root = %root))]
    pub async fn crawl(&self, root: PackageName, include_extras: bool) -> CrawlReport {
        let start = Instant::now();
        let mut graph = DependencyGraph::new(root.clone());
        let mut queue = VecDeque::from([root]);
        let mut artifacts = IndexMap::new();
        let mut failures = Vec::new();
        let mut stats = CrawlStats::default();

        info!(include_extras, "Starting crawl");

        while let Some(name) = queue.pop_front() {
            stats.packages_processed += 1;

            let harvest = match self.pipeline.execute(&name, include_extras).await {
                Ok(harvest) => harvest,
                Err(e) => {
                    warn!(package = %name, error = %e, "Abandoning package");
                    stats.packages_failed += 1;
                    failures.push(CrawlFailure {
                        name,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if harvest.fetched.cached {
                stats.cache_hits += 1;
            }
            stats.bytes_downloaded += harvest.fetched.bytes_downloaded;
            artifacts.insert(name.clone(), harvest.fetched.path);

            let Some(deps) = harvest.dependencies else {
                continue;
            };

            for dep in &deps {
                if graph.visit(dep.clone()) {
                    queue.push_back(dep.clone());
                }
            }
            graph.record(name, deps);
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            processed = stats.packages_processed,
            failed = stats.packages_failed,
            cache_hits = stats.cache_hits,
            duration_ms = stats.total_duration_ms,
            "Crawl finished"
        );

        CrawlReport {
            graph,
            artifacts,
            failures,
            stats,
        }
    }
}
