//! Harvest module - per-package metadata extraction pipeline.
//!
//! This module provides the stages that turn a package name into its list of
//! direct dependencies:
//! - **Formats**: zip and compressed-tar strategies in [`formats`]
//! - **Metadata**: the extracted document via [`MetadataDocument`]
//! - **Errors**: Standardized error types for each pipeline stage
//! - **Pipeline**: Async executor via [`pipeline::HarvestPipeline`]

pub mod formats;
pub mod pipeline;
pub mod traits;

// Re-export commonly used types
pub use traits::{CleanupError, ExtractedEntry, ExtractionError, MetadataDocument};

pub use pipeline::{HarvestPipeline, HarvestStats, PackageHarvest, PipelineError};
