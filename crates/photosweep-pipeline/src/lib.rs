//! Resumable, phased analysis pipeline for photosweep.
//!
//! The [`Pipeline`] requests library access, restores persisted progress,
//! slices the library into segments and runs every category analyzer over
//! them. Per-segment findings are merged by a single writer task with exact
//! byte accounting; progress is persisted on a throttle so an abandoned run
//! resumes where it stopped.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use photosweep_analyze::{ImageFileDecoder, NoTextDetector};
//! use photosweep_core::PipelineConfig;
//! use photosweep_pipeline::{AnalyzerSet, Pipeline};
//! use photosweep_scan::DirectoryLibrary;
//!
//! # async fn run() -> photosweep_core::SweepResult<()> {
//! let config = PipelineConfig::new("/tmp/photosweep-state");
//! let library = Arc::new(DirectoryLibrary::new("/path/to/photos"));
//! let analyzers = AnalyzerSet::standard(
//!     &config,
//!     Arc::new(ImageFileDecoder::new("/path/to/photos")),
//!     Arc::new(NoTextDetector),
//! );
//!
//! let pipeline = Pipeline::new(config, library, analyzers);
//! pipeline.start().await?;
//!
//! let snapshot = pipeline.snapshot();
//! println!("{} bytes reclaimable", snapshot.total_bytes);
//! # Ok(())
//! # }
//! ```

mod analyzers;
mod persist;
mod pipeline;
mod snapshot;
mod writer;

pub use analyzers::AnalyzerSet;
pub use persist::{PersistedState, StateStore};
pub use pipeline::Pipeline;
pub use snapshot::PipelineSnapshot;
pub use writer::{MergeWriter, WRITER_CHANNEL_SIZE};

// Re-export core types for convenience
pub use photosweep_core::{
    Category, CategoryBook, DashboardSnapshot, Phase, PipelineConfig, PipelineState,
};
