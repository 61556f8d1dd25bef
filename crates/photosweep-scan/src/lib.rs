//! Library access and segment scheduling for photosweep.
//!
//! This crate sits between the pipeline and the photo library:
//!
//! - [`PhotoLibrary`] is the seam to the platform library (authorization,
//!   newest-first fetch, per-id resolution, change notifications)
//! - [`resource_volume`] weighs an asset by its storage resources
//! - [`SegmentScheduler`] slices the library snapshot into fixed-size
//!   segments and materializes them on demand
//! - [`SegmentStore`] caches materialized segments as JSON documents
//!
//! Two libraries ship with the crate: [`DirectoryLibrary`] walks a directory
//! tree with jwalk, and [`MemoryLibrary`] holds handles in memory.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use photosweep_scan::{DirectoryLibrary, PhotoLibrary, SegmentScheduler, SegmentStore};
//!
//! # async fn run() {
//! let library = Arc::new(DirectoryLibrary::new("/path/to/photos"));
//! let ids = library.fetch_all_assets().await.into_iter().map(|h| h.id).collect();
//!
//! let scheduler = SegmentScheduler::new(library, SegmentStore::new("/tmp/state"), 500);
//! scheduler.configure(ids).await;
//!
//! for index in 0..scheduler.segment_count().await {
//!     if let Some(segment) = scheduler.materialize(index).await {
//!         println!("segment {index}: {} assets", segment.len());
//!     }
//! }
//! # }
//! ```

mod directory;
mod library;
mod memory;
mod scheduler;
mod store;
mod volume;

pub use directory::DirectoryLibrary;
pub use library::{CHANGE_CHANNEL_SIZE, LibraryChange, PhotoLibrary};
pub use memory::MemoryLibrary;
pub use scheduler::{SegmentScheduler, segment_count_for, snapshot_identity};
pub use store::{SegmentStore, StoredSegment, write_atomic};
pub use volume::resource_volume;

// Re-export core types for convenience
pub use photosweep_core::{AssetHandle, AssetId, AssetRecord, Segment};
