//! Core types and traits for photosweep.
//!
//! This crate provides the data model shared by the scanning, analysis and
//! pipeline crates: asset records and handles, category accumulators with
//! their merge rules, the resumability cursor, the dashboard projection and
//! the pipeline configuration.
//!
//! # Category accounting
//!
//! ```rust
//! use photosweep_core::{AssetRecord, Category, CategoryBook};
//!
//! let mut book = CategoryBook::new();
//! let added = book.merge_single(Category::Screenshot, vec![AssetRecord::new("a", 100, 0)]);
//! assert_eq!(added, 100);
//!
//! // Merging the same result again adds nothing.
//! let added = book.merge_single(Category::Screenshot, vec![AssetRecord::new("a", 100, 0)]);
//! assert_eq!(added, 0);
//! ```

mod asset;
mod category;
mod config;
mod dashboard;
mod error;
mod progress;
mod state;
mod union_find;

pub use asset::{
    AssetHandle, AssetId, AssetRecord, AssetResource, MediaSubtypes, MediaType, ResourceKind,
    Segment,
};
pub use category::{Category, CategoryBook, GroupedCategory, SingleCategory};
pub use config::{MIB, PipelineConfig, PipelineConfigBuilder};
pub use dashboard::{DashboardCell, DashboardSnapshot, REPRESENTATIVE_COUNT};
pub use error::{SweepError, SweepResult};
pub use progress::{Phase, ProgressCursor};
pub use state::{
    AuthorizationStatus, GuidanceAction, PermissionGuidance, PhaseProgress, PipelineState,
};
pub use union_find::{DisjointSet, IdUnion};

/// Version tag of every persisted document. Documents with another version
/// are treated as absent.
pub const DATA_FORMAT_VERSION: u32 = 1;
