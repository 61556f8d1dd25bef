//! Visual fingerprints and category analyzers for photosweep.
//!
//! Every analyzer is a stateless [`CategoryAnalyzer`] over one segment's
//! assets ([`BatchItem`]s) and reports [`CategoryFindings`]:
//!
//! - **Primary** - screenshots, live photos, videos, selfies and back-camera
//!   photos from metadata alone
//! - **Similarity** / **Duplicate** - pairwise perceptual and difference
//!   hash comparison, clustered transitively
//! - **Large video** - videos above a byte threshold
//! - **Blurry** - Laplacian variance below a cutoff
//! - **Text** - two-pass text detection through a [`TextDetector`]
//!
//! Bitmaps come from a [`MediaDecoder`]. Fingerprints are cached by asset id
//! in a bounded [`FingerprintCache`] shared between analyzers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use photosweep_analyze::{
//!     CategoryAnalyzer, FingerprintCache, Fingerprinter, ImageFileDecoder, SimilarityAnalyzer,
//! };
//!
//! # fn run(batch: &[photosweep_analyze::BatchItem]) {
//! let decoder = Arc::new(ImageFileDecoder::new("/path/to/photos"));
//! let fingerprinter = Fingerprinter::new(decoder, Arc::new(FingerprintCache::default()), 64);
//! let analyzer = SimilarityAnalyzer::new(fingerprinter, 18, 20);
//!
//! for found in analyzer.analyze(batch) {
//!     println!("{}: {:?}", found.category, found.findings);
//! }
//! # }
//! ```

mod batch;
mod blurry;
mod cache;
pub mod camera;
mod decoder;
mod duplicate;
pub mod fingerprint;
mod frames;
mod grouping;
mod large_video;
mod primary;
mod provider;
mod similarity;
mod text;

pub use batch::{BatchItem, CategoryAnalyzer, CategoryFindings, Findings, GroupFindings};
pub use blurry::BlurryAnalyzer;
pub use cache::{DEFAULT_CACHE_CAPACITY, Fingerprint, FingerprintCache, Fingerprinter};
pub use camera::{CameraFacing, classify_facing};
pub use decoder::{ImageFileDecoder, read_capture_metadata};
pub use duplicate::DuplicateAnalyzer;
pub use fingerprint::{blur_score, difference_hash, hamming_distance, luma_variance, perceptual_hash};
pub use frames::{FRAME_PROBES, representative_image};
pub use grouping::{aspect_ratios_match, cluster_pairs};
pub use large_video::LargeVideoAnalyzer;
pub use primary::{PrimaryAnalyzer, PrimaryClassification};
pub use provider::{CaptureMetadata, MediaDecoder, NoTextDetector, TextDetection, TextDetector};
pub use similarity::SimilarityAnalyzer;
pub use text::{COARSE_SAMPLE, FINE_SAMPLE, TextAnalyzer};

// Re-export core types for convenience
pub use photosweep_core::{AssetHandle, AssetId, AssetRecord, Category};
