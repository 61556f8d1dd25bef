//! Pipeline configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Bytes in one mebibyte.
pub const MIB: i64 = 1024 * 1024;

/// Configuration for the analysis pipeline.
///
/// Distance thresholds are Hamming distances over 64-bit hashes. The
/// duplicate thresholds must not be looser than the similarity ones.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct PipelineConfig {
    /// Directory holding progress, category and segment files.
    #[serde(default)]
    pub state_dir: PathBuf,

    /// Assets per segment.
    #[builder(default = "500")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Persist every N processed segments within a phase.
    #[builder(default = "3")]
    #[serde(default = "default_save_interval")]
    pub save_interval: usize,

    /// Minimum size of a large video.
    #[builder(default = "100 * MIB")]
    #[serde(default = "default_large_video_threshold")]
    pub large_video_threshold: i64,

    /// Maximum pHash distance for similar photos.
    #[builder(default = "18")]
    #[serde(default = "default_similar_phash")]
    pub similar_phash_distance: u32,

    /// Maximum dHash distance for similar photos.
    #[builder(default = "20")]
    #[serde(default = "default_similar_dhash")]
    pub similar_dhash_distance: u32,

    /// Maximum pHash distance for duplicates.
    #[builder(default = "7")]
    #[serde(default = "default_duplicate_phash")]
    pub duplicate_phash_distance: u32,

    /// Maximum dHash distance for duplicates.
    #[builder(default = "9")]
    #[serde(default = "default_duplicate_dhash")]
    pub duplicate_dhash_distance: u32,

    /// Relative aspect ratio difference tolerated between compared assets.
    #[builder(default = "0.15")]
    #[serde(default = "default_aspect_tolerance")]
    pub aspect_ratio_tolerance: f64,

    /// Only compare images sharing pixel dimensions and creation second as
    /// duplicate candidates.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub duplicate_same_capture_only: bool,

    /// Blur scores below this are blurry.
    #[builder(default = "60.0")]
    #[serde(default = "default_blur_cutoff")]
    pub blur_cutoff: f64,

    /// Images with less luma variance than this are flat and never blurry.
    #[builder(default = "90.0")]
    #[serde(default = "default_flat_variance_floor")]
    pub flat_variance_floor: f64,

    /// Recognized characters that make a photo text-bearing.
    #[builder(default = "6")]
    #[serde(default = "default_text_min_characters")]
    pub text_min_characters: usize,

    /// Fraction of the frame covered by text that makes a photo text-bearing.
    #[builder(default = "0.03")]
    #[serde(default = "default_text_min_coverage")]
    pub text_min_coverage: f64,

    /// Entries kept in the fingerprint cache.
    #[builder(default = "20_000")]
    #[serde(default = "default_cache_capacity")]
    pub fingerprint_cache_capacity: usize,

    /// Edge length of the thumbnail decoded for hashing.
    #[builder(default = "64")]
    #[serde(default = "default_fingerprint_sample")]
    pub fingerprint_sample_size: u32,

    /// Edge length of the rendition decoded for blur scoring.
    #[builder(default = "256")]
    #[serde(default = "default_blur_sample")]
    pub blur_sample_size: u32,
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    500
}

fn default_save_interval() -> usize {
    3
}

fn default_large_video_threshold() -> i64 {
    100 * MIB
}

fn default_similar_phash() -> u32 {
    18
}

fn default_similar_dhash() -> u32 {
    20
}

fn default_duplicate_phash() -> u32 {
    7
}

fn default_duplicate_dhash() -> u32 {
    9
}

fn default_aspect_tolerance() -> f64 {
    0.15
}

fn default_blur_cutoff() -> f64 {
    60.0
}

fn default_flat_variance_floor() -> f64 {
    90.0
}

fn default_text_min_characters() -> usize {
    6
}

fn default_text_min_coverage() -> f64 {
    0.03
}

fn default_cache_capacity() -> usize {
    20_000
}

fn default_fingerprint_sample() -> u32 {
    64
}

fn default_blur_sample() -> u32 {
    256
}

impl PipelineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.state_dir {
            Some(ref dir) if dir.as_os_str().is_empty() => {
                return Err("State directory cannot be empty".to_string());
            }
            None => return Err("State directory is required".to_string()),
            _ => {}
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be positive".to_string());
        }
        if self.save_interval == Some(0) {
            return Err("Save interval must be positive".to_string());
        }
        if matches!(self.fingerprint_sample_size, Some(size) if size < 32) {
            return Err("Fingerprint sample size must be at least 32".to_string());
        }
        let similar_p = self.similar_phash_distance.unwrap_or_else(default_similar_phash);
        let similar_d = self.similar_dhash_distance.unwrap_or_else(default_similar_dhash);
        let dup_p = self.duplicate_phash_distance.unwrap_or_else(default_duplicate_phash);
        let dup_d = self.duplicate_dhash_distance.unwrap_or_else(default_duplicate_dhash);
        if dup_p > similar_p || dup_d > similar_d {
            return Err("Duplicate thresholds cannot be looser than similarity thresholds".to_string());
        }
        if matches!(self.aspect_ratio_tolerance, Some(tol) if tol.is_nan() || tol < 0.0) {
            return Err("Aspect ratio tolerance must be non-negative".to_string());
        }
        Ok(())
    }
}

impl PipelineConfig {
    /// Create a new pipeline config builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Create a config with default tuning for a state directory.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            chunk_size: default_chunk_size(),
            save_interval: default_save_interval(),
            large_video_threshold: default_large_video_threshold(),
            similar_phash_distance: default_similar_phash(),
            similar_dhash_distance: default_similar_dhash(),
            duplicate_phash_distance: default_duplicate_phash(),
            duplicate_dhash_distance: default_duplicate_dhash(),
            aspect_ratio_tolerance: default_aspect_tolerance(),
            duplicate_same_capture_only: true,
            blur_cutoff: default_blur_cutoff(),
            flat_variance_floor: default_flat_variance_floor(),
            text_min_characters: default_text_min_characters(),
            text_min_coverage: default_text_min_coverage(),
            fingerprint_cache_capacity: default_cache_capacity(),
            fingerprint_sample_size: default_fingerprint_sample(),
            blur_sample_size: default_blur_sample(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(".photosweep")
    }
}
