//! Near-duplicate grouping: crops, filters, minor edits.

use rayon::prelude::*;
use tracing::debug;

use photosweep_core::{Category, Phase, PipelineConfig};

use crate::batch::{BatchItem, CategoryAnalyzer, CategoryFindings, GroupFindings};
use crate::cache::{Fingerprint, Fingerprinter};
use crate::fingerprint::hamming_distance;
use crate::grouping::{aspect_ratios_match, cluster_pairs};

/// Groups images (and videos, through a representative frame) whose
/// perceptual and difference hashes are both within threshold.
///
/// Images are never paired with videos.
pub struct SimilarityAnalyzer {
    fingerprinter: Fingerprinter,
    phash_distance: u32,
    dhash_distance: u32,
    aspect_tolerance: f64,
}

impl SimilarityAnalyzer {
    pub fn new(fingerprinter: Fingerprinter, phash_distance: u32, dhash_distance: u32) -> Self {
        Self {
            fingerprinter,
            phash_distance,
            dhash_distance,
            aspect_tolerance: 0.15,
        }
    }

    pub fn from_config(fingerprinter: Fingerprinter, config: &PipelineConfig) -> Self {
        Self::new(
            fingerprinter,
            config.similar_phash_distance,
            config.similar_dhash_distance,
        )
        .with_aspect_tolerance(config.aspect_ratio_tolerance)
    }

    pub fn with_aspect_tolerance(mut self, tolerance: f64) -> Self {
        self.aspect_tolerance = tolerance;
        self
    }

    fn is_similar(&self, a: &(&BatchItem, Fingerprint), b: &(&BatchItem, Fingerprint)) -> bool {
        let ((item_a, fp_a), (item_b, fp_b)) = (a, b);
        item_a.handle.media_type == item_b.handle.media_type
            && aspect_ratios_match(
                item_a.handle.aspect_ratio().or(fp_a.aspect_ratio()),
                item_b.handle.aspect_ratio().or(fp_b.aspect_ratio()),
                self.aspect_tolerance,
            )
            && hamming_distance(fp_a.phash, fp_b.phash) <= self.phash_distance
            && hamming_distance(fp_a.dhash, fp_b.dhash) <= self.dhash_distance
    }
}

impl CategoryAnalyzer for SimilarityAnalyzer {
    fn phase(&self) -> Phase {
        Phase::Similarity
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        let fingerprinted: Vec<(&BatchItem, Fingerprint)> = batch
            .par_iter()
            .filter(|item| item.handle.is_image() || item.handle.is_video())
            .filter_map(|item| Some((item, self.fingerprinter.fingerprint(&item.handle)?)))
            .collect();

        let clusters = cluster_pairs(&fingerprinted, |(item, _)| item.id(), |a, b| self.is_similar(a, b));
        debug!(
            assets = batch.len(),
            fingerprinted = fingerprinted.len(),
            clusters = clusters.len(),
            "similarity pass"
        );
        vec![CategoryFindings::groups(
            Category::Similar,
            GroupFindings::from_clusters(clusters, batch),
        )]
    }
}
