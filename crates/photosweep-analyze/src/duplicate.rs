//! Duplicate grouping: exact or near-exact re-encodes of one capture.

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::debug;

use photosweep_core::{AssetId, Category, Phase, PipelineConfig};

use crate::batch::{BatchItem, CategoryAnalyzer, CategoryFindings, GroupFindings};
use crate::cache::{Fingerprint, Fingerprinter};
use crate::fingerprint::hamming_distance;
use crate::grouping::{aspect_ratios_match, cluster_pairs};

type CaptureKey = (u32, u32, Option<i64>);

/// Groups still images whose hashes are within the tight duplicate
/// thresholds.
///
/// With `same_capture_only`, candidates are first bucketed by pixel
/// dimensions and creation second, and only compared within a bucket.
pub struct DuplicateAnalyzer {
    fingerprinter: Fingerprinter,
    phash_distance: u32,
    dhash_distance: u32,
    aspect_tolerance: f64,
    same_capture_only: bool,
}

impl DuplicateAnalyzer {
    pub fn new(fingerprinter: Fingerprinter, phash_distance: u32, dhash_distance: u32) -> Self {
        Self {
            fingerprinter,
            phash_distance,
            dhash_distance,
            aspect_tolerance: 0.15,
            same_capture_only: true,
        }
    }

    pub fn from_config(fingerprinter: Fingerprinter, config: &PipelineConfig) -> Self {
        let mut analyzer = Self::new(
            fingerprinter,
            config.duplicate_phash_distance,
            config.duplicate_dhash_distance,
        );
        analyzer.aspect_tolerance = config.aspect_ratio_tolerance;
        analyzer.same_capture_only = config.duplicate_same_capture_only;
        analyzer
    }

    pub fn with_same_capture_only(mut self, enabled: bool) -> Self {
        self.same_capture_only = enabled;
        self
    }

    fn capture_key(&self, item: &BatchItem) -> CaptureKey {
        if self.same_capture_only {
            (
                item.handle.pixel_width,
                item.handle.pixel_height,
                item.handle.created_at,
            )
        } else {
            (0, 0, None)
        }
    }

    fn is_duplicate(&self, a: &(&BatchItem, Fingerprint), b: &(&BatchItem, Fingerprint)) -> bool {
        let ((item_a, fp_a), (item_b, fp_b)) = (a, b);
        aspect_ratios_match(
            item_a.handle.aspect_ratio().or(fp_a.aspect_ratio()),
            item_b.handle.aspect_ratio().or(fp_b.aspect_ratio()),
            self.aspect_tolerance,
        ) && hamming_distance(fp_a.phash, fp_b.phash) <= self.phash_distance
            && hamming_distance(fp_a.dhash, fp_b.dhash) <= self.dhash_distance
    }
}

impl CategoryAnalyzer for DuplicateAnalyzer {
    fn phase(&self) -> Phase {
        Phase::Duplication
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        let mut buckets: IndexMap<CaptureKey, Vec<&BatchItem>> = IndexMap::new();
        for item in batch.iter().filter(|item| item.handle.is_image()) {
            buckets.entry(self.capture_key(item)).or_default().push(item);
        }

        let clusters: Vec<Vec<AssetId>> = buckets
            .values()
            .filter(|bucket| bucket.len() >= 2)
            .flat_map(|bucket| {
                let fingerprinted: Vec<(&BatchItem, Fingerprint)> = bucket
                    .par_iter()
                    .filter_map(|&item| Some((item, self.fingerprinter.fingerprint(&item.handle)?)))
                    .collect();
                cluster_pairs(&fingerprinted, |(item, _)| item.id(), |a, b| self.is_duplicate(a, b))
            })
            .collect();

        debug!(
            assets = batch.len(),
            buckets = buckets.len(),
            clusters = clusters.len(),
            "duplicate pass"
        );
        vec![CategoryFindings::groups(
            Category::Duplicate,
            GroupFindings::from_clusters(clusters, batch),
        )]
    }
}
