//! Blurry photo detection.

use std::sync::Arc;

use rayon::prelude::*;

use photosweep_core::{Category, Phase, PipelineConfig};

use crate::batch::{BatchItem, CategoryAnalyzer, CategoryFindings};
use crate::fingerprint::{blur_score, luma_variance};
use crate::provider::MediaDecoder;

/// Selects images whose Laplacian variance falls below `cutoff`.
///
/// Frames with almost no luma variation (solid colours, black frames) are
/// not blurry, just flat, and are skipped.
pub struct BlurryAnalyzer {
    decoder: Arc<dyn MediaDecoder>,
    cutoff: f64,
    flat_floor: f64,
    sample_size: u32,
}

impl BlurryAnalyzer {
    pub fn new(decoder: Arc<dyn MediaDecoder>, cutoff: f64) -> Self {
        Self {
            decoder,
            cutoff,
            flat_floor: 90.0,
            sample_size: 256,
        }
    }

    pub fn from_config(decoder: Arc<dyn MediaDecoder>, config: &PipelineConfig) -> Self {
        Self {
            decoder,
            cutoff: config.blur_cutoff,
            flat_floor: config.flat_variance_floor,
            sample_size: config.blur_sample_size,
        }
    }

    fn is_blurry(&self, item: &BatchItem) -> bool {
        let Some(image) = self.decoder.decode_image(&item.handle, self.sample_size) else {
            return false;
        };
        if luma_variance(&image) < self.flat_floor {
            return false;
        }
        blur_score(&image) < self.cutoff
    }
}

impl CategoryAnalyzer for BlurryAnalyzer {
    fn phase(&self) -> Phase {
        Phase::BlurDetection
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        let blurry = batch
            .par_iter()
            .filter(|item| item.handle.is_image() && self.is_blurry(item))
            .map(|item| item.record.clone())
            .collect();
        vec![CategoryFindings::singles(Category::Blurry, blurry)]
    }
}
