//! Text-bearing photo detection.

use std::sync::Arc;

use rayon::prelude::*;

use photosweep_core::{Category, Phase, PipelineConfig};

use crate::batch::{BatchItem, CategoryAnalyzer, CategoryFindings};
use crate::provider::{MediaDecoder, TextDetector};

/// Longest edge of the rendition used for the coarse region check.
pub const COARSE_SAMPLE: u32 = 160;
/// Longest edge of the rendition used for recognition.
pub const FINE_SAMPLE: u32 = 512;

/// Selects images carrying readable text.
///
/// A cheap region check on a small rendition gates recognition on a larger
/// one. An image qualifies with enough recognized characters or enough
/// covered area.
pub struct TextAnalyzer {
    decoder: Arc<dyn MediaDecoder>,
    detector: Arc<dyn TextDetector>,
    min_characters: usize,
    min_coverage: f64,
}

impl TextAnalyzer {
    pub fn new(decoder: Arc<dyn MediaDecoder>, detector: Arc<dyn TextDetector>) -> Self {
        Self {
            decoder,
            detector,
            min_characters: 6,
            min_coverage: 0.03,
        }
    }

    pub fn from_config(
        decoder: Arc<dyn MediaDecoder>,
        detector: Arc<dyn TextDetector>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            decoder,
            detector,
            min_characters: config.text_min_characters,
            min_coverage: config.text_min_coverage,
        }
    }

    fn has_text(&self, item: &BatchItem) -> bool {
        let Some(coarse) = self.decoder.decode_image(&item.handle, COARSE_SAMPLE) else {
            return false;
        };
        if !self.detector.has_text_regions(&coarse) {
            return false;
        }
        let Some(fine) = self.decoder.decode_image(&item.handle, FINE_SAMPLE) else {
            return false;
        };
        self.detector
            .recognize(&fine)
            .is_some_and(|d| d.char_count >= self.min_characters || d.coverage >= self.min_coverage)
    }
}

impl CategoryAnalyzer for TextAnalyzer {
    fn phase(&self) -> Phase {
        Phase::TextDetection
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        let texty = batch
            .par_iter()
            .filter(|item| item.handle.is_image() && self.has_text(item))
            .map(|item| item.record.clone())
            .collect();
        vec![CategoryFindings::singles(Category::Text, texty)]
    }
}
