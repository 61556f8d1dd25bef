//! The analyzer behind every phase.

use std::sync::Arc;

use photosweep_analyze::{
    BlurryAnalyzer, CategoryAnalyzer, DuplicateAnalyzer, FingerprintCache, Fingerprinter,
    LargeVideoAnalyzer, MediaDecoder, PrimaryAnalyzer, SimilarityAnalyzer, TextAnalyzer,
    TextDetector,
};
use photosweep_core::{AssetId, Phase, PipelineConfig};

/// One analyzer per phase, plus the fingerprint cache they share.
#[derive(Clone)]
pub struct AnalyzerSet {
    pub primary: Arc<dyn CategoryAnalyzer>,
    pub similarity: Arc<dyn CategoryAnalyzer>,
    pub duplication: Arc<dyn CategoryAnalyzer>,
    pub oversized: Arc<dyn CategoryAnalyzer>,
    pub blur: Arc<dyn CategoryAnalyzer>,
    pub text: Arc<dyn CategoryAnalyzer>,
    pub fingerprints: Option<Arc<FingerprintCache>>,
}

impl AnalyzerSet {
    /// The standard analyzers, configured from `config`.
    pub fn standard(
        config: &PipelineConfig,
        decoder: Arc<dyn MediaDecoder>,
        detector: Arc<dyn TextDetector>,
    ) -> Self {
        let cache = Arc::new(FingerprintCache::new(config.fingerprint_cache_capacity));
        let fingerprinter = Fingerprinter::new(
            decoder.clone(),
            cache.clone(),
            config.fingerprint_sample_size,
        );
        Self {
            primary: Arc::new(PrimaryAnalyzer::new(decoder.clone())),
            similarity: Arc::new(SimilarityAnalyzer::from_config(fingerprinter.clone(), config)),
            duplication: Arc::new(DuplicateAnalyzer::from_config(fingerprinter, config)),
            oversized: Arc::new(LargeVideoAnalyzer::new(config.large_video_threshold)),
            blur: Arc::new(BlurryAnalyzer::from_config(decoder.clone(), config)),
            text: Arc::new(TextAnalyzer::from_config(decoder, detector, config)),
            fingerprints: Some(cache),
        }
    }

    /// Analyzer for a phase.
    pub fn for_phase(&self, phase: Phase) -> Arc<dyn CategoryAnalyzer> {
        match phase {
            Phase::Primary => self.primary.clone(),
            Phase::Similarity => self.similarity.clone(),
            Phase::Duplication => self.duplication.clone(),
            Phase::Oversized => self.oversized.clone(),
            Phase::BlurDetection => self.blur.clone(),
            Phase::TextDetection => self.text.clone(),
        }
    }

    /// Drop cached fingerprints of removed assets.
    pub fn forget<'a>(&self, ids: impl IntoIterator<Item = &'a AssetId>) {
        if let Some(cache) = &self.fingerprints {
            cache.forget(ids);
        }
    }
}
