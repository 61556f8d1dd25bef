//! Metadata-only classification: screenshots, live photos, videos and the
//! camera-facing split.

use std::sync::Arc;

use photosweep_core::{AssetRecord, Category, Phase};

use crate::batch::{BatchItem, CategoryAnalyzer, CategoryFindings};
use crate::camera::{CameraFacing, classify_facing};
use crate::provider::MediaDecoder;

/// Records per primary category for one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryClassification {
    pub screenshots: Vec<AssetRecord>,
    pub live_photos: Vec<AssetRecord>,
    pub videos: Vec<AssetRecord>,
    pub selfies: Vec<AssetRecord>,
    pub back_camera: Vec<AssetRecord>,
}

impl PrimaryClassification {
    /// Classify from asset metadata alone, leaving the camera split empty.
    pub fn light(batch: &[BatchItem]) -> Self {
        let mut out = Self::default();
        for item in batch {
            let handle = &item.handle;
            if handle.is_image() && handle.subtypes.screenshot {
                out.screenshots.push(item.record.clone());
            }
            if handle.subtypes.live_photo {
                out.live_photos.push(item.record.clone());
            }
            if handle.is_video() {
                out.videos.push(item.record.clone());
            }
        }
        out
    }

    /// Split into per-category findings. With `light_only`, the camera
    /// categories are left out.
    pub fn into_findings(self, light_only: bool) -> Vec<CategoryFindings> {
        let mut findings = vec![
            CategoryFindings::singles(Category::Screenshot, self.screenshots),
            CategoryFindings::singles(Category::LivePhoto, self.live_photos),
            CategoryFindings::singles(Category::Video, self.videos),
        ];
        if !light_only {
            findings.push(CategoryFindings::singles(Category::Selfie, self.selfies));
            findings.push(CategoryFindings::singles(Category::BackCamera, self.back_camera));
        }
        findings
    }
}

/// Phase A analyzer.
pub struct PrimaryAnalyzer {
    decoder: Arc<dyn MediaDecoder>,
}

impl PrimaryAnalyzer {
    pub fn new(decoder: Arc<dyn MediaDecoder>) -> Self {
        Self { decoder }
    }

    pub fn classify(&self, batch: &[BatchItem]) -> PrimaryClassification {
        let mut out = PrimaryClassification::light(batch);
        for item in batch.iter().filter(|item| item.handle.is_image()) {
            let facing = self
                .decoder
                .capture_metadata(&item.handle)
                .as_ref()
                .and_then(classify_facing);
            match facing {
                Some(CameraFacing::Front) => out.selfies.push(item.record.clone()),
                Some(CameraFacing::Back) => out.back_camera.push(item.record.clone()),
                None => {}
            }
        }
        out
    }
}

impl CategoryAnalyzer for PrimaryAnalyzer {
    fn phase(&self) -> Phase {
        Phase::Primary
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        self.classify(batch).into_findings(false)
    }
}
