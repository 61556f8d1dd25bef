//! Media providers consumed by the analyzers.
//!
//! Decoding and text detection are platform capabilities. Every provider
//! method absorbs its own failures and answers `None` (or `false`) for an
//! asset it cannot handle, so one bad asset never stalls a segment.

use image::DynamicImage;

use photosweep_core::AssetHandle;

/// Capture metadata relevant to the camera-facing split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureMetadata {
    /// EXIF `LensModel`, e.g. "iPhone 14 front camera 2.69mm f/1.9".
    pub lens_model: Option<String>,
    /// Maker-note camera type hint.
    pub camera_type: Option<String>,
}

/// Result of a text recognition pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextDetection {
    /// Number of recognized characters.
    pub char_count: usize,
    /// Fraction of the frame covered by recognized regions, `0.0..=1.0`.
    pub coverage: f64,
}

/// Produces decoded bitmaps for assets.
pub trait MediaDecoder: Send + Sync {
    /// Decode an image asset so that its longest edge is at most `target`.
    fn decode_image(&self, handle: &AssetHandle, target: u32) -> Option<DynamicImage>;

    /// Extract one frame of a video asset at `at_seconds`.
    fn extract_frame(
        &self,
        handle: &AssetHandle,
        at_seconds: f64,
        target: u32,
    ) -> Option<DynamicImage> {
        let _ = (handle, at_seconds, target);
        None
    }

    /// Read capture metadata for an image asset.
    fn capture_metadata(&self, handle: &AssetHandle) -> Option<CaptureMetadata> {
        let _ = handle;
        None
    }
}

/// Detects text in decoded bitmaps.
pub trait TextDetector: Send + Sync {
    /// Cheap check for text-like regions.
    fn has_text_regions(&self, image: &DynamicImage) -> bool {
        self.recognize(image).is_some_and(|d| d.char_count > 0)
    }

    /// Full recognition pass.
    fn recognize(&self, image: &DynamicImage) -> Option<TextDetection>;
}

/// Text detector that never finds text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextDetector;

impl TextDetector for NoTextDetector {
    fn has_text_regions(&self, _image: &DynamicImage) -> bool {
        false
    }

    fn recognize(&self, _image: &DynamicImage) -> Option<TextDetection> {
        None
    }
}
