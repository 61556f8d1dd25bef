//! Selfie vs back-camera split.

use crate::provider::CaptureMetadata;

/// Which side of the device captured a photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

fn facing_from_hint(hint: &str) -> Option<CameraFacing> {
    let hint = hint.to_lowercase();
    if hint.contains("front") {
        Some(CameraFacing::Front)
    } else if hint.contains("back") || hint.contains("rear") {
        Some(CameraFacing::Back)
    } else {
        None
    }
}

/// Resolve the facing from the lens model, then the maker camera type.
/// `None` when neither names a side.
pub fn classify_facing(metadata: &CaptureMetadata) -> Option<CameraFacing> {
    metadata
        .lens_model
        .as_deref()
        .and_then(facing_from_hint)
        .or_else(|| metadata.camera_type.as_deref().and_then(facing_from_hint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lens(model: &str) -> CaptureMetadata {
        CaptureMetadata {
            lens_model: Some(model.to_string()),
            camera_type: None,
        }
    }

    #[test]
    fn test_lens_model_wins() {
        assert_eq!(
            classify_facing(&lens("iPhone 14 Pro front TrueDepth camera 2.69mm f/1.9")),
            Some(CameraFacing::Front)
        );
        assert_eq!(
            classify_facing(&lens("iPhone 14 Pro back triple camera 6.86mm f/1.78")),
            Some(CameraFacing::Back)
        );
    }

    #[test]
    fn test_falls_back_to_camera_type() {
        let metadata = CaptureMetadata {
            lens_model: Some("50mm f/1.8".to_string()),
            camera_type: Some("Rear".to_string()),
        };
        assert_eq!(classify_facing(&metadata), Some(CameraFacing::Back));
    }

    #[test]
    fn test_unknown_is_excluded() {
        assert_eq!(classify_facing(&CaptureMetadata::default()), None);
        assert_eq!(classify_facing(&lens("EF 24-70mm f/2.8L")), None);
    }
}
