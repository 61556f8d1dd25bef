//! Storage footprint of an asset.

use photosweep_core::AssetHandle;

/// Sum the byte sizes of every storage resource backing an asset.
///
/// Resources without a reported size are skipped; an asset with no sized
/// resources weighs 0 bytes.
pub fn resource_volume(handle: &AssetHandle) -> i64 {
    handle
        .resources
        .iter()
        .filter_map(|r| r.size)
        .filter(|size| *size > 0)
        .fold(0i64, |acc, size| acc.saturating_add(size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use photosweep_core::{AssetResource, MediaType, ResourceKind};

    #[test]
    fn test_live_photo_counts_both_resources() {
        let mut handle = AssetHandle::new("live", MediaType::Image);
        handle.resources = vec![
            AssetResource::sized(ResourceKind::Photo, 3_000_000),
            AssetResource::sized(ResourceKind::PairedVideo, 2_500_000),
            AssetResource {
                kind: ResourceKind::AdjustmentData,
                size: None,
            },
        ];
        assert_eq!(resource_volume(&handle), 5_500_000);
    }

    #[test]
    fn test_no_resources_is_zero() {
        let handle = AssetHandle::new("bare", MediaType::Video);
        assert_eq!(resource_volume(&handle), 0);
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let mut handle = AssetHandle::new("huge", MediaType::Video);
        handle.resources = vec![
            AssetResource::sized(ResourceKind::Video, i64::MAX),
            AssetResource::sized(ResourceKind::Other, 10),
        ];
        assert_eq!(resource_volume(&handle), i64::MAX);
    }
}
