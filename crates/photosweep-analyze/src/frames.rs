//! Representative stills for fingerprinting.

use image::DynamicImage;
use tracing::trace;

use photosweep_core::{AssetHandle, MediaType};

use crate::provider::MediaDecoder;

/// Fractions of a video's duration probed for a representative frame, in order.
pub const FRAME_PROBES: [f64; 4] = [0.5, 0.25, 0.75, 0.0];

/// Decode an image, or the first extractable probe frame of a video.
///
/// Videos without a known duration are only probed at the start.
pub fn representative_image(
    decoder: &dyn MediaDecoder,
    handle: &AssetHandle,
    target: u32,
) -> Option<DynamicImage> {
    match handle.media_type {
        MediaType::Image => decoder.decode_image(handle, target),
        MediaType::Video => {
            let duration = handle.duration.filter(|d| d.is_finite() && *d > 0.0);
            let Some(duration) = duration else {
                return decoder.extract_frame(handle, 0.0, target);
            };
            let frame = FRAME_PROBES
                .iter()
                .find_map(|probe| decoder.extract_frame(handle, duration * probe, target));
            if frame.is_none() {
                trace!(id = %handle.id, "no frame could be extracted");
            }
            frame
        }
        MediaType::Audio | MediaType::Unknown => None,
    }
}
