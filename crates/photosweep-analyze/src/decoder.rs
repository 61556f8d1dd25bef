//! Decoder for assets stored as files under a directory root.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use exif::{In, Reader, Tag, Value};
use image::DynamicImage;
use tracing::trace;

use photosweep_core::AssetHandle;

use crate::provider::{CaptureMetadata, MediaDecoder};

/// Decodes image files whose asset id is their path relative to `root`.
///
/// Video frames are not extracted; videos are skipped by every
/// fingerprinting analyzer.
#[derive(Debug, Clone)]
pub struct ImageFileDecoder {
    root: PathBuf,
}

impl ImageFileDecoder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, handle: &AssetHandle) -> PathBuf {
        self.root.join(handle.id.as_str())
    }
}

impl MediaDecoder for ImageFileDecoder {
    fn decode_image(&self, handle: &AssetHandle, target: u32) -> Option<DynamicImage> {
        if !handle.is_image() {
            return None;
        }
        let path = self.path_of(handle);
        let image = match image::open(&path) {
            Ok(image) => image,
            Err(err) => {
                trace!(path = %path.display(), %err, "undecodable image");
                return None;
            }
        };
        if image.width() > target || image.height() > target {
            Some(image.thumbnail(target, target))
        } else {
            Some(image)
        }
    }

    fn capture_metadata(&self, handle: &AssetHandle) -> Option<CaptureMetadata> {
        if !handle.is_image() {
            return None;
        }
        read_capture_metadata(&self.path_of(handle))
    }
}

/// Read the lens model from a file's EXIF block.
pub fn read_capture_metadata(path: &Path) -> Option<CaptureMetadata> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;

    let lens_model = exif
        .get_field(Tag::LensModel, In::PRIMARY)
        .and_then(|field| ascii_value(&field.value));
    Some(CaptureMetadata {
        lens_model,
        camera_type: None,
    })
}

fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\0').to_string()),
        _ => None,
    }
}
