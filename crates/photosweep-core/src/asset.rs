//! Asset identity, metadata records and library handles.

use std::borrow::Borrow;
use std::fmt;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Stable, opaque identifier of one physical library item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(CompactString);

impl AssetId {
    /// Create a new asset id.
    pub fn new(id: impl Into<CompactString>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

/// One library item as seen by the pipeline.
///
/// Records are never mutated in place; re-materializing a segment replaces
/// them wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Primary key.
    pub id: AssetId,
    /// Sum of all storage resources backing the asset.
    pub size_bytes: i64,
    /// Creation time in epoch seconds (0 when unknown).
    pub created_at: i64,
}

impl AssetRecord {
    /// Create a new record.
    pub fn new(id: impl Into<AssetId>, size_bytes: i64, created_at: i64) -> Self {
        Self {
            id: id.into(),
            size_bytes,
            created_at,
        }
    }
}

/// Kind of media an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
    Audio,
    #[default]
    Unknown,
}

/// Subtype flags reported by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaSubtypes {
    /// Captured as a screenshot.
    pub screenshot: bool,
    /// Still image paired with a short motion clip.
    pub live_photo: bool,
}

/// Kind of storage resource backing an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Photo,
    Video,
    PairedVideo,
    AdjustmentData,
    Other,
}

/// One storage resource of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResource {
    pub kind: ResourceKind,
    /// Size in bytes, if the library could report it.
    pub size: Option<i64>,
}

impl AssetResource {
    /// Create a resource with a known size.
    pub fn sized(kind: ResourceKind, size: i64) -> Self {
        Self {
            kind,
            size: Some(size),
        }
    }
}

/// Live view of a library item, resolved on demand from the library provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHandle {
    pub id: AssetId,
    pub media_type: MediaType,
    #[serde(default)]
    pub subtypes: MediaSubtypes,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Creation time in epoch seconds.
    pub created_at: Option<i64>,
    /// Duration in seconds for time-based media.
    pub duration: Option<f64>,
    #[serde(default)]
    pub resources: Vec<AssetResource>,
}

impl AssetHandle {
    /// Create a handle with no subtypes and no resources.
    pub fn new(id: impl Into<AssetId>, media_type: MediaType) -> Self {
        Self {
            id: id.into(),
            media_type,
            subtypes: MediaSubtypes::default(),
            pixel_width: 0,
            pixel_height: 0,
            created_at: None,
            duration: None,
            resources: Vec::new(),
        }
    }

    /// Check if this is a still image.
    pub fn is_image(&self) -> bool {
        self.media_type == MediaType::Image
    }

    /// Check if this is a video.
    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    /// Width over height, if both dimensions are known.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.pixel_width == 0 || self.pixel_height == 0 {
            return None;
        }
        Some(self.pixel_width as f64 / self.pixel_height as f64)
    }
}

/// A fixed-size slice of the library's identifier list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the ordered partition.
    pub index: usize,
    /// Records for the slice, in snapshot order.
    pub entries: Vec<AssetRecord>,
}

impl Segment {
    /// Number of entries in this segment.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the segment has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &AssetId> {
        self.entries.iter().map(|e| &e.id)
    }
}
