//! On-disk cache of materialized segments.
//!
//! Each segment lives in its own `chunk_<index>.json` document tagged with
//! the data format version and the snapshot identity it was computed for.
//! Anything that fails to decode is a cache miss.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use photosweep_core::{AssetRecord, DATA_FORMAT_VERSION, Segment, SweepError, SweepResult};

const SEGMENT_PREFIX: &str = "chunk_";
const SEGMENT_SUFFIX: &str = ".json";

#[derive(Debug, Serialize, Deserialize)]
struct SegmentDocument {
    data_format_version: u32,
    snapshot_id: String,
    index: usize,
    entries: Vec<AssetRecord>,
}

/// A segment read back from disk, with the snapshot it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSegment {
    pub snapshot_id: String,
    pub segment: Segment,
}

/// Directory of cached segments.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    dir: PathBuf,
}

impl SegmentStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of the document for a segment index.
    pub fn locate(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{SEGMENT_PREFIX}{index}{SEGMENT_SUFFIX}"))
    }

    /// Load a cached segment. Missing, corrupt or outdated documents yield `None`.
    pub async fn load(&self, location: &Path) -> Option<StoredSegment> {
        let bytes = tokio::fs::read(location).await.ok()?;
        let doc: SegmentDocument = match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(err) => {
                debug!(path = %location.display(), %err, "discarding undecodable segment");
                return None;
            }
        };
        if doc.data_format_version != DATA_FORMAT_VERSION {
            debug!(
                path = %location.display(),
                version = doc.data_format_version,
                "discarding segment with foreign format version"
            );
            return None;
        }
        Some(StoredSegment {
            snapshot_id: doc.snapshot_id,
            segment: Segment {
                index: doc.index,
                entries: doc.entries,
            },
        })
    }

    /// Persist a segment, replacing any previous document atomically.
    pub async fn save(&self, location: &Path, snapshot_id: &str, segment: &Segment) -> SweepResult<()> {
        let doc = SegmentDocument {
            data_format_version: DATA_FORMAT_VERSION,
            snapshot_id: snapshot_id.to_string(),
            index: segment.index,
            entries: segment.entries.clone(),
        };
        let bytes = serde_json::to_vec(&doc).map_err(|e| SweepError::Other {
            message: format!("failed to encode segment {}: {e}", segment.index),
        })?;
        write_atomic(location, &bytes).await
    }

    /// Delete every cached segment. Returns how many were removed.
    pub async fn clear(&self) -> SweepResult<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(SweepError::io(&self.dir, err)),
        };
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SweepError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SEGMENT_PREFIX) && name.ends_with(SEGMENT_SUFFIX) {
                let path = entry.path();
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| SweepError::io(&path, e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Write `bytes` to a sibling temp file and rename it over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> SweepResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SweepError::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| SweepError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| SweepError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn segment(index: usize) -> Segment {
        Segment {
            index,
            entries: vec![AssetRecord::new("a", 10, 1_700_000_000), AssetRecord::new("b", 20, 0)],
        }
    }

    #[test]
    fn test_locate() {
        let store = SegmentStore::new("/state");
        assert_eq!(store.locate(7), PathBuf::from("/state/chunk_7.json"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let store = SegmentStore::new(temp.path().join("nested"));
        let location = store.locate(3);

        store.save(&location, "snap_2", &segment(3)).await.unwrap();
        let stored = store.load(&location).await.unwrap();
        assert_eq!(stored.snapshot_id, "snap_2");
        assert_eq!(stored.segment, segment(3));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = SegmentStore::new(temp.path());
        let location = store.locate(0);
        std::fs::write(&location, b"{ not json").unwrap();

        assert!(store.load(&location).await.is_none());
        assert!(store.load(&store.locate(99)).await.is_none());
    }

    #[tokio::test]
    async fn test_foreign_version_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let store = SegmentStore::new(temp.path());
        let location = store.locate(0);
        let doc = serde_json::json!({
            "data_format_version": DATA_FORMAT_VERSION + 1,
            "snapshot_id": "x_1",
            "index": 0,
            "entries": [],
        });
        std::fs::write(&location, doc.to_string()).unwrap();

        assert!(store.load(&location).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_only_removes_segments() {
        let temp = TempDir::new().unwrap();
        let store = SegmentStore::new(temp.path());
        store.save(&store.locate(0), "s", &segment(0)).await.unwrap();
        store.save(&store.locate(1), "s", &segment(1)).await.unwrap();
        std::fs::write(temp.path().join("progress.json"), b"{}").unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(temp.path().join("progress.json").exists());
    }
}
