//! Segment scheduling over a library snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use photosweep_core::{AssetId, AssetRecord, Segment};

use crate::library::PhotoLibrary;
use crate::store::SegmentStore;
use crate::volume::resource_volume;

/// Identity of an ordered id list: a content digest plus the list length.
pub fn snapshot_identity(ids: &[AssetId]) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in ids {
        hasher.update(id.as_str().as_bytes());
        hasher.update(&[0]);
    }
    let digest = hasher.finalize().to_hex();
    format!("{}_{}", &digest[..16], ids.len())
}

/// Number of segments needed to cover `len` ids.
pub fn segment_count_for(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

#[derive(Debug, Default)]
struct SchedulerState {
    ids: Vec<AssetId>,
    snapshot_id: String,
}

/// Partitions the library's ordered id list into fixed-size segments.
///
/// Every operation holds the scheduler lock until it completes, so phases
/// running concurrently never observe a half-replaced id list or write the
/// same segment document twice at once.
pub struct SegmentScheduler {
    library: Arc<dyn PhotoLibrary>,
    store: SegmentStore,
    chunk_size: usize,
    state: Mutex<SchedulerState>,
}

impl SegmentScheduler {
    /// Create a scheduler. Call [`configure`](Self::configure) before materializing.
    pub fn new(library: Arc<dyn PhotoLibrary>, store: SegmentStore, chunk_size: usize) -> Self {
        Self {
            library,
            store,
            chunk_size: chunk_size.max(1),
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Replace the ordered id list. Returns the new snapshot identity.
    pub async fn configure(&self, ids: Vec<AssetId>) -> String {
        let mut state = self.state.lock().await;
        state.snapshot_id = snapshot_identity(&ids);
        state.ids = ids;
        debug!(
            snapshot = %state.snapshot_id,
            segments = segment_count_for(state.ids.len(), self.chunk_size),
            "scheduler configured"
        );
        state.snapshot_id.clone()
    }

    /// Number of segments in the current snapshot.
    pub async fn segment_count(&self) -> usize {
        let state = self.state.lock().await;
        segment_count_for(state.ids.len(), self.chunk_size)
    }

    /// Compute or load the segment at `index`.
    ///
    /// Cached segments are returned as-is when they were recorded for the
    /// current snapshot. Otherwise the slice is resolved against the library,
    /// persisted, and returned. Ids the library can no longer resolve are
    /// left out.
    pub async fn materialize(&self, index: usize) -> Option<Segment> {
        let state = self.state.lock().await;
        let count = segment_count_for(state.ids.len(), self.chunk_size);
        if index >= count {
            return None;
        }

        let location = self.store.locate(index);
        if let Some(stored) = self.store.load(&location).await {
            if stored.snapshot_id == state.snapshot_id && stored.segment.index == index {
                return Some(stored.segment);
            }
            debug!(index, "cached segment belongs to another snapshot");
        }

        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(state.ids.len());
        let slice = &state.ids[start..end];

        let mut handles: HashMap<AssetId, _> = self
            .library
            .resolve_many(slice)
            .await
            .into_iter()
            .map(|h| (h.id.clone(), h))
            .collect();

        let entries: Vec<AssetRecord> = slice
            .iter()
            .filter_map(|id| {
                let handle = handles.remove(id)?;
                Some(AssetRecord {
                    id: id.clone(),
                    size_bytes: resource_volume(&handle),
                    created_at: handle.created_at.unwrap_or(0),
                })
            })
            .collect();
        if entries.len() < slice.len() {
            debug!(index, missing = slice.len() - entries.len(), "unresolvable assets skipped");
        }

        let segment = Segment { index, entries };
        if let Err(err) = self.store.save(&location, &state.snapshot_id, &segment).await {
            warn!(index, %err, "failed to cache segment");
        }
        Some(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_count_for() {
        assert_eq!(segment_count_for(0, 500), 0);
        assert_eq!(segment_count_for(1, 500), 1);
        assert_eq!(segment_count_for(500, 500), 1);
        assert_eq!(segment_count_for(501, 500), 2);
        assert_eq!(segment_count_for(1200, 500), 3);
    }

    #[test]
    fn test_snapshot_identity() {
        let a: Vec<AssetId> = vec!["x".into(), "y".into()];
        let b: Vec<AssetId> = vec!["y".into(), "x".into()];
        let c: Vec<AssetId> = vec!["xy".into()];

        let id_a = snapshot_identity(&a);
        assert!(id_a.ends_with("_2"));
        assert_eq!(id_a, snapshot_identity(&a.clone()));
        assert_ne!(id_a, snapshot_identity(&b));
        assert_ne!(snapshot_identity(&c), id_a);
    }
}
