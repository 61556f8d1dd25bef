//! Bounded fingerprint cache and the fingerprinting front end.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use photosweep_core::{AssetHandle, AssetId};

use crate::fingerprint::{difference_hash, perceptual_hash};
use crate::frames::representative_image;
use crate::provider::MediaDecoder;

/// Default number of cached fingerprints.
pub const DEFAULT_CACHE_CAPACITY: usize = 20_000;

/// Hashes of one asset's representative still.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub phash: u64,
    pub dhash: u64,
    /// Dimensions of the decoded still.
    pub width: u32,
    pub height: u32,
}

impl Fingerprint {
    /// Aspect ratio of the decoded still.
    pub fn aspect_ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(self.width as f64 / self.height as f64)
    }
}

/// Least-recently-used map from asset id to fingerprint.
///
/// Shared between concurrently running analyzers.
#[derive(Debug)]
pub struct FingerprintCache {
    capacity: usize,
    entries: Mutex<IndexMap<AssetId, Fingerprint>>,
}

impl FingerprintCache {
    /// Create a cache holding at most `capacity` fingerprints.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Look up a fingerprint, marking it most recently used.
    pub fn get(&self, id: &AssetId) -> Option<Fingerprint> {
        let mut entries = self.entries.lock();
        let index = entries.get_index_of(id)?;
        let last = entries.len() - 1;
        entries.move_index(index, last);
        entries.get_index(last).map(|(_, fp)| *fp)
    }

    /// Store a fingerprint, evicting the least recently used entry when full.
    pub fn insert(&self, id: AssetId, fingerprint: Fingerprint) {
        let mut entries = self.entries.lock();
        if let Some(index) = entries.get_index_of(&id) {
            let last = entries.len() - 1;
            entries.move_index(index, last);
            entries[last] = fingerprint;
            return;
        }
        if entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(id, fingerprint);
    }

    /// Drop the given ids.
    pub fn forget<'a>(&self, ids: impl IntoIterator<Item = &'a AssetId>) {
        let mut entries = self.entries.lock();
        for id in ids {
            entries.shift_remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Decodes assets and computes their fingerprints through a shared cache.
#[derive(Clone)]
pub struct Fingerprinter {
    decoder: Arc<dyn MediaDecoder>,
    cache: Arc<FingerprintCache>,
    sample_size: u32,
}

impl Fingerprinter {
    pub fn new(decoder: Arc<dyn MediaDecoder>, cache: Arc<FingerprintCache>, sample_size: u32) -> Self {
        Self {
            decoder,
            cache,
            sample_size,
        }
    }

    /// Shared cache.
    pub fn cache(&self) -> &Arc<FingerprintCache> {
        &self.cache
    }

    /// Fingerprint an asset, or `None` when no still can be decoded.
    pub fn fingerprint(&self, handle: &AssetHandle) -> Option<Fingerprint> {
        if let Some(hit) = self.cache.get(&handle.id) {
            return Some(hit);
        }
        let still = representative_image(self.decoder.as_ref(), handle, self.sample_size)?;
        let fingerprint = Fingerprint {
            phash: perceptual_hash(&still),
            dhash: difference_hash(&still),
            width: still.width(),
            height: still.height(),
        };
        self.cache.insert(handle.id.clone(), fingerprint);
        Some(fingerprint)
    }
}
