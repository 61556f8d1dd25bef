//! In-memory library, for tests and embedding.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use photosweep_core::{AssetHandle, AssetId, AuthorizationStatus, SweepResult};

use crate::library::{CHANGE_CHANNEL_SIZE, LibraryChange, PhotoLibrary};

#[derive(Debug)]
struct Shared {
    status: RwLock<AuthorizationStatus>,
    /// Newest first.
    assets: RwLock<Vec<AssetHandle>>,
    resolve_calls: AtomicUsize,
}

/// A library held in memory.
///
/// Mutations broadcast the matching [`LibraryChange`]. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryLibrary {
    shared: Arc<Shared>,
    changes: broadcast::Sender<LibraryChange>,
}

impl MemoryLibrary {
    /// Create an authorized library. `assets` must be ordered newest first.
    pub fn new(assets: Vec<AssetHandle>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            shared: Arc::new(Shared {
                status: RwLock::new(AuthorizationStatus::Authorized),
                assets: RwLock::new(assets),
                resolve_calls: AtomicUsize::new(0),
            }),
            changes,
        }
    }

    /// Change the authorization status returned on the next request.
    pub fn set_status(&self, status: AuthorizationStatus) {
        *self.shared.status.write() = status;
    }

    /// Insert assets at the front (newest) and notify subscribers.
    pub fn insert(&self, mut handles: Vec<AssetHandle>) {
        let ids = handles.iter().map(|h| h.id.clone()).collect();
        {
            let mut assets = self.shared.assets.write();
            handles.append(&mut assets);
            *assets = handles;
        }
        let _ = self.changes.send(LibraryChange::inserted(ids));
    }

    /// Remove assets without notifying subscribers.
    pub fn remove_silently(&self, ids: &[AssetId]) {
        self.shared.assets.write().retain(|h| !ids.contains(&h.id));
    }

    /// Broadcast an arbitrary change.
    pub fn notify(&self, change: LibraryChange) {
        let _ = self.changes.send(change);
    }

    /// Number of single-asset resolutions served so far.
    pub fn resolve_calls(&self) -> usize {
        self.shared.resolve_calls.load(Ordering::Relaxed)
    }

    /// Current asset count.
    pub fn len(&self) -> usize {
        self.shared.assets.read().len()
    }

    /// Check if the library is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PhotoLibrary for MemoryLibrary {
    async fn request_authorization(&self) -> AuthorizationStatus {
        *self.shared.status.read()
    }

    async fn fetch_all_assets(&self) -> Vec<AssetHandle> {
        self.shared.assets.read().clone()
    }

    async fn resolve(&self, id: &AssetId) -> Option<AssetHandle> {
        self.shared.resolve_calls.fetch_add(1, Ordering::Relaxed);
        self.shared.assets.read().iter().find(|h| &h.id == id).cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }

    async fn delete_assets(&self, ids: &[AssetId]) -> SweepResult<()> {
        self.remove_silently(ids);
        let _ = self.changes.send(LibraryChange::removed(ids.to_vec()));
        Ok(())
    }
}
