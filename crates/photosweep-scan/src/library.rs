//! Photo library access.

use async_trait::async_trait;
use tokio::sync::broadcast;

use photosweep_core::{AssetHandle, AssetId, AuthorizationStatus, SweepError, SweepResult};

/// Capacity of library change channels.
pub const CHANGE_CHANNEL_SIZE: usize = 64;

/// A mutation reported by the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryChange {
    /// The change can be described as id sets.
    Incremental {
        inserted: Vec<AssetId>,
        removed: Vec<AssetId>,
        changed: Vec<AssetId>,
    },
    /// The library changed in a way that cannot be described incrementally.
    Reset,
}

impl LibraryChange {
    /// Create an incremental change that only removes assets.
    pub fn removed(ids: Vec<AssetId>) -> Self {
        Self::Incremental {
            inserted: Vec::new(),
            removed: ids,
            changed: Vec::new(),
        }
    }

    /// Create an incremental change that only inserts assets.
    pub fn inserted(ids: Vec<AssetId>) -> Self {
        Self::Incremental {
            inserted: ids,
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

/// Source of assets and change notifications.
///
/// Implementations absorb their own failures: an asset that cannot be
/// resolved is simply missing from the result.
#[async_trait]
pub trait PhotoLibrary: Send + Sync {
    /// Ask for read/write access.
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Every asset in the library, newest first.
    async fn fetch_all_assets(&self) -> Vec<AssetHandle>;

    /// Resolve one asset by id.
    async fn resolve(&self, id: &AssetId) -> Option<AssetHandle>;

    /// Resolve many assets. Missing ids are skipped.
    async fn resolve_many(&self, ids: &[AssetId]) -> Vec<AssetHandle> {
        let mut handles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(handle) = self.resolve(id).await {
                handles.push(handle);
            }
        }
        handles
    }

    /// Subscribe to live change notifications.
    fn subscribe(&self) -> broadcast::Receiver<LibraryChange>;

    /// Delete assets from the library.
    async fn delete_assets(&self, ids: &[AssetId]) -> SweepResult<()> {
        let _ = ids;
        Err(SweepError::library("deletion is not supported by this library"))
    }
}
