//! Persisted pipeline state.
//!
//! Three JSON documents live next to the segment cache:
//!
//! - `progress.json` - the [`ProgressCursor`]
//! - `maps.json` - every category accumulator
//! - `dashboard.json` - the derived dashboard, for instant display
//!
//! Each document carries the data format version. A document that is
//! missing, undecodable or from another version is treated as absent.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use photosweep_core::{
    CategoryBook, DATA_FORMAT_VERSION, DashboardSnapshot, ProgressCursor, SweepError, SweepResult,
};
use photosweep_scan::{SegmentStore, write_atomic};

const PROGRESS_FILE: &str = "progress.json";
const CATEGORIES_FILE: &str = "maps.json";
const DASHBOARD_FILE: &str = "dashboard.json";

#[derive(Serialize)]
struct DocumentRef<'a, T> {
    data_format_version: u32,
    saved_at: DateTime<Utc>,
    content: &'a T,
}

#[derive(Deserialize)]
struct Document<T> {
    data_format_version: u32,
    content: T,
}

/// Everything written by one persist.
#[derive(Debug, Clone, Copy)]
pub struct PersistedState<'a> {
    pub cursor: &'a ProgressCursor,
    pub book: &'a CategoryBook,
    pub dashboard: &'a DashboardSnapshot,
}

/// The state directory of one installation.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Segment cache sharing this directory.
    pub fn segments(&self) -> SegmentStore {
        SegmentStore::new(&self.dir)
    }

    pub async fn load_progress(&self) -> Option<ProgressCursor> {
        let cursor: ProgressCursor = self.load(PROGRESS_FILE).await?;
        cursor.is_current_format().then_some(cursor)
    }

    pub async fn load_categories(&self) -> Option<CategoryBook> {
        self.load(CATEGORIES_FILE).await
    }

    pub async fn load_dashboard(&self) -> Option<DashboardSnapshot> {
        self.load(DASHBOARD_FILE).await
    }

    /// Write all three documents. Stops at the first failure.
    pub async fn save(&self, state: PersistedState<'_>) -> SweepResult<()> {
        self.save_document(PROGRESS_FILE, state.cursor).await?;
        self.save_document(CATEGORIES_FILE, state.book).await?;
        self.save_document(DASHBOARD_FILE, state.dashboard).await
    }

    /// Write only the cursor.
    pub async fn save_progress(&self, cursor: &ProgressCursor) -> SweepResult<()> {
        self.save_document(PROGRESS_FILE, cursor).await
    }

    /// Remove every persisted document and cached segment.
    /// Returns the number of files removed.
    pub async fn clear(&self) -> SweepResult<usize> {
        let mut removed = self.segments().clear().await?;
        for name in [PROGRESS_FILE, CATEGORIES_FILE, DASHBOARD_FILE] {
            let path = self.dir.join(name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(SweepError::io(&path, err)),
            }
        }
        Ok(removed)
    }

    async fn load<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let doc: Document<T> = match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(err) => {
                debug!(path = %path.display(), %err, "discarding undecodable document");
                return None;
            }
        };
        if doc.data_format_version != DATA_FORMAT_VERSION {
            debug!(
                path = %path.display(),
                version = doc.data_format_version,
                "discarding document with foreign format version"
            );
            return None;
        }
        Some(doc.content)
    }

    async fn save_document<T: Serialize>(&self, name: &str, content: &T) -> SweepResult<()> {
        let path = self.dir.join(name);
        let doc = DocumentRef {
            data_format_version: DATA_FORMAT_VERSION,
            saved_at: Utc::now(),
            content,
        };
        let bytes = serde_json::to_vec(&doc).map_err(|e| SweepError::corrupt(&path, e))?;
        write_atomic(&path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photosweep_core::{AssetRecord, Category, Phase};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_restore() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());

        let mut cursor = ProgressCursor::new("snap_3");
        cursor.advance(Phase::Primary, 2);
        let mut book = CategoryBook::new();
        book.merge_single(Category::Video, vec![AssetRecord::new("v", 500, 0)]);
        let dashboard = DashboardSnapshot::from_book(&book);

        store
            .save(PersistedState {
                cursor: &cursor,
                book: &book,
                dashboard: &dashboard,
            })
            .await
            .unwrap();

        assert_eq!(store.load_progress().await.unwrap(), cursor);
        assert_eq!(store.load_categories().await.unwrap(), book);
        assert_eq!(store.load_dashboard().await.unwrap().total_bytes, 500);
    }

    #[tokio::test]
    async fn test_missing_and_foreign_documents_are_absent() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        assert!(store.load_progress().await.is_none());

        let foreign = serde_json::json!({
            "data_format_version": DATA_FORMAT_VERSION + 1,
            "content": ProgressCursor::new("x"),
        });
        std::fs::write(temp.path().join(PROGRESS_FILE), foreign.to_string()).unwrap();
        assert!(store.load_progress().await.is_none());

        std::fs::write(temp.path().join(CATEGORIES_FILE), b"[1, 2").unwrap();
        assert!(store.load_categories().await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        let store = StateStore::new(temp.path());
        store.save_progress(&ProgressCursor::new("s")).await.unwrap();
        std::fs::write(temp.path().join("chunk_0.json"), b"{}").unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"keep").unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.load_progress().await.is_none());
        assert!(temp.path().join("notes.txt").exists());
    }
}
