//! Photo library backed by a directory tree.
//!
//! Media files are discovered with jwalk. The asset id is the path relative
//! to the library root. A still image with a `.mov` sibling of the same stem
//! is a live photo, and `.aae` sidecars count as adjustment data of the
//! asset they sit next to.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use jwalk::WalkDir;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use photosweep_core::{
    AssetHandle, AssetId, AssetResource, AuthorizationStatus, MediaType, ResourceKind, SweepError,
    SweepResult,
};

use crate::library::{CHANGE_CHANNEL_SIZE, LibraryChange, PhotoLibrary};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "gif", "webp", "tif", "tiff", "bmp", "dng",
];
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "avi", "mkv", "3gp", "webm"];
const SIDECAR_EXTENSION: &str = "aae";
const LIVE_MOTION_EXTENSION: &str = "mov";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileRole {
    Image,
    Video,
    Sidecar,
}

fn role_of(path: &Path) -> Option<FileRole> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileRole::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileRole::Video)
    } else if ext == SIDECAR_EXTENSION {
        Some(FileRole::Sidecar)
    } else {
        None
    }
}

fn is_screenshot_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| {
            let lower = n.to_ascii_lowercase();
            lower.contains("screenshot") || lower.contains("screen shot")
        })
        .unwrap_or(false)
}

/// Key grouping a file with its siblings: parent directory plus lowercase stem.
fn stem_key(path: &Path) -> (PathBuf, String) {
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (parent, stem)
}

#[derive(Debug)]
struct FoundFile {
    path: PathBuf,
    role: FileRole,
    size: i64,
    created_at: Option<i64>,
}

/// A library over image and video files below a root directory.
///
/// File system access runs on the blocking pool; only the in-memory index
/// is touched from async code.
pub struct DirectoryLibrary {
    root: PathBuf,
    index: RwLock<HashMap<AssetId, AssetHandle>>,
    changes: broadcast::Sender<LibraryChange>,
}

impl DirectoryLibrary {
    /// Create a library rooted at `root`. Nothing is read until the first fetch.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            root: root.into(),
            index: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Library root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and build handles, newest first. Blocks on file I/O.
    pub fn scan(&self) -> Vec<AssetHandle> {
        let handles = walk(&self.root);
        self.reindex(&handles);
        handles
    }

    async fn scan_in_background(&self) -> Vec<AssetHandle> {
        let root = self.root.clone();
        let handles = match tokio::task::spawn_blocking(move || walk(&root)).await {
            Ok(handles) => handles,
            Err(err) => {
                warn!(root = %self.root.display(), %err, "library walk failed");
                Vec::new()
            }
        };
        self.reindex(&handles);
        handles
    }

    fn reindex(&self, handles: &[AssetHandle]) {
        let mut index = self.index.write();
        index.clear();
        index.extend(handles.iter().map(|h| (h.id.clone(), h.clone())));
        debug!(root = %self.root.display(), assets = handles.len(), "library scanned");
    }

    async fn ensure_indexed(&self) {
        let empty = self.index.read().is_empty();
        if empty {
            self.scan_in_background().await;
        }
    }
}

fn walk(root: &Path) -> Vec<AssetHandle> {
    let mut handles = assemble_handles(root, collect_files(root));
    handles.sort_by(|a, b| {
        b.created_at
            .unwrap_or(0)
            .cmp(&a.created_at.unwrap_or(0))
            .then_with(|| a.id.cmp(&b.id))
    });
    handles
}

fn collect_files(root: &Path) -> Vec<FoundFile> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).skip_hidden(true).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(%err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(role) = role_of(&path) else {
            continue;
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %path.display(), %err, "skipping file without metadata");
                continue;
            }
        };
        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64);
        files.push(FoundFile {
            path,
            role,
            size: metadata.len() as i64,
            created_at,
        });
    }
    files
}

/// Files that make up an asset: the primary file plus paired motion and sidecars.
fn files_of(root: &Path, id: &AssetId) -> Vec<PathBuf> {
    let primary = root.join(id.as_str());
    let mut files = vec![primary.clone()];
    let (parent, stem) = stem_key(&primary);
    if let Ok(siblings) = std::fs::read_dir(&parent) {
        for sibling in siblings.flatten() {
            let path = sibling.path();
            if path == primary || stem_key(&path).1 != stem {
                continue;
            }
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase())
                .unwrap_or_default();
            let is_live_motion =
                ext == LIVE_MOTION_EXTENSION && role_of(&primary) == Some(FileRole::Image);
            if ext == SIDECAR_EXTENSION || is_live_motion {
                files.push(path);
            }
        }
    }
    files
}

/// Move every file of each asset to the trash. Stops at the first failure
/// and reports the ids trashed before it.
fn trash_assets(root: &Path, ids: &[AssetId]) -> (Vec<AssetId>, SweepResult<()>) {
    let mut removed = Vec::new();
    for id in ids {
        let files = files_of(root, id);
        if !files[0].exists() {
            continue;
        }
        if let Err(e) = trash::delete_all(&files) {
            let err = SweepError::Library {
                message: format!("failed to move {id} to trash: {e}"),
            };
            return (removed, Err(err));
        }
        removed.push(id.clone());
    }
    (removed, Ok(()))
}

fn relative_id(root: &Path, path: &Path) -> AssetId {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    AssetId::from(parts.join("/"))
}

fn assemble_handles(root: &Path, files: Vec<FoundFile>) -> Vec<AssetHandle> {
    let mut motion: HashMap<(PathBuf, String), i64> = HashMap::new();
    let mut sidecars: HashMap<(PathBuf, String), i64> = HashMap::new();
    let mut stills: HashSet<(PathBuf, String)> = HashSet::new();
    for file in &files {
        let key = stem_key(&file.path);
        match file.role {
            FileRole::Image => {
                stills.insert(key);
            }
            FileRole::Video => {
                let is_mov = file
                    .path
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(LIVE_MOTION_EXTENSION));
                if is_mov {
                    motion.insert(key, file.size);
                }
            }
            FileRole::Sidecar => {
                *sidecars.entry(key).or_default() += file.size;
            }
        }
    }

    let mut handles = Vec::new();
    for file in files {
        let key = stem_key(&file.path);
        let media_type = match file.role {
            FileRole::Sidecar => continue,
            // The motion half of a live photo is folded into its still.
            FileRole::Video if stills.contains(&key) && motion.contains_key(&key) => continue,
            FileRole::Video => MediaType::Video,
            FileRole::Image => MediaType::Image,
        };

        let mut handle = AssetHandle::new(relative_id(root, &file.path), media_type);
        handle.created_at = file.created_at;
        let primary_kind = match media_type {
            MediaType::Video => ResourceKind::Video,
            _ => ResourceKind::Photo,
        };
        handle.resources.push(AssetResource::sized(primary_kind, file.size));

        if media_type == MediaType::Image {
            handle.subtypes.screenshot = is_screenshot_name(&file.path);
            if let Some(&size) = motion.get(&key) {
                handle.subtypes.live_photo = true;
                handle
                    .resources
                    .push(AssetResource::sized(ResourceKind::PairedVideo, size));
            }
            if let Ok((w, h)) = image::image_dimensions(&file.path) {
                handle.pixel_width = w;
                handle.pixel_height = h;
            }
        }
        if let Some(&size) = sidecars.get(&key) {
            handle
                .resources
                .push(AssetResource::sized(ResourceKind::AdjustmentData, size));
        }
        handles.push(handle);
    }
    handles
}

#[async_trait]
impl PhotoLibrary for DirectoryLibrary {
    async fn request_authorization(&self) -> AuthorizationStatus {
        let root = self.root.clone();
        let listing = tokio::task::spawn_blocking(move || std::fs::read_dir(&root).map(drop)).await;
        match listing {
            Ok(Ok(())) => AuthorizationStatus::Authorized,
            Ok(Err(err)) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                AuthorizationStatus::Denied
            }
            Ok(Err(_)) | Err(_) => AuthorizationStatus::Restricted,
        }
    }

    async fn fetch_all_assets(&self) -> Vec<AssetHandle> {
        self.scan_in_background().await
    }

    async fn resolve(&self, id: &AssetId) -> Option<AssetHandle> {
        self.ensure_indexed().await;
        self.index.read().get(id).cloned()
    }

    async fn resolve_many(&self, ids: &[AssetId]) -> Vec<AssetHandle> {
        self.ensure_indexed().await;
        let index = self.index.read();
        ids.iter().filter_map(|id| index.get(id).cloned()).collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }

    async fn delete_assets(&self, ids: &[AssetId]) -> SweepResult<()> {
        let root = self.root.clone();
        let targets = ids.to_vec();
        let (removed, result) = tokio::task::spawn_blocking(move || trash_assets(&root, &targets))
            .await
            .map_err(|e| SweepError::Library {
                message: format!("trash task failed: {e}"),
            })?;
        if !removed.is_empty() {
            {
                let mut index = self.index.write();
                for id in &removed {
                    index.remove(id);
                }
            }
            let _ = self.changes.send(LibraryChange::removed(removed));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, bytes: usize) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn test_role_of() {
        assert_eq!(role_of(Path::new("a/IMG_1.HEIC")), Some(FileRole::Image));
        assert_eq!(role_of(Path::new("clip.MP4")), Some(FileRole::Video));
        assert_eq!(role_of(Path::new("IMG_1.AAE")), Some(FileRole::Sidecar));
        assert_eq!(role_of(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_scan_pairs_live_photos_and_sidecars() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "2024/IMG_0001.jpg", 1000);
        touch(temp.path(), "2024/IMG_0001.mov", 500);
        touch(temp.path(), "2024/IMG_0001.aae", 20);
        touch(temp.path(), "2024/Screenshot 2024-01-01.png", 300);
        touch(temp.path(), "clips/trip.mp4", 4000);
        touch(temp.path(), "notes.txt", 10);

        let library = DirectoryLibrary::new(temp.path());
        let handles = library.scan();
        assert_eq!(handles.len(), 3);

        let live = handles.iter().find(|h| h.id.as_str() == "2024/IMG_0001.jpg").unwrap();
        assert!(live.subtypes.live_photo);
        assert_eq!(crate::resource_volume(live), 1520);

        let shot = handles
            .iter()
            .find(|h| h.id.as_str() == "2024/Screenshot 2024-01-01.png")
            .unwrap();
        assert!(shot.subtypes.screenshot);

        let clip = handles.iter().find(|h| h.id.as_str() == "clips/trip.mp4").unwrap();
        assert!(clip.is_video());
        assert_eq!(crate::resource_volume(clip), 4000);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "a.jpg", 10);
        let library = DirectoryLibrary::new(temp.path());

        assert!(library.resolve(&AssetId::from("a.jpg")).await.is_some());
        assert!(library.resolve(&AssetId::from("b.jpg")).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_and_delete_off_the_runtime() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "IMG_0002.jpg", 100);
        touch(temp.path(), "IMG_0002.aae", 5);
        touch(temp.path(), "keep.png", 10);
        let library = DirectoryLibrary::new(temp.path());
        let mut changes = library.subscribe();

        assert_eq!(library.fetch_all_assets().await.len(), 2);
        assert_eq!(library.request_authorization().await, AuthorizationStatus::Authorized);

        let removed = vec![AssetId::from("IMG_0002.jpg"), AssetId::from("gone.jpg")];
        if library.delete_assets(&removed).await.is_err() {
            // No trash available on this host.
            return;
        }
        assert!(!temp.path().join("IMG_0002.jpg").exists());
        assert!(!temp.path().join("IMG_0002.aae").exists());
        assert!(library.resolve(&removed[0]).await.is_none());
        assert_eq!(
            changes.try_recv().unwrap(),
            LibraryChange::removed(vec![AssetId::from("IMG_0002.jpg")])
        );
    }
}
