use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};
use parking_lot::Mutex;
use photosweep_analyze::{BatchItem, CategoryAnalyzer, CategoryFindings, MediaDecoder, NoTextDetector};
use photosweep_core::{
    AssetHandle, AssetId, AssetResource, AuthorizationStatus, Category, CategoryBook,
    DashboardSnapshot, MIB, MediaType, Phase, PipelineConfig, PipelineState, ProgressCursor,
    ResourceKind, SweepError,
};
use photosweep_pipeline::{AnalyzerSet, PersistedState, Pipeline, PipelineSnapshot, StateStore};
use photosweep_scan::{LibraryChange, MemoryLibrary, snapshot_identity};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Serves fixed stills keyed by id.
#[derive(Default)]
struct StillDecoder {
    stills: HashMap<AssetId, DynamicImage>,
}

impl StillDecoder {
    fn with(mut self, id: &str, image: DynamicImage) -> Self {
        self.stills.insert(id.into(), image);
        self
    }
}

impl MediaDecoder for StillDecoder {
    fn decode_image(&self, handle: &AssetHandle, _target: u32) -> Option<DynamicImage> {
        self.stills.get(&handle.id).cloned()
    }
}

/// Records the first id of every batch it sees.
struct Recorder {
    phase: Phase,
    seen: Arc<Mutex<Vec<AssetId>>>,
}

impl CategoryAnalyzer for Recorder {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        if let Some(first) = batch.first() {
            self.seen.lock().push(first.id().clone());
        }
        Vec::new()
    }
}

/// Blocks every batch until the test releases it, then delegates.
struct Gated {
    inner: Arc<dyn CategoryAnalyzer>,
    entered: mpsc::UnboundedSender<AssetId>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

/// Test-side controls of a [`Gated`] analyzer.
struct Gate {
    entered: mpsc::UnboundedReceiver<AssetId>,
    release: std::sync::mpsc::Sender<()>,
}

impl Gate {
    fn wrap(inner: Arc<dyn CategoryAnalyzer>) -> (Arc<dyn CategoryAnalyzer>, Gate) {
        let (entered_tx, entered) = mpsc::unbounded_channel();
        let (release, release_rx) = std::sync::mpsc::channel();
        let gated = Gated {
            inner,
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        (Arc::new(gated), Gate { entered, release })
    }

    /// Wait until a batch reaches the analyzer; returns its first id.
    async fn entered(&mut self) -> AssetId {
        tokio::time::timeout(Duration::from_secs(5), self.entered.recv())
            .await
            .expect("timed out waiting for a batch")
            .expect("analyzer dropped")
    }

    fn release(&self) {
        self.release.send(()).unwrap();
    }
}

impl CategoryAnalyzer for Gated {
    fn phase(&self) -> Phase {
        self.inner.phase()
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        if let Some(first) = batch.first() {
            let _ = self.entered.send(first.id().clone());
        }
        let _ = self.release.lock().recv();
        self.inner.analyze(batch)
    }
}

fn noise(size: u32, seed: u64) -> DynamicImage {
    let mut state = seed;
    DynamicImage::ImageLuma8(GrayImage::from_fn(size, size, |_, _| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        Luma([((state >> 56) as u8) % 200])
    }))
}

fn photo(id: &str, size: i64) -> AssetHandle {
    let mut handle = AssetHandle::new(id, MediaType::Image);
    handle.pixel_width = 64;
    handle.pixel_height = 64;
    handle.created_at = Some(1_700_000_000);
    handle.resources = vec![AssetResource::sized(ResourceKind::Photo, size)];
    handle
}

fn video(id: &str, size: i64) -> AssetHandle {
    let mut handle = AssetHandle::new(id, MediaType::Video);
    handle.pixel_width = 1920;
    handle.pixel_height = 1080;
    handle.created_at = Some(1_700_000_000);
    handle.duration = Some(30.0);
    handle.resources = vec![AssetResource::sized(ResourceKind::Video, size)];
    handle
}

fn config(dir: impl Into<std::path::PathBuf>, chunk: usize) -> PipelineConfig {
    PipelineConfig::builder()
        .state_dir(dir)
        .chunk_size(chunk)
        .build()
        .unwrap()
}

fn pipeline(config: PipelineConfig, library: &MemoryLibrary, decoder: StillDecoder) -> Pipeline {
    let analyzers = AnalyzerSet::standard(&config, Arc::new(decoder), Arc::new(NoTextDetector));
    Pipeline::new(config, Arc::new(library.clone()), analyzers)
}

async fn wait_until(pipeline: &Pipeline, check: impl FnMut(&PipelineSnapshot) -> bool) {
    let mut rx = pipeline.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(check))
        .await
        .expect("timed out waiting for published state")
        .expect("pipeline dropped");
}

#[tokio::test]
async fn test_resume_skips_recorded_segments() {
    let temp = TempDir::new().unwrap();
    let handles: Vec<AssetHandle> = (0..1200).map(|i| photo(&format!("a{i:04}"), 10)).collect();
    let ids: Vec<AssetId> = handles.iter().map(|h| h.id.clone()).collect();
    let library = MemoryLibrary::new(handles);

    let mut cursor = ProgressCursor::new(snapshot_identity(&ids));
    for index in 0..=2 {
        cursor.advance(Phase::Primary, index);
    }
    for phase in [Phase::Similarity, Phase::Duplication, Phase::Oversized] {
        cursor.advance(phase, 0);
        cursor.advance(phase, 1);
    }
    let book = CategoryBook::new();
    let store = StateStore::new(temp.path());
    store
        .save(PersistedState {
            cursor: &cursor,
            book: &book,
            dashboard: &DashboardSnapshot::from_book(&book),
        })
        .await
        .unwrap();

    let seen: HashMap<Phase, Arc<Mutex<Vec<AssetId>>>> = [
        Phase::Primary,
        Phase::Similarity,
        Phase::Duplication,
        Phase::Oversized,
        Phase::BlurDetection,
        Phase::TextDetection,
    ]
    .into_iter()
    .map(|phase| (phase, Arc::default()))
    .collect();
    let recorder = |phase: Phase| -> Arc<dyn CategoryAnalyzer> {
        Arc::new(Recorder {
            phase,
            seen: seen[&phase].clone(),
        })
    };
    let analyzers = AnalyzerSet {
        primary: recorder(Phase::Primary),
        similarity: recorder(Phase::Similarity),
        duplication: recorder(Phase::Duplication),
        oversized: recorder(Phase::Oversized),
        blur: recorder(Phase::BlurDetection),
        text: recorder(Phase::TextDetection),
        fingerprints: None,
    };

    let pipeline = Pipeline::new(
        config(temp.path(), 500),
        Arc::new(library.clone()),
        analyzers,
    );
    pipeline.start().await.unwrap();

    assert!(seen[&Phase::Primary].lock().is_empty());
    for phase in [Phase::Similarity, Phase::Duplication, Phase::Oversized] {
        assert_eq!(*seen[&phase].lock(), vec![ids[1000].clone()], "{phase}");
    }
    for phase in [Phase::BlurDetection, Phase::TextDetection] {
        assert_eq!(
            *seen[&phase].lock(),
            vec![ids[0].clone(), ids[500].clone(), ids[1000].clone()],
            "{phase}"
        );
    }

    let saved = store.load_progress().await.unwrap();
    assert_eq!(saved.snapshot_id, snapshot_identity(&ids));
    for phase in seen.keys() {
        assert_eq!(saved.last(*phase), 2, "{phase}");
    }
    assert_eq!(pipeline.snapshot().state, PipelineState::Idle);
}

#[tokio::test]
async fn test_cursor_without_categories_is_discarded() {
    let temp = TempDir::new().unwrap();
    let handles = vec![video("v", 200 * MIB)];
    let ids: Vec<AssetId> = handles.iter().map(|h| h.id.clone()).collect();
    let library = MemoryLibrary::new(handles);

    let store = StateStore::new(temp.path());
    let mut cursor = ProgressCursor::new(snapshot_identity(&ids));
    for phase in [Phase::Primary, Phase::Oversized] {
        cursor.advance(phase, 0);
    }
    store.save_progress(&cursor).await.unwrap();

    let pipeline = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    pipeline.start().await.unwrap();

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.categories.category_count(Category::LargeVideo), 1);
    assert_eq!(snapshot.categories.category_count(Category::Video), 1);
}

#[tokio::test]
async fn test_stale_cursor_rerun_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![
        photo("a", 300),
        photo("b", 200),
        video("v", 150 * MIB),
    ]);
    let decoder = || {
        StillDecoder::default()
            .with("a", noise(64, 7))
            .with("b", noise(64, 7))
    };

    let first = pipeline(config(temp.path(), 2), &library, decoder());
    first.start().await.unwrap();
    let before = first.snapshot().categories;
    assert_eq!(before.category_bytes(Category::Duplicate), 500);
    drop(first);

    let store = StateStore::new(temp.path());
    store
        .save_progress(&ProgressCursor::new("another-library"))
        .await
        .unwrap();

    let second = pipeline(config(temp.path(), 2), &library, decoder());
    second.start().await.unwrap();
    let after = second.snapshot().categories;

    for category in [
        Category::Video,
        Category::LargeVideo,
        Category::Similar,
        Category::Duplicate,
    ] {
        assert_eq!(
            after.category_bytes(category),
            before.category_bytes(category),
            "{category}"
        );
        assert_eq!(
            after.category_count(category),
            before.category_count(category),
            "{category}"
        );
    }
    assert_eq!(after.total_bytes(), before.total_bytes());
}

#[tokio::test]
async fn test_large_video_threshold_and_reencode() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![
        video("big", 150 * MIB),
        video("edge", 100 * MIB - 1),
    ]);
    let pipeline = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    pipeline.start().await.unwrap();

    let categories = pipeline.snapshot().categories;
    let large = categories.single(Category::LargeVideo).unwrap();
    assert!(large.contains("big"));
    assert!(!large.contains("edge"));
    assert_eq!(large.total_bytes(), 150 * MIB);

    // Re-encoded below the threshold, alongside a new capture.
    library.remove_silently(&["big".into()]);
    library.insert(vec![photo("fresh", 10), video("big", 90 * MIB)]);
    pipeline.start().await.unwrap();

    let categories = pipeline.snapshot().categories;
    assert_eq!(categories.category_count(Category::LargeVideo), 0);
    assert_eq!(categories.category_bytes(Category::LargeVideo), 0);
    assert_eq!(
        categories.category_bytes(Category::Video),
        90 * MIB + 100 * MIB - 1
    );
}

#[tokio::test]
async fn test_delete_subtracts_only_deleted_members() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![
        photo("x300", 300),
        photo("x200", 200),
        photo("x100", 100),
    ]);
    let decoder = StillDecoder::default()
        .with("x300", noise(64, 11))
        .with("x200", noise(64, 11))
        .with("x100", noise(64, 11));
    let pipeline = pipeline(config(temp.path(), 500), &library, decoder);
    pipeline.start().await.unwrap();

    let duplicates = |pipeline: &Pipeline| {
        pipeline
            .snapshot()
            .categories
            .category_bytes(Category::Duplicate)
    };
    assert_eq!(duplicates(&pipeline), 600);

    pipeline.delete_assets(&["x300".into()]).await.unwrap();
    assert_eq!(duplicates(&pipeline), 300);
    assert_eq!(library.len(), 2);

    pipeline.delete_assets(&["x200".into()]).await.unwrap();
    assert_eq!(duplicates(&pipeline), 100);
    let categories = pipeline.snapshot().categories;
    assert_eq!(categories.grouped(Category::Duplicate).unwrap().group_count(), 0);

    let persisted = StateStore::new(temp.path()).load_categories().await.unwrap();
    assert_eq!(persisted.category_bytes(Category::Duplicate), 100);
}

#[tokio::test]
async fn test_permission_denied_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let state_dir = temp.path().join("state");
    let library = MemoryLibrary::new(vec![photo("a", 10)]);
    library.set_status(AuthorizationStatus::Denied);

    let pipeline = pipeline(config(&state_dir, 500), &library, StillDecoder::default());
    let result = pipeline.start().await;
    assert!(matches!(
        result,
        Err(SweepError::PermissionDenied {
            status: AuthorizationStatus::Denied
        })
    ));

    let snapshot = pipeline.snapshot();
    let PipelineState::PermissionDenied(guidance) = &snapshot.state else {
        panic!("expected permission denied, got {:?}", snapshot.state);
    };
    assert_eq!(guidance.status, AuthorizationStatus::Denied);
    assert_eq!(guidance.title, "Unlock Full PR");
    assert!(!state_dir.exists());
}

#[tokio::test]
async fn test_limited_access_scans_with_guidance() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![video("v", 10)]);
    library.set_status(AuthorizationStatus::Limited);

    let pipeline = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    pipeline.start().await.unwrap();

    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.state, PipelineState::Idle);
    assert_eq!(
        snapshot.guidance.map(|g| g.status),
        Some(AuthorizationStatus::Limited)
    );
    assert_eq!(snapshot.categories.category_count(Category::Video), 1);
}

#[tokio::test]
async fn test_duplicates_in_different_segments_stay_apart() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![
        photo("a", 10),
        photo("x", 10),
        photo("y", 10),
        photo("b", 10),
    ]);
    let decoder = StillDecoder::default()
        .with("a", noise(64, 3))
        .with("x", noise(64, 4))
        .with("y", noise(64, 5))
        .with("b", noise(64, 3));

    let pipeline = pipeline(config(temp.path(), 2), &library, decoder);
    pipeline.start().await.unwrap();

    // Segments are compared in isolation: [a, x] and [y, b].
    let categories = pipeline.snapshot().categories;
    assert_eq!(categories.category_count(Category::Duplicate), 0);
    assert_eq!(categories.category_count(Category::Similar), 0);
}

#[tokio::test]
async fn test_insert_refreshes_light_categories() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![photo("a", 10)]);
    let pipeline = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    pipeline.start().await.unwrap();
    assert_eq!(
        pipeline
            .snapshot()
            .categories
            .category_count(Category::Screenshot),
        0
    );

    let mut shot = photo("shot", 42);
    shot.subtypes.screenshot = true;
    library.insert(vec![shot]);

    wait_until(&pipeline, |s| {
        s.categories.category_bytes(Category::Screenshot) == 42
    })
    .await;
}

#[tokio::test]
async fn test_removal_notification_reconciles() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![video("v", 10), video("w", 20)]);
    let pipeline = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    pipeline.start().await.unwrap();
    assert_eq!(
        pipeline.snapshot().categories.category_bytes(Category::Video),
        30
    );

    library.remove_silently(&["v".into()]);
    library.notify(LibraryChange::removed(vec!["v".into()]));

    wait_until(&pipeline, |s| {
        s.categories.category_bytes(Category::Video) == 20
    })
    .await;
}

#[tokio::test]
async fn test_unwritable_state_dir_is_an_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").unwrap();

    let library = MemoryLibrary::new(vec![photo("a", 10)]);
    let pipeline = pipeline(config(&blocker, 500), &library, StillDecoder::default());

    assert!(pipeline.start().await.is_err());
    assert!(matches!(pipeline.snapshot().state, PipelineState::Error(_)));
}

#[tokio::test]
async fn test_restore_without_scan_then_delete() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![video("v", 10), video("w", 20)]);

    let first = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    first.start().await.unwrap();
    drop(first);

    let second = pipeline(config(temp.path(), 500), &library, StillDecoder::default());
    second.restore().await;
    let restored = second.snapshot();
    assert_eq!(restored.categories.category_bytes(Category::Video), 30);
    assert_eq!(restored.dashboard.total_bytes, 30);

    second.delete_assets(&["w".into()]).await.unwrap();
    let persisted = StateStore::new(temp.path()).load_categories().await.unwrap();
    assert_eq!(persisted.category_bytes(Category::Video), 10);
    assert_eq!(library.len(), 1);
}

#[tokio::test]
async fn test_deletion_during_segment_is_not_undone() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![video("big", 150 * MIB), video("small", 10)]);
    let config = config(temp.path(), 500);
    let mut analyzers = AnalyzerSet::standard(
        &config,
        Arc::new(StillDecoder::default()),
        Arc::new(NoTextDetector),
    );
    let (oversized, mut gate) = Gate::wrap(analyzers.oversized.clone());
    analyzers.oversized = oversized;
    let pipeline = Pipeline::new(config, Arc::new(library.clone()), analyzers);

    let run = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.start().await }
    });
    gate.entered().await;

    let removed = pipeline.reconcile_deletion(&["big".into()]).await;
    assert_eq!(removed, 150 * MIB);
    gate.release();
    run.await.unwrap().unwrap();

    let categories = pipeline.snapshot().categories;
    let large = categories.single(Category::LargeVideo).unwrap();
    assert!(!large.contains("big"));
    assert_eq!(large.total_bytes(), 0);
    assert_eq!(categories.category_bytes(Category::Video), 10);

    let persisted = StateStore::new(temp.path()).load_categories().await.unwrap();
    assert_eq!(persisted.category_bytes(Category::LargeVideo), 0);
    assert_eq!(persisted.category_bytes(Category::Video), 10);
}

#[tokio::test]
async fn test_progress_persists_every_third_segment() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new((0..4).map(|i| video(&format!("v{i}"), 10)).collect());
    let config = PipelineConfig::builder()
        .state_dir(temp.path())
        .chunk_size(1usize)
        .save_interval(3usize)
        .build()
        .unwrap();
    let mut analyzers = AnalyzerSet::standard(
        &config,
        Arc::new(StillDecoder::default()),
        Arc::new(NoTextDetector),
    );
    let (primary, mut gate) = Gate::wrap(analyzers.primary.clone());
    analyzers.primary = primary;
    let pipeline = Pipeline::new(config, Arc::new(library.clone()), analyzers);
    let store = StateStore::new(temp.path());
    let progress_file = temp.path().join("progress.json");

    let run = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.start().await }
    });

    gate.entered().await;
    let initial = std::fs::read(&progress_file).unwrap();
    for _ in 0..2 {
        gate.release();
        gate.entered().await;
    }
    // Segments 0 and 1 are merged but not yet saved.
    assert_eq!(std::fs::read(&progress_file).unwrap(), initial);
    assert_eq!(store.load_progress().await.unwrap().last(Phase::Primary), -1);

    gate.release();
    gate.entered().await;
    assert_eq!(store.load_progress().await.unwrap().last(Phase::Primary), 2);

    gate.release();
    run.await.unwrap().unwrap();
    let saved = store.load_progress().await.unwrap();
    for phase in [Phase::Primary, Phase::Oversized, Phase::BlurDetection] {
        assert_eq!(saved.last(phase), 3, "{phase}");
    }
}

#[tokio::test]
async fn test_changed_assets_drop_cached_fingerprints() {
    let temp = TempDir::new().unwrap();
    let library = MemoryLibrary::new(vec![photo("a", 10), photo("b", 10)]);
    let decoder = StillDecoder::default()
        .with("a", noise(64, 21))
        .with("b", noise(64, 21));
    let config = config(temp.path(), 500);
    let analyzers = AnalyzerSet::standard(&config, Arc::new(decoder), Arc::new(NoTextDetector));
    let fingerprints = analyzers.fingerprints.clone().unwrap();
    let pipeline = Pipeline::new(config, Arc::new(library.clone()), analyzers);
    pipeline.start().await.unwrap();
    assert!(fingerprints.get(&"a".into()).is_some());

    pipeline
        .handle_change(LibraryChange::Incremental {
            inserted: Vec::new(),
            removed: Vec::new(),
            changed: vec!["a".into()],
        })
        .await;
    assert!(fingerprints.get(&"a".into()).is_none());
    assert!(fingerprints.get(&"b".into()).is_some());
}
