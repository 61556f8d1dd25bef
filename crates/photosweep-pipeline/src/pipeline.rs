//! Phased, resumable pipeline orchestration.
//!
//! A run walks `requesting_permission → loading → idle` and scans in three
//! steps:
//!
//! 1. Phase A (primary) over every unprocessed segment, serially
//! 2. similarity, duplication and oversized phases concurrently
//! 3. blur and text detection phases concurrently
//!
//! Each phase resumes after the last segment its cursor recorded. Findings
//! flow to the [`MergeWriter`], which is the only owner of category state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use photosweep_analyze::{BatchItem, PrimaryClassification};
use photosweep_core::{
    AssetHandle, AssetId, AssetRecord, PermissionGuidance, Phase, PhaseProgress, PipelineConfig,
    PipelineState, ProgressCursor, Segment, SweepError, SweepResult,
};
use photosweep_scan::{LibraryChange, PhotoLibrary, SegmentScheduler, resource_volume};

use crate::analyzers::AnalyzerSet;
use crate::persist::StateStore;
use crate::snapshot::PipelineSnapshot;
use crate::writer::MergeWriter;

/// Handle to a running pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    config: PipelineConfig,
    library: Arc<dyn PhotoLibrary>,
    scheduler: SegmentScheduler,
    analyzers: AnalyzerSet,
    writer: MergeWriter,
    store: StateStore,
    published: Arc<watch::Sender<PipelineSnapshot>>,
    generation: AtomicU64,
    active_runs: AtomicUsize,
    restored: AtomicBool,
    assets: RwLock<HashMap<AssetId, AssetHandle>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

/// Counts a run as active for as long as it is alive.
struct RunGuard<'a>(&'a AtomicUsize);

impl<'a> RunGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Pipeline {
    /// Create a pipeline. Must be called within a tokio runtime.
    pub fn new(config: PipelineConfig, library: Arc<dyn PhotoLibrary>, analyzers: AnalyzerSet) -> Self {
        let store = StateStore::new(&config.state_dir);
        let (published, _) = watch::channel(PipelineSnapshot::default());
        let published = Arc::new(published);
        let writer = MergeWriter::spawn(store.clone(), config.save_interval, published.clone());
        let scheduler = SegmentScheduler::new(library.clone(), store.segments(), config.chunk_size);

        Self {
            inner: Arc::new(Inner {
                config,
                library,
                scheduler,
                analyzers,
                writer,
                store,
                published,
                generation: AtomicU64::new(0),
                active_runs: AtomicUsize::new(0),
                restored: AtomicBool::new(false),
                assets: RwLock::new(HashMap::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Subscribe to published state. New subscribers see the latest value.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.inner.published.subscribe()
    }

    /// Current published state.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.inner.published.borrow().clone()
    }

    /// Load persisted state without scanning. Runs at most once; `start`
    /// calls it too.
    pub async fn restore(&self) {
        self.inner.restore().await;
    }

    /// Run authorization and the full phased scan.
    ///
    /// A later call supersedes a running one: the older run stops at its
    /// next segment boundary and leaves the final flush to the newer run.
    pub async fn start(&self) -> SweepResult<()> {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _run = RunGuard::enter(&inner.active_runs);

        inner.set_state(PipelineState::RequestingPermission);
        let status = inner.library.request_authorization().await;
        let guidance = PermissionGuidance::for_status(status);
        if !status.allows_scan() {
            warn!(%status, "photo library access not granted");
            inner.published.send_modify(|s| {
                if let Some(guidance) = &guidance {
                    s.state = PipelineState::PermissionDenied(guidance.clone());
                }
                s.guidance = guidance;
            });
            return Err(SweepError::PermissionDenied { status });
        }
        inner.published.send_modify(|s| s.guidance = guidance);

        if let Err(err) = tokio::fs::create_dir_all(inner.store.dir()).await {
            let err = SweepError::io(inner.store.dir(), err);
            inner.set_state(PipelineState::Error(err.to_string()));
            return Err(err);
        }

        self.ensure_listener();
        inner.restore().await;
        inner.set_state(PipelineState::Loading);

        let handles = inner.library.fetch_all_assets().await;
        let ids: Vec<AssetId> = handles.iter().map(|h| h.id.clone()).collect();
        let sizes: HashMap<AssetId, i64> = handles
            .iter()
            .map(|h| (h.id.clone(), resource_volume(h)))
            .collect();
        inner.remember(handles);
        let snapshot_id = inner.scheduler.configure(ids).await;
        let cursor = inner
            .writer
            .begin(generation, snapshot_id.clone(), sizes)
            .await;
        info!(snapshot = %snapshot_id, generation, "scan started");

        inner.run_phases(generation, &cursor).await;
        if inner.is_superseded(generation) {
            debug!(generation, "run superseded");
            return Ok(());
        }

        inner.writer.flush().await;
        inner.published.send_modify(|s| {
            s.progress.clear();
            s.state = PipelineState::Idle;
        });
        info!(generation, "scan finished");
        Ok(())
    }

    /// Alias of [`start`](Self::start).
    pub async fn refresh(&self) -> SweepResult<()> {
        self.start().await
    }

    /// Apply an external deletion to every category and persist.
    /// Returns the bytes removed, summed per category.
    pub async fn reconcile_deletion(&self, ids: &[AssetId]) -> i64 {
        let ids: HashSet<AssetId> = ids.iter().cloned().collect();
        if ids.is_empty() {
            return 0;
        }
        {
            let mut assets = self.inner.assets.write();
            for id in &ids {
                assets.remove(id);
            }
        }
        self.inner.analyzers.forget(&ids);
        let removed = self.inner.writer.remove(ids).await;
        info!(removed, "deletion reconciled");
        removed
    }

    /// Delete assets from the library, then reconcile.
    pub async fn delete_assets(&self, ids: &[AssetId]) -> SweepResult<i64> {
        self.inner.library.delete_assets(ids).await?;
        Ok(self.reconcile_deletion(ids).await)
    }

    /// Cached lookup of an asset handle.
    pub async fn resolve(&self, id: &AssetId) -> Option<AssetHandle> {
        if let Some(handle) = self.inner.assets.read().get(id) {
            return Some(handle.clone());
        }
        let handle = self.inner.library.resolve(id).await?;
        self.inner
            .assets
            .write()
            .insert(handle.id.clone(), handle.clone());
        Some(handle)
    }

    /// React to a library change notification.
    pub async fn handle_change(&self, change: LibraryChange) {
        match change {
            LibraryChange::Reset => {
                info!("library reset, restarting scan");
                let pipeline = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = pipeline.start().await {
                        warn!(%err, "restart after library reset failed");
                    }
                });
            }
            LibraryChange::Incremental {
                inserted,
                removed,
                changed,
            } => {
                if !removed.is_empty() {
                    self.reconcile_deletion(&removed).await;
                }
                if !changed.is_empty() {
                    self.inner.analyzers.forget(&changed);
                }
                if !inserted.is_empty() || !changed.is_empty() {
                    self.refresh_light().await;
                }
            }
        }
    }

    /// Rebuild the metadata-only categories from the full asset list.
    async fn refresh_light(&self) {
        let inner = &self.inner;
        inner.set_state(PipelineState::Loading);
        let handles = inner.library.fetch_all_assets().await;
        let batch: Vec<BatchItem> = handles
            .iter()
            .map(|handle| BatchItem::new(record_for(handle), handle.clone()))
            .collect();
        inner.remember(handles);
        inner
            .writer
            .replace_light(PrimaryClassification::light(&batch))
            .await;
        debug!(assets = batch.len(), "light categories rebuilt");
        if inner.active_runs.load(Ordering::SeqCst) == 0 {
            inner.set_state(PipelineState::Idle);
        }
    }

    fn ensure_listener(&self) {
        let mut slot = self.inner.listener.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let changes = self.inner.library.subscribe();
        *slot = Some(tokio::spawn(listen(Arc::downgrade(&self.inner), changes)));
    }
}

async fn listen(inner: Weak<Inner>, mut changes: broadcast::Receiver<LibraryChange>) {
    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed library changes, treating as reset");
                LibraryChange::Reset
            }
            Err(RecvError::Closed) => break,
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        Pipeline { inner }.handle_change(change).await;
    }
}

fn record_for(handle: &AssetHandle) -> AssetRecord {
    AssetRecord {
        id: handle.id.clone(),
        size_bytes: resource_volume(handle),
        created_at: handle.created_at.unwrap_or(0),
    }
}

impl Inner {
    fn set_state(&self, state: PipelineState) {
        self.published.send_modify(|s| s.state = state);
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn remember(&self, handles: impl IntoIterator<Item = AssetHandle>) {
        let mut assets = self.assets.write();
        for handle in handles {
            assets.insert(handle.id.clone(), handle);
        }
    }

    /// Load persisted state once per pipeline. The dashboard is published
    /// first so it can be shown before the categories are decoded.
    async fn restore(&self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(dashboard) = self.store.load_dashboard().await {
            self.published.send_modify(|s| {
                s.total_bytes = dashboard.total_bytes;
                s.dashboard = dashboard;
            });
        }
        let book = self.store.load_categories().await;
        // A cursor without its categories would skip work whose results are lost.
        let cursor = match book {
            Some(_) => self.store.load_progress().await,
            None => None,
        };
        debug!(
            categories = book.is_some(),
            cursor = cursor.is_some(),
            "restored persisted state"
        );
        self.writer.restore(cursor, book).await;
    }

    async fn run_phases(&self, generation: u64, cursor: &ProgressCursor) {
        self.run_phase(Phase::Primary, generation, cursor).await;
        tokio::join!(
            self.run_phase(Phase::Similarity, generation, cursor),
            self.run_phase(Phase::Duplication, generation, cursor),
            self.run_phase(Phase::Oversized, generation, cursor),
        );
        tokio::join!(
            self.run_phase(Phase::BlurDetection, generation, cursor),
            self.run_phase(Phase::TextDetection, generation, cursor),
        );
    }

    async fn run_phase(&self, phase: Phase, generation: u64, cursor: &ProgressCursor) {
        let count = self.scheduler.segment_count().await;
        let start = cursor.next_segment(phase);
        if start >= count {
            debug!(%phase, segments = count, "phase already complete");
            return;
        }
        info!(%phase, from = start, segments = count, "phase started");

        let analyzer = self.analyzers.for_phase(phase);
        for index in start..count {
            if self.is_superseded(generation) {
                debug!(%phase, index, "phase abandoned");
                return;
            }
            let Some(segment) = self.scheduler.materialize(index).await else {
                warn!(%phase, index, "segment unavailable, skipping");
                continue;
            };
            let batch = self.batch_for(&segment).await;
            let analyzer = analyzer.clone();
            let findings = match tokio::task::spawn_blocking(move || analyzer.analyze(&batch)).await {
                Ok(findings) => findings,
                Err(err) => {
                    warn!(%phase, index, %err, "analyzer task failed, skipping segment");
                    continue;
                }
            };
            self.writer.apply(generation, phase, index, findings).await;
            self.published.send_modify(|s| {
                s.record_progress(PhaseProgress {
                    phase,
                    segment: index,
                    segment_count: count,
                })
            });
        }
        info!(%phase, "phase finished");
    }

    /// Pair each record with its live handle. Records whose asset can no
    /// longer be resolved are left out.
    async fn batch_for(&self, segment: &Segment) -> Vec<BatchItem> {
        let missing: Vec<AssetId> = {
            let assets = self.assets.read();
            segment
                .ids()
                .filter(|id| !assets.contains_key(*id))
                .cloned()
                .collect()
        };
        if !missing.is_empty() {
            let resolved = self.library.resolve_many(&missing).await;
            self.remember(resolved);
        }

        let assets = self.assets.read();
        segment
            .entries
            .iter()
            .filter_map(|record| {
                let handle = assets.get(&record.id)?;
                Some(BatchItem::new(record.clone(), handle.clone()))
            })
            .collect()
    }
}
