//! Single-writer merge path.
//!
//! One task owns the category book and the progress cursor. Analyzer phases
//! hand their per-segment findings to it through a command channel; it
//! applies them in arrival order, republishes the derived state and
//! persists on a throttle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use photosweep_analyze::{CategoryFindings, Findings, PrimaryClassification};
use photosweep_core::{AssetId, CategoryBook, DashboardSnapshot, Phase, ProgressCursor};

use crate::persist::{PersistedState, StateStore};
use crate::snapshot::PipelineSnapshot;

/// Capacity of the writer command channel.
pub const WRITER_CHANNEL_SIZE: usize = 32;

enum WriterCommand {
    Restore {
        cursor: Option<ProgressCursor>,
        book: Option<CategoryBook>,
        done: oneshot::Sender<()>,
    },
    Begin {
        generation: u64,
        snapshot_id: String,
        current: HashMap<AssetId, i64>,
        done: oneshot::Sender<ProgressCursor>,
    },
    Apply {
        generation: u64,
        phase: Phase,
        index: usize,
        findings: Vec<CategoryFindings>,
        done: oneshot::Sender<()>,
    },
    ReplaceLight {
        classification: PrimaryClassification,
        done: oneshot::Sender<()>,
    },
    Remove {
        ids: HashSet<AssetId>,
        done: oneshot::Sender<i64>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// Handle to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct MergeWriter {
    tx: mpsc::Sender<WriterCommand>,
}

struct WriterState {
    book: CategoryBook,
    cursor: ProgressCursor,
    generation: u64,
    /// Ids removed since the current generation began. Findings computed
    /// before the removal must not bring them back.
    tombstones: HashSet<AssetId>,
    store: StateStore,
    save_interval: usize,
    unsaved: usize,
    published: Arc<watch::Sender<PipelineSnapshot>>,
}

impl MergeWriter {
    /// Spawn the writer task. Must be called within a tokio runtime.
    pub fn spawn(
        store: StateStore,
        save_interval: usize,
        published: Arc<watch::Sender<PipelineSnapshot>>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(WRITER_CHANNEL_SIZE);
        let state = WriterState {
            book: CategoryBook::new(),
            cursor: ProgressCursor::default(),
            generation: 0,
            tombstones: HashSet::new(),
            store,
            save_interval: save_interval.max(1),
            unsaved: 0,
            published,
        };
        tokio::spawn(run(state, rx));
        Self { tx }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> WriterCommand) -> Option<T> {
        let (done, rx) = oneshot::channel();
        self.tx.send(make(done)).await.ok()?;
        rx.await.ok()
    }

    /// Replace the in-memory state with restored documents.
    pub async fn restore(&self, cursor: Option<ProgressCursor>, book: Option<CategoryBook>) {
        self.request(|done| WriterCommand::Restore { cursor, book, done })
            .await;
    }

    /// Start a scan generation against a library snapshot.
    ///
    /// A cursor recorded for another snapshot is reset, and the book is
    /// pruned of ids that are gone or whose size changed (`current` maps
    /// every id to its current size). Returns the cursor to resume from.
    pub async fn begin(
        &self,
        generation: u64,
        snapshot_id: String,
        current: HashMap<AssetId, i64>,
    ) -> ProgressCursor {
        self.request(|done| WriterCommand::Begin {
            generation,
            snapshot_id,
            current,
            done,
        })
        .await
        .unwrap_or_default()
    }

    /// Merge one segment's findings and advance the phase cursor.
    /// Findings from a superseded generation are dropped.
    pub async fn apply(
        &self,
        generation: u64,
        phase: Phase,
        index: usize,
        findings: Vec<CategoryFindings>,
    ) {
        self.request(|done| WriterCommand::Apply {
            generation,
            phase,
            index,
            findings,
            done,
        })
        .await;
    }

    /// Rebuild the metadata-only categories wholesale.
    pub async fn replace_light(&self, classification: PrimaryClassification) {
        self.request(|done| WriterCommand::ReplaceLight {
            classification,
            done,
        })
        .await;
    }

    /// Remove ids from every category and persist. Returns bytes removed.
    pub async fn remove(&self, ids: HashSet<AssetId>) -> i64 {
        self.request(|done| WriterCommand::Remove { ids, done })
            .await
            .unwrap_or(0)
    }

    /// Persist immediately, ignoring the throttle.
    pub async fn flush(&self) {
        self.request(|done| WriterCommand::Flush { done }).await;
    }
}

async fn run(mut state: WriterState, mut rx: mpsc::Receiver<WriterCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriterCommand::Restore { cursor, book, done } => {
                if let Some(cursor) = cursor {
                    state.cursor = cursor;
                }
                if let Some(book) = book {
                    state.book = book;
                }
                state.publish();
                let _ = done.send(());
            }
            WriterCommand::Begin {
                generation,
                snapshot_id,
                current,
                done,
            } => {
                state.generation = generation;
                state.tombstones.clear();
                if state.cursor.snapshot_id != snapshot_id {
                    let pruned = state.book.prune_stale(&current);
                    info!(
                        previous = %state.cursor.snapshot_id,
                        current = %snapshot_id,
                        pruned_bytes = pruned,
                        "library snapshot changed, restarting every phase"
                    );
                    state.cursor = ProgressCursor::new(snapshot_id);
                    state.persist().await;
                }
                let _ = done.send(state.cursor.clone());
            }
            WriterCommand::Apply {
                generation,
                phase,
                index,
                findings,
                done,
            } => {
                if generation == state.generation {
                    state.apply(phase, index, findings);
                    state.unsaved += 1;
                    if state.unsaved >= state.save_interval {
                        state.persist().await;
                    }
                } else {
                    debug!(generation, current = state.generation, %phase, index, "dropping stale findings");
                }
                let _ = done.send(());
            }
            WriterCommand::ReplaceLight {
                classification,
                done,
            } => {
                for found in classification.into_findings(true) {
                    if let Findings::Singles(mut records) = found.findings {
                        records.retain(|r| !state.tombstones.contains(&r.id));
                        state.book.replace_single(found.category, records);
                    }
                }
                state.persist().await;
                let _ = done.send(());
            }
            WriterCommand::Remove { ids, done } => {
                let removed = state.book.remove_assets(&ids);
                state.tombstones.extend(ids.iter().cloned());
                debug!(ids = ids.len(), removed, "reconciled deletion");
                state.persist().await;
                let _ = done.send(removed);
            }
            WriterCommand::Flush { done } => {
                state.persist().await;
                let _ = done.send(());
            }
        }
    }
}

impl WriterState {
    fn apply(&mut self, phase: Phase, index: usize, findings: Vec<CategoryFindings>) {
        let mut added = 0i64;
        for found in findings {
            added += match found.findings {
                Findings::Singles(mut records) => {
                    records.retain(|r| !self.tombstones.contains(&r.id));
                    self.book.merge_single(found.category, records)
                }
                Findings::Groups(mut groups) => {
                    for set in &mut groups.sets {
                        set.retain(|id| !self.tombstones.contains(id));
                    }
                    groups.models.retain(|r| !self.tombstones.contains(&r.id));
                    self.book
                        .merge_groups(found.category, &groups.sets, &groups.models)
                }
            };
        }
        self.cursor.advance(phase, index);
        debug!(%phase, index, added, "merged segment");
        self.publish_dashboard();
    }

    /// Publish the dashboard only. The full book is republished when it is
    /// persisted.
    fn publish_dashboard(&self) {
        let dashboard = DashboardSnapshot::from_book(&self.book);
        self.published.send_modify(|snapshot| {
            snapshot.total_bytes = dashboard.total_bytes;
            snapshot.dashboard = dashboard;
        });
    }

    fn publish(&self) {
        let book = Arc::new(self.book.clone());
        let dashboard = DashboardSnapshot::from_book(&self.book);
        self.published.send_modify(|snapshot| {
            snapshot.total_bytes = book.total_bytes();
            snapshot.categories = book;
            snapshot.dashboard = dashboard;
        });
    }

    async fn persist(&mut self) {
        self.unsaved = 0;
        self.publish();
        let dashboard = DashboardSnapshot::from_book(&self.book);
        let result = self
            .store
            .save(PersistedState {
                cursor: &self.cursor,
                book: &self.book,
                dashboard: &dashboard,
            })
            .await;
        if let Err(err) = result {
            warn!(%err, "failed to persist pipeline state");
        }
    }
}
