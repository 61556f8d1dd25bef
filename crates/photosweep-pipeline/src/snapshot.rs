//! Published, read-only view of the pipeline.

use std::sync::Arc;

use serde::Serialize;

use photosweep_core::{
    CategoryBook, DashboardSnapshot, PermissionGuidance, Phase, PhaseProgress, PipelineState,
};

/// Last-value view of everything the pipeline publishes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    /// Sum of all category totals.
    pub total_bytes: i64,
    pub categories: Arc<CategoryBook>,
    pub dashboard: DashboardSnapshot,
    /// Latest position of every phase that has started in this run.
    pub progress: Vec<PhaseProgress>,
    /// Guidance to show while access is partial or missing.
    pub guidance: Option<PermissionGuidance>,
}

impl PipelineSnapshot {
    /// Progress of one phase, if it has started.
    pub fn phase_progress(&self, phase: Phase) -> Option<&PhaseProgress> {
        self.progress.iter().find(|p| p.phase == phase)
    }

    pub(crate) fn record_progress(&mut self, progress: PhaseProgress) {
        match self.progress.iter_mut().find(|p| p.phase == progress.phase) {
            Some(slot) => *slot = progress,
            None => self.progress.push(progress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_progress_replaces_phase() {
        let mut snapshot = PipelineSnapshot::default();
        snapshot.record_progress(PhaseProgress {
            phase: Phase::Primary,
            segment: 0,
            segment_count: 3,
        });
        snapshot.record_progress(PhaseProgress {
            phase: Phase::Primary,
            segment: 1,
            segment_count: 3,
        });
        assert_eq!(snapshot.progress.len(), 1);
        assert_eq!(snapshot.phase_progress(Phase::Primary).unwrap().segment, 1);
        assert!(snapshot.phase_progress(Phase::Similarity).is_none());
    }
}
