//! Resumability cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::DATA_FORMAT_VERSION;

/// One resumable pass over all segments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Screenshot, live photo, video and camera-facing buckets.
    Primary,
    Similarity,
    Duplication,
    Oversized,
    BlurDetection,
    TextDetection,
}

/// Last fully processed segment index per phase.
///
/// Every cursor starts at -1 ("nothing processed") and only moves forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCursor {
    pub last_primary_phase: i64,
    pub last_similarity_phase: i64,
    pub last_duplication_phase: i64,
    pub last_oversized_phase: i64,
    pub last_blur_detection_phase: i64,
    pub last_text_detection_phase: i64,
    /// Snapshot identity of the library the cursor was recorded against.
    pub snapshot_id: String,
    pub data_format_version: u32,
    pub updated_at: DateTime<Utc>,
}

impl ProgressCursor {
    /// Create a fresh cursor for a library snapshot.
    pub fn new(snapshot_id: impl Into<String>) -> Self {
        Self {
            last_primary_phase: -1,
            last_similarity_phase: -1,
            last_duplication_phase: -1,
            last_oversized_phase: -1,
            last_blur_detection_phase: -1,
            last_text_detection_phase: -1,
            snapshot_id: snapshot_id.into(),
            data_format_version: DATA_FORMAT_VERSION,
            updated_at: Utc::now(),
        }
    }

    fn slot(&mut self, phase: Phase) -> &mut i64 {
        match phase {
            Phase::Primary => &mut self.last_primary_phase,
            Phase::Similarity => &mut self.last_similarity_phase,
            Phase::Duplication => &mut self.last_duplication_phase,
            Phase::Oversized => &mut self.last_oversized_phase,
            Phase::BlurDetection => &mut self.last_blur_detection_phase,
            Phase::TextDetection => &mut self.last_text_detection_phase,
        }
    }

    /// Last processed index for a phase (-1 if none).
    pub fn last(&self, phase: Phase) -> i64 {
        match phase {
            Phase::Primary => self.last_primary_phase,
            Phase::Similarity => self.last_similarity_phase,
            Phase::Duplication => self.last_duplication_phase,
            Phase::Oversized => self.last_oversized_phase,
            Phase::BlurDetection => self.last_blur_detection_phase,
            Phase::TextDetection => self.last_text_detection_phase,
        }
    }

    /// First segment index a phase still has to process.
    pub fn next_segment(&self, phase: Phase) -> usize {
        (self.last(phase) + 1).max(0) as usize
    }

    /// Record that `index` has been fully processed. Never moves backwards.
    ///
    /// Returns true if the cursor moved.
    pub fn advance(&mut self, phase: Phase, index: usize) -> bool {
        let index = index as i64;
        let slot = self.slot(phase);
        if index <= *slot {
            return false;
        }
        *slot = index;
        self.updated_at = Utc::now();
        true
    }

    /// Check if a phase has covered all `segment_count` segments.
    pub fn is_complete(&self, phase: Phase, segment_count: usize) -> bool {
        self.next_segment(phase) >= segment_count
    }

    /// Check if the stored format matches the current one.
    pub fn is_current_format(&self) -> bool {
        self.data_format_version == DATA_FORMAT_VERSION
    }
}

impl Default for ProgressCursor {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_fresh_cursor() {
        let cursor = ProgressCursor::new("abc_3");
        for phase in Phase::iter() {
            assert_eq!(cursor.last(phase), -1);
            assert_eq!(cursor.next_segment(phase), 0);
            assert!(!cursor.is_complete(phase, 1));
            assert!(cursor.is_complete(phase, 0));
        }
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut cursor = ProgressCursor::new("abc_3");
        assert!(cursor.advance(Phase::Similarity, 1));
        assert!(!cursor.advance(Phase::Similarity, 0));
        assert_eq!(cursor.last(Phase::Similarity), 1);
        assert_eq!(cursor.next_segment(Phase::Similarity), 2);
        assert_eq!(cursor.last(Phase::Duplication), -1);
    }

    #[test]
    fn test_json_field_names() {
        let cursor = ProgressCursor::new("abc_3");
        let json = serde_json::to_value(&cursor).unwrap();
        assert_eq!(json["lastPrimaryPhase"], -1);
        assert_eq!(json["lastBlurDetectionPhase"], -1);
        assert_eq!(json["dataFormatVersion"], DATA_FORMAT_VERSION);
    }
}
