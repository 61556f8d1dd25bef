//! Videos at or above a byte threshold.

use photosweep_core::{Category, MIB, Phase};

use crate::batch::{BatchItem, CategoryAnalyzer, CategoryFindings};

/// Selects videos whose stored size is at least `threshold` bytes.
#[derive(Debug, Clone, Copy)]
pub struct LargeVideoAnalyzer {
    threshold: i64,
}

impl LargeVideoAnalyzer {
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }
}

impl Default for LargeVideoAnalyzer {
    fn default() -> Self {
        Self::new(100 * MIB)
    }
}

impl CategoryAnalyzer for LargeVideoAnalyzer {
    fn phase(&self) -> Phase {
        Phase::Oversized
    }

    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings> {
        let large = batch
            .iter()
            .filter(|item| item.handle.is_video() && item.record.size_bytes >= self.threshold)
            .map(|item| item.record.clone())
            .collect();
        vec![CategoryFindings::singles(Category::LargeVideo, large)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Findings;
    use photosweep_core::{AssetHandle, AssetRecord, MediaType};

    fn item(id: &str, media_type: MediaType, size: i64) -> BatchItem {
        BatchItem::new(AssetRecord::new(id, size, 0), AssetHandle::new(id, media_type))
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let batch = vec![
            item("big", MediaType::Video, 150 * MIB),
            item("edge", MediaType::Video, 100 * MIB),
            item("small", MediaType::Video, 100 * MIB - 1),
            item("huge-photo", MediaType::Image, 500 * MIB),
        ];
        let findings = LargeVideoAnalyzer::default().analyze(&batch);
        let Findings::Singles(records) = &findings[0].findings else {
            panic!("expected flat findings");
        };
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["big", "edge"]);
        assert_eq!(findings[0].category, Category::LargeVideo);
    }
}
