//! Analyzer inputs and outputs.

use std::collections::HashSet;

use photosweep_core::{AssetHandle, AssetId, AssetRecord, Category, Phase};

/// One asset of a segment: its cached record plus its live handle.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub record: AssetRecord,
    pub handle: AssetHandle,
}

impl BatchItem {
    pub fn new(record: AssetRecord, handle: AssetHandle) -> Self {
        Self { record, handle }
    }

    pub fn id(&self) -> &AssetId {
        &self.record.id
    }
}

/// Clusters discovered in one batch, with the records of their members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupFindings {
    pub sets: Vec<Vec<AssetId>>,
    pub models: Vec<AssetRecord>,
}

impl GroupFindings {
    /// Build findings from clusters, picking member records out of `batch`.
    pub fn from_clusters(sets: Vec<Vec<AssetId>>, batch: &[BatchItem]) -> Self {
        let models = {
            let members: HashSet<&AssetId> = sets.iter().flatten().collect();
            batch
                .iter()
                .filter(|item| members.contains(item.id()))
                .map(|item| item.record.clone())
                .collect()
        };
        Self { sets, models }
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// What an analyzer found for one category.
#[derive(Debug, Clone, PartialEq)]
pub enum Findings {
    /// Assets belonging to a single-value category.
    Singles(Vec<AssetRecord>),
    /// Clusters belonging to a grouped category.
    Groups(GroupFindings),
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        match self {
            Findings::Singles(records) => records.is_empty(),
            Findings::Groups(groups) => groups.is_empty(),
        }
    }
}

/// Findings tagged with their category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryFindings {
    pub category: Category,
    pub findings: Findings,
}

impl CategoryFindings {
    pub fn singles(category: Category, records: Vec<AssetRecord>) -> Self {
        Self {
            category,
            findings: Findings::Singles(records),
        }
    }

    pub fn groups(category: Category, groups: GroupFindings) -> Self {
        Self {
            category,
            findings: Findings::Groups(groups),
        }
    }
}

/// A stateless analysis over one segment's worth of assets.
///
/// Implementations are CPU-bound and synchronous; the pipeline runs them on
/// blocking threads. Assets that cannot be decoded are left out of the
/// findings.
pub trait CategoryAnalyzer: Send + Sync {
    /// Phase whose cursor tracks this analyzer.
    fn phase(&self) -> Phase;

    /// Analyze one batch.
    fn analyze(&self, batch: &[BatchItem]) -> Vec<CategoryFindings>;
}
