//! Dashboard projection of the category book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{AssetId, Category, CategoryBook};

/// Representative thumbnails shown per dashboard cell.
pub const REPRESENTATIVE_COUNT: usize = 2;

/// Summary of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardCell {
    pub category: Category,
    pub total_bytes: i64,
    pub item_count: usize,
    pub representative_ids: Vec<AssetId>,
}

/// Read-only, UI-facing summary of every category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub cells: Vec<DashboardCell>,
    /// Sum of the cell totals.
    pub total_bytes: i64,
    pub generated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Derive a snapshot from the accumulated categories.
    pub fn from_book(book: &CategoryBook) -> Self {
        let cells: Vec<DashboardCell> = Category::iter()
            .map(|category| DashboardCell {
                category,
                total_bytes: book.category_bytes(category),
                item_count: book.category_count(category),
                representative_ids: book.representative_ids(category, REPRESENTATIVE_COUNT),
            })
            .collect();
        let total_bytes = cells.iter().map(|c| c.total_bytes).sum();

        Self {
            cells,
            total_bytes,
            generated_at: Utc::now(),
        }
    }

    /// Get the cell for a category.
    pub fn cell(&self, category: Category) -> Option<&DashboardCell> {
        self.cells.iter().find(|c| c.category == category)
    }
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self::from_book(&CategoryBook::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssetRecord;

    #[test]
    fn test_snapshot_cells_follow_category_order() {
        let snapshot = DashboardSnapshot::default();
        let order: Vec<Category> = snapshot.cells.iter().map(|c| c.category).collect();
        assert_eq!(order, Category::iter().collect::<Vec<_>>());
        assert_eq!(order[0], Category::Screenshot);
        assert_eq!(order[9], Category::Duplicate);
        assert_eq!(snapshot.total_bytes, 0);
    }

    #[test]
    fn test_snapshot_totals_and_representatives() {
        let mut book = CategoryBook::new();
        book.merge_single(
            Category::Screenshot,
            vec![
                AssetRecord::new("s1", 10, 0),
                AssetRecord::new("s2", 20, 0),
                AssetRecord::new("s3", 30, 0),
            ],
        );
        book.merge_groups(
            Category::Duplicate,
            &[vec!["d1".into(), "d2".into()]],
            &[AssetRecord::new("d1", 5, 0), AssetRecord::new("d2", 7, 0)],
        );

        let snapshot = DashboardSnapshot::from_book(&book);
        let shots = snapshot.cell(Category::Screenshot).unwrap();
        assert_eq!(shots.item_count, 3);
        assert_eq!(shots.representative_ids.len(), REPRESENTATIVE_COUNT);

        let dups = snapshot.cell(Category::Duplicate).unwrap();
        assert_eq!(dups.item_count, 2);
        assert_eq!(dups.representative_ids, vec![AssetId::from("d2")]);
        assert_eq!(snapshot.total_bytes, 72);
    }
}
