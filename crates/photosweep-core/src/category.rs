//! Category accumulators and their merge rules.
//!
//! Single-value categories hold a set of records keyed by id. Grouped
//! categories hold clusters of visually related records. Both track their
//! reclaimable byte total incrementally: merges add exactly the bytes of ids
//! that were not present before, and removals subtract exactly the bytes of
//! the ids that were actually removed.

use std::collections::{BTreeMap, HashMap, HashSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::union_find::IdUnion;
use crate::{AssetId, AssetRecord};

/// Classification bucket. Declaration order is the dashboard order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Screenshot,
    LivePhoto,
    Selfie,
    BackCamera,
    Video,
    LargeVideo,
    Blurry,
    Text,
    Similar,
    Duplicate,
}

impl Category {
    /// Check if this category holds clusters instead of a flat set.
    pub fn is_grouped(self) -> bool {
        matches!(self, Self::Similar | Self::Duplicate)
    }

    /// Human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Screenshot => "Screenshots",
            Self::LivePhoto => "Live Photos",
            Self::Selfie => "Selfies",
            Self::BackCamera => "Back Camera",
            Self::Video => "Videos",
            Self::LargeVideo => "Large Videos",
            Self::Blurry => "Blurry",
            Self::Text => "Text Photos",
            Self::Similar => "Similar",
            Self::Duplicate => "Duplicates",
        }
    }

    /// All single-value categories in dashboard order.
    pub fn singles() -> impl Iterator<Item = Category> {
        Self::iter().filter(|c| !c.is_grouped())
    }

    /// All grouped categories in dashboard order.
    pub fn grouped() -> impl Iterator<Item = Category> {
        Self::iter().filter(|c| c.is_grouped())
    }
}

mod record_list {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::{AssetId, AssetRecord};

    pub fn serialize<S: Serializer>(
        map: &IndexMap<AssetId, AssetRecord>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<AssetId, AssetRecord>, D::Error> {
        let records = Vec::<AssetRecord>::deserialize(deserializer)?;
        Ok(records.into_iter().map(|r| (r.id.clone(), r)).collect())
    }
}

/// Flat, set-semantics accumulator for a single-value category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SingleCategory {
    #[serde(with = "record_list")]
    assets: IndexMap<AssetId, AssetRecord>,
    total_bytes: i64,
}

impl SingleCategory {
    /// Create an empty category.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Check if the category is empty.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Reclaimable bytes.
    pub fn total_bytes(&self) -> i64 {
        self.total_bytes
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &AssetRecord> {
        self.assets.values()
    }

    /// Ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &AssetId> {
        self.assets.keys()
    }

    /// Check membership by id.
    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    /// Add records whose id is not yet present.
    ///
    /// Returns the bytes actually added, so re-merging the same records is a
    /// no-op.
    pub fn merge(&mut self, records: impl IntoIterator<Item = AssetRecord>) -> i64 {
        let mut added = 0i64;
        for record in records {
            if self.assets.contains_key(&record.id) {
                continue;
            }
            added = added.wrapping_add(record.size_bytes);
            self.assets.insert(record.id.clone(), record);
        }
        self.total_bytes = self.total_bytes.wrapping_add(added);
        added
    }

    /// Remove every record whose id is in `ids`. Returns the bytes removed.
    pub fn remove(&mut self, ids: &HashSet<AssetId>) -> i64 {
        let mut removed = 0i64;
        self.assets.retain(|id, record| {
            if ids.contains(id) {
                removed = removed.wrapping_add(record.size_bytes);
                false
            } else {
                true
            }
        });
        self.total_bytes = self.total_bytes.wrapping_sub(removed);
        removed
    }

    /// Replace the content wholesale and recompute the total.
    pub fn replace(&mut self, records: impl IntoIterator<Item = AssetRecord>) {
        self.assets.clear();
        self.total_bytes = 0;
        self.merge(records);
    }

    /// Up to `n` leading ids.
    pub fn representative_ids(&self, n: usize) -> Vec<AssetId> {
        self.assets.keys().take(n).cloned().collect()
    }
}

/// Cluster accumulator for a grouped category.
///
/// Each group keeps at least two members, sorted by descending size so the
/// first member is the natural keep candidate.
///
/// `counted` holds every id whose bytes are in `total_bytes`. It is a
/// superset of the current members: survivors of a dissolved group stay
/// counted until they are removed themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedCategory {
    groups: Vec<Vec<AssetRecord>>,
    total_bytes: i64,
    #[serde(default)]
    counted: BTreeMap<AssetId, i64>,
}

impl GroupedCategory {
    /// Create an empty category.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reclaimable bytes.
    pub fn total_bytes(&self) -> i64 {
        self.total_bytes
    }

    /// Group models, largest member first.
    pub fn groups(&self) -> &[Vec<AssetRecord>] {
        &self.groups
    }

    /// Identifier sets, parallel to [`groups`](Self::groups).
    pub fn identifier_sets(&self) -> Vec<Vec<AssetId>> {
        self.groups
            .iter()
            .map(|g| g.iter().map(|r| r.id.clone()).collect())
            .collect()
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Check if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of distinct member ids across all groups.
    pub fn member_count(&self) -> usize {
        self.member_ids().len()
    }

    /// Check membership by id.
    pub fn contains(&self, id: &str) -> bool {
        self.groups.iter().flatten().any(|r| r.id.as_str() == id)
    }

    fn member_ids(&self) -> HashSet<&AssetId> {
        self.groups.iter().flatten().map(|r| &r.id).collect()
    }

    /// Merge newly discovered clusters into the existing groups.
    ///
    /// Any new set sharing an id with an existing group is unioned into it,
    /// transitively. Models are looked up among known members first, then
    /// among `supplied`; unresolvable ids are dropped, as are groups left
    /// with fewer than two members. Returns the bytes of ids that were not
    /// counted before this merge.
    pub fn merge(&mut self, new_sets: &[Vec<AssetId>], supplied: &[AssetRecord]) -> i64 {
        if new_sets.is_empty() {
            return 0;
        }

        let mut lookup: HashMap<AssetId, AssetRecord> = HashMap::new();
        for record in self.groups.iter().flatten().chain(supplied) {
            lookup.entry(record.id.clone()).or_insert_with(|| record.clone());
        }

        let mut union = IdUnion::new();
        for group in &self.groups {
            union.join_all(group.iter().map(|r| &r.id));
        }
        for set in new_sets {
            union.join_all(set);
        }

        let mut groups = Vec::new();
        let mut added = 0i64;
        for cluster in union.into_clusters() {
            let mut models: Vec<AssetRecord> = cluster
                .iter()
                .filter_map(|id| lookup.get(id).cloned())
                .collect();
            if models.len() < 2 {
                continue;
            }
            models.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
            for record in &models {
                if !self.counted.contains_key(&record.id) {
                    self.counted.insert(record.id.clone(), record.size_bytes);
                    added = added.wrapping_add(record.size_bytes);
                }
            }
            groups.push(models);
        }

        self.groups = groups;
        self.total_bytes = self.total_bytes.wrapping_add(added);
        added
    }

    /// Remove members whose id is in `ids` and drop undersized groups.
    ///
    /// Returns the bytes of the counted ids actually removed. Surviving
    /// members of dissolved groups stay counted.
    pub fn remove(&mut self, ids: &HashSet<AssetId>) -> i64 {
        let mut removed = 0i64;
        for id in ids {
            if let Some(size) = self.counted.remove(id) {
                removed = removed.wrapping_add(size);
            }
        }
        for group in &mut self.groups {
            group.retain(|record| !ids.contains(&record.id));
        }
        self.groups.retain(|g| g.len() >= 2);
        self.total_bytes = self.total_bytes.wrapping_sub(removed);
        removed
    }

    /// First member of up to `n` leading groups.
    pub fn representative_ids(&self, n: usize) -> Vec<AssetId> {
        self.groups
            .iter()
            .filter_map(|g| g.first())
            .take(n)
            .map(|r| r.id.clone())
            .collect()
    }
}

/// All category accumulators, keyed by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBook {
    singles: BTreeMap<Category, SingleCategory>,
    grouped: BTreeMap<Category, GroupedCategory>,
}

impl Default for CategoryBook {
    fn default() -> Self {
        Self::new()
    }
}

impl CategoryBook {
    /// Create a book with every category present and empty.
    pub fn new() -> Self {
        Self {
            singles: Category::singles().map(|c| (c, SingleCategory::new())).collect(),
            grouped: Category::grouped().map(|c| (c, GroupedCategory::new())).collect(),
        }
    }

    /// Get a single-value category.
    pub fn single(&self, category: Category) -> Option<&SingleCategory> {
        self.singles.get(&category)
    }

    /// Get a grouped category.
    pub fn grouped(&self, category: Category) -> Option<&GroupedCategory> {
        self.grouped.get(&category)
    }

    /// Merge flat results into a single-value category. Returns bytes added.
    pub fn merge_single(
        &mut self,
        category: Category,
        records: impl IntoIterator<Item = AssetRecord>,
    ) -> i64 {
        debug_assert!(!category.is_grouped(), "{category} is a grouped category");
        self.singles.entry(category).or_default().merge(records)
    }

    /// Merge clusters into a grouped category. Returns bytes added.
    pub fn merge_groups(
        &mut self,
        category: Category,
        sets: &[Vec<AssetId>],
        supplied: &[AssetRecord],
    ) -> i64 {
        debug_assert!(category.is_grouped(), "{category} is not a grouped category");
        self.grouped.entry(category).or_default().merge(sets, supplied)
    }

    /// Replace a single-value category wholesale.
    pub fn replace_single(
        &mut self,
        category: Category,
        records: impl IntoIterator<Item = AssetRecord>,
    ) {
        self.singles.entry(category).or_default().replace(records);
    }

    /// Remove ids from every category. Returns the total bytes removed,
    /// summed per category.
    pub fn remove_assets(&mut self, ids: &HashSet<AssetId>) -> i64 {
        if ids.is_empty() {
            return 0;
        }
        let singles: i64 = self.singles.values_mut().map(|c| c.remove(ids)).sum();
        let grouped: i64 = self.grouped.values_mut().map(|c| c.remove(ids)).sum();
        singles + grouped
    }

    /// Remove every id that is missing from `current`, or whose recorded
    /// size no longer matches its current size. Returns the total bytes
    /// removed.
    pub fn prune_stale(&mut self, current: &HashMap<AssetId, i64>) -> i64 {
        let singles = self
            .singles
            .values()
            .flat_map(|c| c.records())
            .map(|r| (&r.id, r.size_bytes));
        let grouped = self
            .grouped
            .values()
            .flat_map(|c| c.counted.iter())
            .map(|(id, size)| (id, *size));
        let stale: HashSet<AssetId> = singles
            .chain(grouped)
            .filter(|(id, size)| current.get(*id) != Some(size))
            .map(|(id, _)| id.clone())
            .collect();
        self.remove_assets(&stale)
    }

    /// Reclaimable bytes of one category.
    pub fn category_bytes(&self, category: Category) -> i64 {
        if category.is_grouped() {
            self.grouped.get(&category).map_or(0, |c| c.total_bytes())
        } else {
            self.singles.get(&category).map_or(0, |c| c.total_bytes())
        }
    }

    /// Item count of one category (distinct members for grouped ones).
    pub fn category_count(&self, category: Category) -> usize {
        if category.is_grouped() {
            self.grouped.get(&category).map_or(0, |c| c.member_count())
        } else {
            self.singles.get(&category).map_or(0, |c| c.len())
        }
    }

    /// Up to `n` representative ids for a category.
    pub fn representative_ids(&self, category: Category, n: usize) -> Vec<AssetId> {
        if category.is_grouped() {
            self.grouped
                .get(&category)
                .map(|c| c.representative_ids(n))
                .unwrap_or_default()
        } else {
            self.singles
                .get(&category)
                .map(|c| c.representative_ids(n))
                .unwrap_or_default()
        }
    }

    /// Sum of all category totals. Assets in several categories count once
    /// per category.
    pub fn total_bytes(&self) -> i64 {
        Category::iter().map(|c| self.category_bytes(c)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, size: i64) -> AssetRecord {
        AssetRecord::new(id, size, 0)
    }

    fn ids(list: &[&str]) -> Vec<AssetId> {
        list.iter().map(|s| AssetId::from(*s)).collect()
    }

    #[test]
    fn test_single_merge_is_idempotent() {
        let mut cat = SingleCategory::new();
        let batch = vec![rec("a", 10), rec("b", 20)];

        assert_eq!(cat.merge(batch.clone()), 30);
        assert_eq!(cat.merge(batch), 0);
        assert_eq!(cat.len(), 2);
        assert_eq!(cat.total_bytes(), 30);
    }

    #[test]
    fn test_single_merge_counts_only_new_entries() {
        let mut cat = SingleCategory::new();
        cat.merge(vec![rec("a", 10)]);
        assert_eq!(cat.merge(vec![rec("a", 10), rec("c", 5)]), 5);
        assert_eq!(cat.total_bytes(), 15);
    }

    #[test]
    fn test_single_remove_is_exact() {
        let mut cat = SingleCategory::new();
        cat.merge(vec![rec("a", 10), rec("b", 20), rec("c", 30)]);

        let gone: HashSet<AssetId> = ids(&["b", "zzz"]).into_iter().collect();
        assert_eq!(cat.remove(&gone), 20);
        assert_eq!(cat.total_bytes(), 40);
        assert_eq!(cat.ids().cloned().collect::<Vec<_>>(), ids(&["a", "c"]));
    }

    #[test]
    fn test_grouped_transitive_union() {
        let mut cat = GroupedCategory::new();
        cat.merge(&[ids(&["a", "b"])], &[rec("a", 10), rec("b", 20)]);
        assert_eq!(cat.total_bytes(), 30);

        let added = cat.merge(&[ids(&["b", "c"])], &[rec("b", 20), rec("c", 5)]);
        assert_eq!(added, 5);
        assert_eq!(cat.group_count(), 1);
        assert_eq!(cat.groups()[0].len(), 3);
        assert_eq!(cat.total_bytes(), 35);
    }

    #[test]
    fn test_grouped_bridge_collapses_groups() {
        let mut cat = GroupedCategory::new();
        let supplied = vec![rec("a", 1), rec("b", 2), rec("c", 3), rec("d", 4)];
        cat.merge(&[ids(&["a", "b"]), ids(&["c", "d"])], &supplied);
        assert_eq!(cat.group_count(), 2);

        cat.merge(&[ids(&["b", "c"])], &[]);
        assert_eq!(cat.group_count(), 1);
        assert_eq!(cat.total_bytes(), 10);
    }

    #[test]
    fn test_grouped_models_sorted_descending() {
        let mut cat = GroupedCategory::new();
        cat.merge(&[ids(&["s", "l", "m"])], &[rec("s", 1), rec("l", 100), rec("m", 50)]);
        let order: Vec<&str> = cat.groups()[0].iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["l", "m", "s"]);
        assert_eq!(cat.representative_ids(2), ids(&["l"]));
    }

    #[test]
    fn test_grouped_drops_unresolvable_and_singletons() {
        let mut cat = GroupedCategory::new();
        let added = cat.merge(&[ids(&["a", "ghost"]), ids(&["x"])], &[rec("a", 10), rec("x", 1)]);
        assert_eq!(added, 0);
        assert!(cat.is_empty());
    }

    #[test]
    fn test_grouped_remove_largest_member() {
        let mut cat = GroupedCategory::new();
        cat.merge(&[ids(&["a", "b", "c"])], &[rec("a", 300), rec("b", 200), rec("c", 100)]);
        assert_eq!(cat.total_bytes(), 600);

        let gone: HashSet<AssetId> = ids(&["a"]).into_iter().collect();
        assert_eq!(cat.remove(&gone), 300);
        assert_eq!(cat.group_count(), 1);
        assert_eq!(cat.groups()[0].len(), 2);
        assert_eq!(cat.total_bytes(), 300);
    }

    #[test]
    fn test_grouped_remove_collapses_group() {
        let mut cat = GroupedCategory::new();
        cat.merge(&[ids(&["a", "b", "c"])], &[rec("a", 300), rec("b", 200), rec("c", 100)]);

        let gone: HashSet<AssetId> = ids(&["a", "b"]).into_iter().collect();
        assert_eq!(cat.remove(&gone), 500);
        assert!(cat.is_empty());
        assert_eq!(cat.total_bytes(), 100);
    }

    #[test]
    fn test_grouped_survivor_regrouped_counts_once() {
        let mut cat = GroupedCategory::new();
        cat.merge(&[ids(&["a", "b", "c"])], &[rec("a", 300), rec("b", 200), rec("c", 100)]);
        cat.remove(&ids(&["a", "b"]).into_iter().collect());
        assert_eq!(cat.total_bytes(), 100);

        let added = cat.merge(&[ids(&["c", "d"])], &[rec("c", 100), rec("d", 50)]);
        assert_eq!(added, 50);
        assert_eq!(cat.total_bytes(), 150);
        assert_eq!(cat.member_count(), 2);
    }

    #[test]
    fn test_grouped_removing_dissolved_survivor_subtracts_it() {
        let mut cat = GroupedCategory::new();
        cat.merge(&[ids(&["a", "b"])], &[rec("a", 300), rec("b", 200)]);
        cat.remove(&ids(&["a"]).into_iter().collect());
        assert!(cat.is_empty());
        assert_eq!(cat.total_bytes(), 200);

        assert_eq!(cat.remove(&ids(&["b"]).into_iter().collect()), 200);
        assert_eq!(cat.total_bytes(), 0);
    }

    #[test]
    fn test_book_starts_with_every_category() {
        let book = CategoryBook::new();
        for category in Category::iter() {
            assert_eq!(book.category_bytes(category), 0);
            if category.is_grouped() {
                assert!(book.grouped(category).is_some());
            } else {
                assert!(book.single(category).is_some());
            }
        }
    }

    #[test]
    fn test_book_total_double_counts_across_categories() {
        let mut book = CategoryBook::new();
        book.merge_single(Category::Video, vec![rec("v", 200)]);
        book.merge_single(Category::LargeVideo, vec![rec("v", 200)]);
        assert_eq!(book.total_bytes(), 400);
    }

    #[test]
    fn test_book_prune_stale() {
        let mut book = CategoryBook::new();
        book.merge_single(Category::Screenshot, vec![rec("a", 1), rec("b", 2), rec("c", 3)]);
        book.merge_groups(Category::Similar, &[ids(&["a", "b"])], &[rec("a", 1), rec("b", 2)]);

        // "b" is gone and "c" was re-encoded.
        let current: HashMap<AssetId, i64> = [("a".into(), 1), ("c".into(), 30)].into_iter().collect();
        assert_eq!(book.prune_stale(&current), 2 + 3 + 2);

        assert_eq!(book.category_bytes(Category::Screenshot), 1);
        assert!(book.grouped(Category::Similar).unwrap().is_empty());
    }

    #[test]
    fn test_book_serde_roundtrip_preserves_order() {
        let mut book = CategoryBook::new();
        book.merge_single(Category::Blurry, vec![rec("z", 1), rec("a", 2)]);

        let json = serde_json::to_string(&book).unwrap();
        let back: CategoryBook = serde_json::from_str(&json).unwrap();
        let order: Vec<&str> = back
            .single(Category::Blurry)
            .unwrap()
            .ids()
            .map(|id| id.as_str())
            .collect();
        assert_eq!(order, vec!["z", "a"]);
        assert_eq!(back, book);
    }
}
