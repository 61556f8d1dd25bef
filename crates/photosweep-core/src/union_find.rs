//! Arena-indexed disjoint sets over asset ids.
//!
//! Asset ids are interned to dense indices so the parent and rank arrays can
//! be plain vectors. Components are reported in first-seen order, which keeps
//! group ordering stable across merges.

use std::collections::HashMap;

use crate::AssetId;

/// Disjoint-set forest with union by rank and path halving.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// Create a forest of `len` singleton sets.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    /// Add a new singleton set and return its index.
    pub fn push(&mut self) -> usize {
        let index = self.parent.len();
        self.parent.push(index);
        self.rank.push(0);
        index
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Check if the forest is empty.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Find the representative of `x`.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets containing `a` and `b`. Returns false if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }

    /// Collect components as lists of element indices.
    ///
    /// Components are ordered by their smallest element, and elements within
    /// a component keep ascending order.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut out: Vec<Vec<usize>> = Vec::new();
        for x in 0..self.len() {
            let root = self.find(x);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                out.push(Vec::new());
                out.len() - 1
            });
            out[slot].push(x);
        }
        out
    }
}

/// Disjoint sets keyed by asset id.
#[derive(Debug, Clone, Default)]
pub struct IdUnion {
    index_of: HashMap<AssetId, usize>,
    ids: Vec<AssetId>,
    sets: DisjointSet,
}

impl IdUnion {
    /// Create an empty structure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an id, returning its dense index.
    pub fn intern(&mut self, id: &AssetId) -> usize {
        if let Some(&index) = self.index_of.get(id) {
            return index;
        }
        let index = self.sets.push();
        self.index_of.insert(id.clone(), index);
        self.ids.push(id.clone());
        index
    }

    /// Join every id of `members` into one set.
    pub fn join_all<'a>(&mut self, members: impl IntoIterator<Item = &'a AssetId>) {
        let mut first = None;
        for id in members {
            let index = self.intern(id);
            match first {
                None => first = Some(index),
                Some(head) => {
                    self.sets.union(head, index);
                }
            }
        }
    }

    /// Join two ids.
    pub fn join(&mut self, a: &AssetId, b: &AssetId) {
        let (a, b) = (self.intern(a), self.intern(b));
        self.sets.union(a, b);
    }

    /// Consume the structure and return id clusters in first-seen order.
    pub fn into_clusters(mut self) -> Vec<Vec<AssetId>> {
        let components = self.sets.components();
        components
            .into_iter()
            .map(|members| members.into_iter().map(|i| self.ids[i].clone()).collect())
            .collect()
    }
}
