//! Pairwise clustering shared by the grouping analyzers.

use rayon::prelude::*;

use photosweep_core::{AssetId, IdUnion};

/// Whether two aspect ratios agree within a relative tolerance.
///
/// An unknown ratio never matches.
pub fn aspect_ratios_match(a: Option<f64>, b: Option<f64>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => (a - b).abs() / a.max(b) <= tolerance,
        _ => false,
    }
}

/// Compare every pair of `items` and return the transitive clusters of
/// matching pairs. Singletons are dropped.
pub fn cluster_pairs<T, F>(items: &[T], id_of: impl Fn(&T) -> &AssetId, matches: F) -> Vec<Vec<AssetId>>
where
    T: Sync,
    F: Fn(&T, &T) -> bool + Sync,
{
    let n = items.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            let matches = &matches;
            (i + 1..n)
                .filter(move |&j| matches(&items[i], &items[j]))
                .map(move |j| (i, j))
        })
        .collect();

    let mut union = IdUnion::new();
    for (i, j) in pairs {
        union.join(id_of(&items[i]), id_of(&items[j]));
    }
    union
        .into_clusters()
        .into_iter()
        .filter(|cluster| cluster.len() >= 2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratios_match() {
        assert!(aspect_ratios_match(Some(1.5), Some(1.4), 0.15));
        assert!(!aspect_ratios_match(Some(1.5), Some(1.0), 0.15));
        assert!(!aspect_ratios_match(None, Some(1.0), 0.15));
        assert!(!aspect_ratios_match(Some(0.0), Some(0.0), 0.15));
    }

    #[test]
    fn test_cluster_pairs_is_transitive() {
        let items: Vec<(AssetId, i32)> = vec![
            ("a".into(), 0),
            ("b".into(), 2),
            ("c".into(), 4),
            ("d".into(), 50),
        ];
        let clusters = cluster_pairs(&items, |item| &item.0, |x, y| (x.1 - y.1).abs() <= 2);
        assert_eq!(clusters.len(), 1);
        let mut members: Vec<&str> = clusters[0].iter().map(|id| id.as_str()).collect();
        members.sort();
        assert_eq!(members, vec!["a", "b", "c"]);
    }
}
