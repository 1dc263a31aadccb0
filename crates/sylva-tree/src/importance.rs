//! Attribute importance aggregation across trees.

/// A ranked attribute with name, importance score, and rank.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RankedAttribute {
    /// Attribute name.
    pub name: String,
    /// Normalized importance score (sums to 1.0 across all attributes).
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

/// Aggregate per-tree attribute importances into ranked attributes.
///
/// Sums importances by attribute name across all trees, normalizes to sum to
/// 1.0, sorts descending by importance (stable, so equal scores keep
/// first-seen order), and assigns 1-based ranks.
pub(crate) fn aggregate_importances(per_tree: &[Vec<(String, f64)>]) -> Vec<RankedAttribute> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    for tree_importances in per_tree {
        for (name, value) in tree_importances {
            match totals.iter_mut().find(|(n, _)| n == name) {
                Some((_, total)) => *total += value,
                None => totals.push((name.clone(), *value)),
            }
        }
    }

    let sum: f64 = totals.iter().map(|(_, v)| v).sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|(_, v)| *v /= sum);
    }

    let mut attributes: Vec<RankedAttribute> = totals
        .into_iter()
        .map(|(name, importance)| RankedAttribute {
            name,
            importance,
            rank: 0, // will be set after sorting
        })
        .collect();

    attributes.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    for (i, attr) in attributes.iter_mut().enumerate() {
        attr.rank = i + 1;
    }

    attributes
}
