//! Entropy of a labelled collection.

use crate::item::{Item, Value};

/// Shannon entropy (natural log) of a class-count vector.
///
/// Returns `0.0` when `n_items` is zero, so an empty side of a split
/// contributes nothing instead of faulting.
#[must_use]
pub(crate) fn entropy_from_counts(counts: &[usize], n_items: usize) -> f64 {
    if n_items == 0 {
        return 0.0;
    }
    let n = n_items as f64;
    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Compute the entropy of `items` over the values of `category_attr`.
///
/// Each distinct value with empirical probability `p` contributes `-p ln p`.
/// Items lacking the attribute are counted together as one extra value.
/// An empty collection has entropy `0.0`.
#[must_use]
pub fn entropy<'a>(items: impl IntoIterator<Item = &'a Item>, category_attr: &str) -> f64 {
    let mut seen: Vec<Option<&Value>> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut total = 0usize;
    for item in items {
        let category = item.get(category_attr);
        match seen.iter().position(|c| *c == category) {
            Some(i) => counts[i] += 1,
            None => {
                seen.push(category);
                counts.push(1);
            }
        }
        total += 1;
    }
    entropy_from_counts(&counts, total)
}

/// Index of the most frequent class among `labels[indices]`.
///
/// Ties go to the class that appears first in `indices` order.
pub(crate) fn majority_class(
    labels: &[usize],
    indices: &[usize],
    n_classes: usize,
) -> Option<usize> {
    let mut counts = vec![0usize; n_classes];
    let mut first_seen = Vec::new();
    for &i in indices {
        let class = labels[i];
        if counts[class] == 0 {
            first_seen.push(class);
        }
        counts[class] += 1;
    }
    let mut best: Option<(usize, usize)> = None;
    for class in first_seen {
        let count = counts[class];
        if best.is_none_or(|(_, best_count)| count > best_count) {
            best = Some((class, count));
        }
    }
    best.map(|(class, _)| class)
}
