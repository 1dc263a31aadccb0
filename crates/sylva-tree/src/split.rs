use std::collections::{BTreeSet, HashMap, HashSet};

use crate::impurity::{entropy, entropy_from_counts};
use crate::item::{Item, Value, ValueKey};
use crate::predicate::{Predicate, PredicateSelection};

/// Result of partitioning a collection by `(attribute, predicate, pivot)`.
///
/// Every input item lands on exactly one side; relative order is kept.
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    /// Items whose attribute is present and satisfies the predicate.
    pub matched: Vec<&'a Item>,
    /// Everything else, including items missing the attribute.
    pub not_matched: Vec<&'a Item>,
}

/// Whether `item` goes to the matched side of a split.
///
/// A missing attribute never matches.
#[must_use]
pub fn matches(item: &Item, attribute: &str, predicate: Predicate, pivot: &Value) -> bool {
    item.get(attribute)
        .is_some_and(|value| predicate.apply(value, pivot))
}

/// Partition `items` into matched and not-matched sides.
#[must_use]
pub fn split<'a>(
    items: impl IntoIterator<Item = &'a Item>,
    attribute: &str,
    predicate: Predicate,
    pivot: &Value,
) -> Partition<'a> {
    let mut matched = Vec::new();
    let mut not_matched = Vec::new();
    for item in items {
        if matches(item, attribute, predicate, pivot) {
            matched.push(item);
        } else {
            not_matched.push(item);
        }
    }
    Partition {
        matched,
        not_matched,
    }
}

/// Information gain of `partition` relative to its parent collection.
///
/// `entropy(parent) - (|m| * entropy(m) + |n| * entropy(n)) / |parent|`.
/// Returns `0.0` for an empty parent. `parent` may be a slice of items or
/// one side of an earlier [`Partition`], so splits can be scored level by
/// level without cloning.
#[must_use]
pub fn information_gain<'a>(
    parent: impl IntoIterator<Item = &'a Item> + Clone,
    partition: &Partition<'_>,
    category_attr: &str,
) -> f64 {
    let n_parent = parent.clone().into_iter().count();
    if n_parent == 0 {
        return 0.0;
    }
    let n_matched = partition.matched.len() as f64;
    let n_not_matched = partition.not_matched.len() as f64;
    let weighted = n_matched * entropy(partition.matched.iter().copied(), category_attr)
        + n_not_matched * entropy(partition.not_matched.iter().copied(), category_attr);
    entropy(parent, category_attr) - weighted / n_parent as f64
}

/// The winning split of a candidate search.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult<'a> {
    pub(crate) attribute: &'a str,
    pub(crate) predicate: Predicate,
    pub(crate) pivot: &'a Value,
    pub(crate) gain: f64,
}

/// Inputs shared by every candidate evaluation at one node.
pub(crate) struct SearchContext<'a, 'c> {
    pub(crate) items: &'a [Item],
    pub(crate) labels: &'c [usize],
    pub(crate) n_classes: usize,
    pub(crate) category_attr: &'c str,
    pub(crate) ignored: &'c BTreeSet<String>,
    pub(crate) predicates: &'c PredicateSelection,
}

/// Search every `(attribute, predicate, pivot)` drawn from the items at this node.
///
/// Candidates are visited item by item, then attribute by attribute in the
/// item's own order, then predicate by predicate. Each distinct triple is
/// scored once, and triples that leave one side empty are skipped. Only a
/// strictly larger gain replaces the current best, so the first candidate
/// wins ties. Returns `None` when nothing scores above zero.
pub(crate) fn find_best_split<'a>(
    ctx: &SearchContext<'a, '_>,
    indices: &[usize],
    parent_entropy: f64,
) -> Option<SplitResult<'a>> {
    let n_items = indices.len();
    if n_items == 0 {
        return None;
    }

    let mut checked: HashMap<&'a str, HashSet<(Predicate, ValueKey<'a>)>> = HashMap::new();
    let mut best: Option<SplitResult<'a>> = None;
    let mut best_gain = 0.0f64;

    let mut matched_counts = vec![0usize; ctx.n_classes];
    let mut not_matched_counts = vec![0usize; ctx.n_classes];

    let items = ctx.items;
    for &i in indices {
        let item = &items[i];
        for (attribute, pivot) in item.attributes() {
            if attribute == ctx.category_attr || ctx.ignored.contains(attribute) {
                continue;
            }
            for predicate in ctx.predicates.candidates_for(pivot) {
                if !checked
                    .entry(attribute)
                    .or_default()
                    .insert((predicate, pivot.key()))
                {
                    continue;
                }

                matched_counts.fill(0);
                not_matched_counts.fill(0);
                let mut n_matched = 0usize;
                for &j in indices {
                    let class = ctx.labels[j];
                    if matches(&items[j], attribute, predicate, pivot) {
                        matched_counts[class] += 1;
                        n_matched += 1;
                    } else {
                        not_matched_counts[class] += 1;
                    }
                }
                if n_matched == 0 || n_matched == n_items {
                    continue;
                }
                let n_not_matched = n_items - n_matched;

                let weighted = n_matched as f64 * entropy_from_counts(&matched_counts, n_matched)
                    + n_not_matched as f64
                        * entropy_from_counts(&not_matched_counts, n_not_matched);
                let gain = parent_entropy - weighted / n_items as f64;

                if gain > best_gain {
                    best_gain = gain;
                    best = Some(SplitResult {
                        attribute,
                        predicate,
                        pivot,
                        gain,
                    });
                }
            }
        }
    }

    best
}

/// Reorder `indices` so matched items come first, keeping relative order.
///
/// Returns the number of matched items.
pub(crate) fn partition_indices(
    items: &[Item],
    indices: &mut [usize],
    attribute: &str,
    predicate: Predicate,
    pivot: &Value,
) -> usize {
    let (matched, not_matched): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| matches(&items[i], attribute, predicate, pivot));
    let n_matched = matched.len();
    for (slot, i) in indices.iter_mut().zip(matched.into_iter().chain(not_matched)) {
        *slot = i;
    }
    n_matched
}
