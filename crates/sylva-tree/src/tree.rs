use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::{
    TreeError,
    importance::{RankedAttribute, aggregate_importances},
    impurity::{entropy_from_counts, majority_class},
    item::{Item, Value, validate_training_set},
    node::{Node, NodeIndex, NodeView},
    predicate::{Predicate, PredicateSelection},
    split::{SearchContext, find_best_split, matches, partition_indices},
};

/// Category attribute used when none is configured.
pub const DEFAULT_CATEGORY_ATTR: &str = "category";
const DEFAULT_MIN_ITEMS_COUNT: usize = 1;
const DEFAULT_ENTROPY_THRESHOLD: f64 = 0.01;
const DEFAULT_MAX_TREE_DEPTH: usize = 70;

/// Configuration for growing a single decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter              | Default        |
/// |------------------------|----------------|
/// | `category_attr`        | `"category"`   |
/// | `min_items_count`      | 1              |
/// | `entropy_threshold`    | 0.01           |
/// | `max_tree_depth`       | 70             |
/// | `ignored_attributes`   | none           |
/// | `predicates`           | `ByValueType`  |
/// | `merge_uniform_leaves` | `false`        |
///
/// Out-of-range settings are not errors: a zero count or depth, or a
/// negative or non-finite threshold, falls back to the default.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTreeConfig {
    pub(crate) category_attr: String,
    pub(crate) min_items_count: usize,
    pub(crate) entropy_threshold: f64,
    pub(crate) max_tree_depth: usize,
    pub(crate) ignored_attributes: BTreeSet<String>,
    pub(crate) predicates: PredicateSelection,
    pub(crate) merge_uniform_leaves: bool,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            category_attr: DEFAULT_CATEGORY_ATTR.to_string(),
            min_items_count: DEFAULT_MIN_ITEMS_COUNT,
            entropy_threshold: DEFAULT_ENTROPY_THRESHOLD,
            max_tree_depth: DEFAULT_MAX_TREE_DEPTH,
            ignored_attributes: BTreeSet::new(),
            predicates: PredicateSelection::default(),
            merge_uniform_leaves: false,
        }
    }

    /// Set the attribute that holds the label being learned.
    #[must_use]
    pub fn with_category_attr(mut self, category_attr: impl Into<String>) -> Self {
        let category_attr = category_attr.into();
        self.category_attr = if category_attr.is_empty() {
            DEFAULT_CATEGORY_ATTR.to_string()
        } else {
            category_attr
        };
        self
    }

    /// Stop splitting once a node holds this many items or fewer.
    #[must_use]
    pub fn with_min_items_count(mut self, min_items_count: usize) -> Self {
        self.min_items_count = if min_items_count == 0 {
            DEFAULT_MIN_ITEMS_COUNT
        } else {
            min_items_count
        };
        self
    }

    /// Stop splitting once a node's entropy is at or below this value.
    #[must_use]
    pub fn with_entropy_threshold(mut self, entropy_threshold: f64) -> Self {
        self.entropy_threshold = if entropy_threshold.is_finite() && entropy_threshold >= 0.0 {
            entropy_threshold
        } else {
            DEFAULT_ENTROPY_THRESHOLD
        };
        self
    }

    /// Set the maximum number of split levels below the root.
    #[must_use]
    pub fn with_max_tree_depth(mut self, max_tree_depth: usize) -> Self {
        self.max_tree_depth = if max_tree_depth == 0 {
            DEFAULT_MAX_TREE_DEPTH
        } else {
            max_tree_depth
        };
        self
    }

    /// Exclude attributes from split search. They stay on the items.
    #[must_use]
    pub fn with_ignored_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Set which predicates are tried for each candidate pivot.
    #[must_use]
    pub fn with_predicates(mut self, predicates: PredicateSelection) -> Self {
        self.predicates = predicates;
        self
    }

    /// Collapse a split whose two children are leaves of the same category.
    #[must_use]
    pub fn with_merge_uniform_leaves(mut self, merge: bool) -> Self {
        self.merge_uniform_leaves = merge;
        self
    }

    // --- Getters ---

    /// Return the category attribute.
    #[must_use]
    pub fn category_attr(&self) -> &str {
        &self.category_attr
    }

    /// Return the minimum item count below which nodes become leaves.
    #[must_use]
    pub fn min_items_count(&self) -> usize {
        self.min_items_count
    }

    /// Return the entropy threshold.
    #[must_use]
    pub fn entropy_threshold(&self) -> f64 {
        self.entropy_threshold
    }

    /// Return the maximum tree depth.
    #[must_use]
    pub fn max_tree_depth(&self) -> usize {
        self.max_tree_depth
    }

    /// Return the ignored attributes.
    #[must_use]
    pub fn ignored_attributes(&self) -> &BTreeSet<String> {
        &self.ignored_attributes
    }

    /// Return the predicate selection.
    #[must_use]
    pub fn predicates(&self) -> &PredicateSelection {
        &self.predicates
    }

    /// Return whether uniform sibling leaves are merged.
    #[must_use]
    pub fn merge_uniform_leaves(&self) -> bool {
        self.merge_uniform_leaves
    }

    /// Grow a decision tree from `items`.
    ///
    /// # Errors
    ///
    /// | Variant                          | When                                        |
    /// |----------------------------------|---------------------------------------------|
    /// | [`TreeError::EmptyTrainingSet`]  | `items` is empty                            |
    /// | [`TreeError::MissingCategory`]   | an item lacks the category attribute        |
    /// | [`TreeError::NonFiniteValue`]    | a numeric value is NaN or infinite          |
    /// | [`TreeError::EmptyPredicateSet`] | `predicates` is a fixed, empty set          |
    #[instrument(
        skip(self, items),
        fields(n_items = items.len(), category_attr = %self.category_attr)
    )]
    pub fn fit(&self, items: &[Item]) -> Result<DecisionTree, TreeError> {
        self.check_predicates()?;
        let categories = validate_training_set(items, &self.category_attr)?;

        // Map categories to dense class ids in first-seen order.
        let mut classes: Vec<Value> = Vec::new();
        let labels: Vec<usize> = categories
            .into_iter()
            .map(|category| match classes.iter().position(|c| c == category) {
                Some(class) => class,
                None => {
                    classes.push(category.clone());
                    classes.len() - 1
                }
            })
            .collect();

        debug!(
            n_items = items.len(),
            n_classes = classes.len(),
            max_tree_depth = self.max_tree_depth,
            "fitting decision tree"
        );

        let mut builder = TreeBuilder {
            search: SearchContext {
                items,
                labels: &labels,
                n_classes: classes.len(),
                category_attr: &self.category_attr,
                ignored: &self.ignored_attributes,
                predicates: &self.predicates,
            },
            classes: &classes,
            merge_uniform_leaves: self.merge_uniform_leaves,
            min_items_count: self.min_items_count,
            entropy_threshold: self.entropy_threshold,
            arena: Vec::new(),
        };
        let mut indices: Vec<usize> = (0..items.len()).collect();
        let root = builder.grow(&mut indices, self.max_tree_depth);
        let nodes = builder.arena;

        debug!(root_index = root.index(), n_nodes = nodes.len(), "decision tree built");

        Ok(DecisionTree {
            nodes,
            config: self.clone(),
        })
    }
}

impl DecisionTreeConfig {
    pub(crate) fn check_predicates(&self) -> Result<(), TreeError> {
        match &self.predicates {
            PredicateSelection::Fixed(set) if set.is_empty() => Err(TreeError::EmptyPredicateSet),
            _ => Ok(()),
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct TreeBuilder<'a, 'c> {
    search: SearchContext<'a, 'c>,
    classes: &'c [Value],
    merge_uniform_leaves: bool,
    min_items_count: usize,
    entropy_threshold: f64,
    arena: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    /// Grow the subtree for `indices` and return its arena index.
    ///
    /// `indices` is reordered in place so each child works on a contiguous
    /// sub-slice.
    fn grow(&mut self, indices: &mut [usize], depth_remaining: usize) -> NodeIndex {
        let n_items = indices.len();

        let mut counts = vec![0usize; self.search.n_classes];
        for &i in indices.iter() {
            counts[self.search.labels[i]] += 1;
        }
        let entropy = entropy_from_counts(&counts, n_items);

        if depth_remaining == 0 || n_items <= self.min_items_count {
            return self.push_leaf(indices, entropy);
        }
        if entropy <= self.entropy_threshold {
            return self.push_leaf(indices, entropy);
        }

        let Some(best) = find_best_split(&self.search, indices, entropy) else {
            return self.push_leaf(indices, entropy);
        };

        let n_matched = partition_indices(
            self.search.items,
            indices,
            best.attribute,
            best.predicate,
            best.pivot,
        );

        // Reserve the parent slot so it precedes its children in the arena.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            category: self.classes[0].clone(),
            n_items,
            entropy,
        });

        let (matched_indices, not_matched_indices) = indices.split_at_mut(n_matched);
        let matched = self.grow(matched_indices, depth_remaining - 1);
        let not_matched = self.grow(not_matched_indices, depth_remaining - 1);

        if self.merge_uniform_leaves {
            let uniform = match (&self.arena[matched.index()], &self.arena[not_matched.index()]) {
                (Node::Leaf { category: a, .. }, Node::Leaf { category: b, .. }) if a == b => {
                    Some(a.clone())
                }
                _ => None,
            };
            if let Some(category) = uniform {
                // Both children are leaves, so they are the last two nodes.
                self.arena.truncate(node_idx);
                self.arena.push(Node::Leaf {
                    category,
                    n_items,
                    entropy,
                });
                return NodeIndex::new(node_idx);
            }
        }

        self.arena[node_idx] = Node::Split {
            attribute: best.attribute.to_string(),
            predicate: best.predicate,
            pivot: best.pivot.clone(),
            matched,
            not_matched,
            matched_count: n_matched,
            not_matched_count: n_items - n_matched,
            entropy,
            gain: best.gain,
        };

        NodeIndex::new(node_idx)
    }

    fn push_leaf(&mut self, indices: &[usize], entropy: f64) -> NodeIndex {
        let class = majority_class(self.search.labels, indices, self.search.n_classes).unwrap_or(0);
        let idx = self.arena.len();
        self.arena.push(Node::Leaf {
            category: self.classes[class].clone(),
            n_items: indices.len(),
            entropy,
        });
        NodeIndex::new(idx)
    }
}

/// A fitted decision tree.
///
/// Stored as an arena-based `Vec<Node>` with the root at index 0, together
/// with the configuration it was grown with. Immutable once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) config: DecisionTreeConfig,
}

impl DecisionTree {
    /// Grow a tree from `items` with `config`. Same as [`DecisionTreeConfig::fit`].
    ///
    /// # Errors
    ///
    /// See [`DecisionTreeConfig::fit`].
    pub fn train(items: &[Item], config: &DecisionTreeConfig) -> Result<Self, TreeError> {
        config.fit(items)
    }

    /// A tree made of a single leaf.
    pub(crate) fn single_leaf(category: Value, config: DecisionTreeConfig) -> Self {
        Self {
            nodes: vec![Node::Leaf {
                category,
                n_items: 0,
                entropy: 0.0,
            }],
            config,
        }
    }

    /// Predict the category of `item`.
    ///
    /// Descends from the root: at each split, goes to `matched` when the item
    /// has the attribute and the predicate holds, to `not_matched` otherwise.
    #[must_use]
    pub fn predict(&self, item: &Item) -> &Value {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { category, .. } => return category,
                Node::Split {
                    attribute,
                    predicate,
                    pivot,
                    matched,
                    not_matched,
                    ..
                } => {
                    idx = if matches(item, attribute, *predicate, pivot) {
                        matched.index()
                    } else {
                        not_matched.index()
                    };
                }
            }
        }
    }

    /// Predict categories for a batch of items in parallel.
    #[must_use]
    pub fn predict_batch<'t>(&'t self, items: &[Item]) -> Vec<&'t Value> {
        items
            .into_par_iter()
            .map(|item| self.predict(item))
            .collect()
    }

    /// Explain a prediction: every test applied on the way to the leaf.
    #[must_use]
    pub fn decision_path<'a>(&'a self, item: &'a Item) -> DecisionPath<'a> {
        let mut steps = Vec::new();
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { category, .. } => return DecisionPath { steps, category },
                Node::Split {
                    attribute,
                    predicate,
                    pivot,
                    matched,
                    not_matched,
                    ..
                } => {
                    let is_match = matches(item, attribute, *predicate, pivot);
                    steps.push(PathStep {
                        attribute,
                        predicate: *predicate,
                        pivot,
                        value: item.get(attribute),
                        matched: is_match,
                    });
                    idx = if is_match {
                        matched.index()
                    } else {
                        not_matched.index()
                    };
                }
            }
        }
    }

    /// Return a read-only view of the root node.
    #[must_use]
    pub fn root(&self) -> NodeView<'_> {
        NodeView::new(&self.nodes, NodeIndex::new(0))
    }

    /// Return the node arena.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the configuration this tree was grown with.
    #[must_use]
    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }

    /// Gain-weighted importance of each attribute used by a split.
    ///
    /// Each split adds `n_items * gain` to its attribute; totals are
    /// normalised to sum to 1.0. Attributes appear in the order their first
    /// split occurs in the arena. Empty for a single-leaf tree.
    #[must_use]
    pub fn attribute_importances(&self) -> Vec<(String, f64)> {
        let mut totals: Vec<(String, f64)> = Vec::new();
        for node in &self.nodes {
            if let Node::Split {
                attribute, gain, ..
            } = node
            {
                let weighted = node.n_items() as f64 * gain;
                match totals.iter_mut().find(|(name, _)| name == attribute) {
                    Some((_, total)) => *total += weighted,
                    None => totals.push((attribute.clone(), weighted)),
                }
            }
        }
        let sum: f64 = totals.iter().map(|(_, v)| v).sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|(_, v)| *v /= sum);
        }
        totals
    }

    /// [`attribute_importances`](Self::attribute_importances) sorted and ranked.
    #[must_use]
    pub fn ranked_importances(&self) -> Vec<RankedAttribute> {
        aggregate_importances(std::slice::from_ref(&self.attribute_importances()))
    }

    /// Check that the arena describes a finite binary tree rooted at index 0.
    ///
    /// Every child index must lie after its parent and inside the arena, and
    /// no node may have two parents. Trees grown by [`TreeBuilder`] always
    /// pass; this guards arenas that come from outside, such as model files.
    pub(crate) fn check_layout(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let n_nodes = self.nodes.len();
        let mut has_parent = vec![false; n_nodes];
        for (idx, node) in self.nodes.iter().enumerate() {
            let Node::Split {
                matched,
                not_matched,
                ..
            } = node
            else {
                continue;
            };
            for child in [matched.index(), not_matched.index()] {
                if child <= idx || child >= n_nodes {
                    return Err(format!(
                        "node {idx} has child {child} outside {}..{n_nodes}",
                        idx + 1
                    ));
                }
                if has_parent[child] {
                    return Err(format!("node {child} has more than one parent"));
                }
                has_parent[child] = true;
            }
        }
        Ok(())
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut queue = VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split {
                    matched,
                    not_matched,
                    ..
                } => {
                    queue.push_back((matched.index(), d + 1));
                    queue.push_back((not_matched.index(), d + 1));
                }
            }
        }

        max_depth
    }
}

/// One test applied while classifying an item.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep<'a> {
    /// Attribute tested.
    pub attribute: &'a str,
    /// Predicate applied.
    pub predicate: Predicate,
    /// Pivot compared against.
    pub pivot: &'a Value,
    /// The item's value, or `None` when absent.
    pub value: Option<&'a Value>,
    /// Whether the item went to the matched branch.
    pub matched: bool,
}

impl fmt::Display for PathStep<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.predicate, self.pivot)?;
        match self.value {
            Some(value) => write!(f, " ({} = {value})", self.attribute)?,
            None => write!(f, " ({} absent)", self.attribute)?,
        }
        f.write_str(if self.matched { ": yes" } else { ": no" })
    }
}

/// The tests applied to an item and the category it ended at.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPath<'a> {
    /// Tests from the root downwards.
    pub steps: Vec<PathStep<'a>>,
    /// Category of the leaf reached.
    pub category: &'a Value,
}
