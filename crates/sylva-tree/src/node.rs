use std::fmt;

use crate::item::Value;
use crate::predicate::Predicate;

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Children are referenced by [`NodeIndex`]; every index is owned by exactly
/// one parent, so the arena always describes a strict binary tree.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Attribute tested at this node.
        attribute: String,
        /// Comparison applied as `predicate(item[attribute], pivot)`.
        predicate: Predicate,
        /// Right-hand side of the comparison.
        pivot: Value,
        /// Child for items satisfying the predicate.
        matched: NodeIndex,
        /// Child for all other items, including those missing the attribute.
        not_matched: NodeIndex,
        /// Training items routed to `matched`.
        matched_count: usize,
        /// Training items routed to `not_matched`.
        not_matched_count: usize,
        /// Category entropy at this node before splitting.
        entropy: f64,
        /// Information gain of this split.
        gain: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Predicted category.
        category: Value,
        /// Number of training items that reached this leaf.
        n_items: usize,
        /// Category entropy at this leaf.
        entropy: f64,
    },
}

impl Node {
    /// Return the category entropy at this node.
    #[must_use]
    pub fn entropy(&self) -> f64 {
        match self {
            Node::Split { entropy, .. } | Node::Leaf { entropy, .. } => *entropy,
        }
    }

    /// Return the number of training items that reached this node.
    #[must_use]
    pub fn n_items(&self) -> usize {
        match self {
            Node::Split {
                matched_count,
                not_matched_count,
                ..
            } => matched_count + not_matched_count,
            Node::Leaf { n_items, .. } => *n_items,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// Read-only view of a tree node, for walking and rendering a tree.
#[derive(Debug, Clone, Copy)]
pub enum NodeView<'t> {
    /// A terminal node.
    Leaf {
        /// Predicted category.
        category: &'t Value,
        /// Number of training items that reached this leaf.
        n_items: usize,
    },
    /// An interior node.
    Split(SplitView<'t>),
}

impl<'t> NodeView<'t> {
    pub(crate) fn new(nodes: &'t [Node], index: NodeIndex) -> Self {
        match &nodes[index.index()] {
            Node::Leaf {
                category, n_items, ..
            } => NodeView::Leaf {
                category,
                n_items: *n_items,
            },
            Node::Split {
                attribute,
                predicate,
                pivot,
                matched,
                not_matched,
                matched_count,
                not_matched_count,
                gain,
                ..
            } => NodeView::Split(SplitView {
                nodes,
                index,
                attribute,
                predicate: *predicate,
                pivot,
                matched: *matched,
                not_matched: *not_matched,
                matched_count: *matched_count,
                not_matched_count: *not_matched_count,
                gain: *gain,
            }),
        }
    }

    /// Return the leaf category, or `None` for a split.
    #[must_use]
    pub fn category(&self) -> Option<&'t Value> {
        match *self {
            NodeView::Leaf { category, .. } => Some(category),
            NodeView::Split(_) => None,
        }
    }
}

/// Read-only view of a split node.
#[derive(Debug, Clone, Copy)]
pub struct SplitView<'t> {
    nodes: &'t [Node],
    index: NodeIndex,
    attribute: &'t str,
    predicate: Predicate,
    pivot: &'t Value,
    matched: NodeIndex,
    not_matched: NodeIndex,
    matched_count: usize,
    not_matched_count: usize,
    gain: f64,
}

impl<'t> SplitView<'t> {
    /// Return the arena index of this node.
    #[must_use]
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Return the attribute tested here.
    #[must_use]
    pub fn attribute(&self) -> &'t str {
        self.attribute
    }

    /// Return the predicate applied here.
    #[must_use]
    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    /// Return the pivot value.
    #[must_use]
    pub fn pivot(&self) -> &'t Value {
        self.pivot
    }

    /// Return the number of training items that satisfied the predicate.
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.matched_count
    }

    /// Return the number of training items that did not.
    #[must_use]
    pub fn not_matched_count(&self) -> usize {
        self.not_matched_count
    }

    /// Return the information gain of this split.
    #[must_use]
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// View of the subtree for matching items.
    #[must_use]
    pub fn matched(&self) -> NodeView<'t> {
        NodeView::new(self.nodes, self.matched)
    }

    /// View of the subtree for non-matching items.
    #[must_use]
    pub fn not_matched(&self) -> NodeView<'t> {
        NodeView::new(self.nodes, self.not_matched)
    }
}

impl fmt::Display for SplitView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute(), self.predicate(), self.pivot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Vec<Node> {
        vec![
            Node::Split {
                attribute: "x".into(),
                predicate: Predicate::GreaterOrEqual,
                pivot: Value::from(10.0),
                matched: NodeIndex::new(1),
                not_matched: NodeIndex::new(2),
                matched_count: 1,
                not_matched_count: 3,
                entropy: 0.56,
                gain: 0.56,
            },
            Node::Leaf {
                category: Value::from("B"),
                n_items: 1,
                entropy: 0.0,
            },
            Node::Leaf {
                category: Value::from(0),
                n_items: 3,
                entropy: 0.0,
            },
        ]
    }

    #[test]
    fn node_index_roundtrip() {
        assert_eq!(NodeIndex::new(42).index(), 42);
        assert_eq!(format!("{}", NodeIndex::new(0)), "0");
    }

    #[test]
    fn split_counts_add_up() {
        let nodes = stump();
        assert_eq!(nodes[0].n_items(), 4);
        assert!(!nodes[0].is_leaf());
        assert!(nodes[1].is_leaf());
        assert_eq!(nodes[2].n_items(), 3);
    }

    #[test]
    fn view_walks_children() {
        let nodes = stump();
        let NodeView::Split(split) = NodeView::new(&nodes, NodeIndex::new(0)) else {
            panic!("root should be a split");
        };
        assert_eq!(split.attribute(), "x");
        assert_eq!(split.predicate(), Predicate::GreaterOrEqual);
        assert_eq!(split.pivot(), &Value::from(10.0));
        assert_eq!(split.matched_count(), 1);
        assert_eq!(split.not_matched_count(), 3);
        assert_eq!(split.matched().category(), Some(&Value::from("B")));
        assert_eq!(format!("{split}"), "x >= 10");
    }

    #[test]
    fn zero_category_is_still_a_leaf() {
        let nodes = stump();
        let view = NodeView::new(&nodes, NodeIndex::new(2));
        assert_eq!(view.category(), Some(&Value::from(0)));
    }
}
