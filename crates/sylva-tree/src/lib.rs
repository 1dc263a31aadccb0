//! Decision tree and random forest classification over attribute-keyed items.
//!
//! Trees are grown greedily: at each node every `(attribute, predicate, pivot)`
//! drawn from the node's own items is scored by information gain (natural-log
//! entropy) and the best one partitions the items. Forests split the training
//! set across independently grown trees, built in parallel with rayon, and
//! answer with a full vote tally. Trees and forests can be saved to and loaded
//! from a versioned bincode file.

mod config;
mod error;
mod forest;
mod importance;
mod impurity;
mod item;
mod node;
mod predicate;
mod predict;
mod serialize;
mod split;
mod tree;

pub use config::{RandomForestConfig, Sampling};
pub use error::TreeError;
pub use forest::RandomForest;
pub use importance::RankedAttribute;
pub use impurity::entropy;
pub use item::{Item, Value};
pub use node::{Node, NodeIndex, NodeView, SplitView};
pub use predicate::{Predicate, PredicateSelection, PredicateSet};
pub use predict::VoteTally;
pub use serialize::Model;
pub use split::{Partition, information_gain, matches, split};
pub use tree::{DEFAULT_CATEGORY_ATTR, DecisionPath, DecisionTree, DecisionTreeConfig, PathStep};
