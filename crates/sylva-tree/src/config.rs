//! Configuration builder for random forest training.

use crate::error::TreeError;
use crate::forest::RandomForest;
use crate::item::Item;
use crate::tree::DecisionTreeConfig;

/// How the training set is divided among the trees of a forest.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum Sampling {
    /// Item `i` goes to tree `i % trees_count`. Slices are disjoint and keep
    /// the original item order.
    #[default]
    RoundRobin,
    /// Each tree keeps every item independently with this probability.
    Subsample {
        /// Probability in (0.0, 1.0].
        keep_probability: f64,
    },
    /// Each tree draws `ceil(n * fraction)` items with replacement.
    Bootstrap {
        /// Fraction in (0.0, 1.0].
        fraction: f64,
    },
}

impl Sampling {
    /// Check that the strategy's parameter is in range.
    pub(crate) fn validate(self) -> Result<(), TreeError> {
        match self {
            Sampling::RoundRobin => Ok(()),
            Sampling::Subsample { keep_probability } => {
                if keep_probability > 0.0 && keep_probability <= 1.0 {
                    Ok(())
                } else {
                    Err(TreeError::InvalidKeepProbability {
                        probability: keep_probability,
                    })
                }
            }
            Sampling::Bootstrap { fraction } => {
                if fraction > 0.0 && fraction <= 1.0 {
                    Ok(())
                } else {
                    Err(TreeError::InvalidBootstrapFraction { fraction })
                }
            }
        }
    }
}

/// Configuration for random forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter     | Default                       |
/// |---------------|-------------------------------|
/// | `tree_config` | `DecisionTreeConfig::new()`   |
/// | `sampling`    | `RoundRobin`                  |
/// | `seed`        | 42                            |
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestConfig {
    pub(crate) trees_count: usize,
    pub(crate) tree_config: DecisionTreeConfig,
    pub(crate) sampling: Sampling,
    pub(crate) seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidTreeCount`] if `trees_count` is zero.
    pub fn new(trees_count: usize) -> Result<Self, TreeError> {
        if trees_count == 0 {
            return Err(TreeError::InvalidTreeCount { trees_count });
        }
        Ok(Self {
            trees_count,
            tree_config: DecisionTreeConfig::new(),
            sampling: Sampling::default(),
            seed: 42,
        })
    }

    // --- Setters ---

    /// Set the configuration every tree is grown with.
    #[must_use]
    pub fn with_tree_config(mut self, tree_config: DecisionTreeConfig) -> Self {
        self.tree_config = tree_config;
        self
    }

    /// Set the sampling strategy.
    #[must_use]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    /// Set the random seed used by the randomised sampling strategies.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn trees_count(&self) -> usize {
        self.trees_count
    }

    /// Return the per-tree configuration.
    #[must_use]
    pub fn tree_config(&self) -> &DecisionTreeConfig {
        &self.tree_config
    }

    /// Return the sampling strategy.
    #[must_use]
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a random forest on `items`.
    ///
    /// # Errors
    ///
    /// | Variant                                  | When                                       |
    /// |------------------------------------------|--------------------------------------------|
    /// | [`TreeError::EmptyTrainingSet`]          | `items` is empty                           |
    /// | [`TreeError::MissingCategory`]           | an item lacks the category attribute       |
    /// | [`TreeError::NonFiniteValue`]            | a numeric value is NaN or infinite         |
    /// | [`TreeError::EmptyPredicateSet`]         | the tree config has an empty predicate set |
    /// | [`TreeError::InvalidKeepProbability`]    | subsample probability not in (0.0, 1.0]    |
    /// | [`TreeError::InvalidBootstrapFraction`]  | bootstrap fraction not in (0.0, 1.0]       |
    pub fn fit(&self, items: &[Item]) -> Result<RandomForest, TreeError> {
        crate::forest::train(self, items)
    }
}
