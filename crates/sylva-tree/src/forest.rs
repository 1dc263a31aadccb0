//! Random forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{RandomForestConfig, Sampling};
use crate::error::TreeError;
use crate::importance::{RankedAttribute, aggregate_importances};
use crate::item::{Item, validate_training_set};
use crate::predict::VoteTally;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// A fitted random forest: an ordered sequence of decision trees.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Train `trees_count` trees with round-robin slicing and the default seed.
    ///
    /// # Errors
    ///
    /// See [`RandomForestConfig::fit`]; additionally
    /// [`TreeError::InvalidTreeCount`] when `trees_count` is zero.
    pub fn train(
        items: &[Item],
        tree_config: &DecisionTreeConfig,
        trees_count: usize,
    ) -> Result<Self, TreeError> {
        RandomForestConfig::new(trees_count)?
            .with_tree_config(tree_config.clone())
            .fit(items)
    }

    /// Return the trees in build order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Gain-weighted attribute importances summed over all trees and ranked.
    #[must_use]
    pub fn attribute_importances(&self) -> Vec<RankedAttribute> {
        let per_tree: Vec<Vec<(String, f64)>> = self
            .trees
            .iter()
            .map(DecisionTree::attribute_importances)
            .collect();
        aggregate_importances(&per_tree)
    }
}

/// Items of slice `tree_index` under round-robin assignment.
fn round_robin_slice(n_items: usize, trees_count: usize, tree_index: usize) -> Vec<usize> {
    (tree_index..n_items).step_by(trees_count).collect()
}

/// Keep each item independently with probability `keep_probability`.
fn subsample(n_items: usize, keep_probability: f64, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_items)
        .filter(|_| rng.gen_bool(keep_probability))
        .collect()
}

/// Draw `draw_count` items with replacement.
fn bootstrap_sample(n_items: usize, draw_count: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..draw_count).map(|_| rng.gen_range(0..n_items)).collect()
}

/// Train the random forest ensemble.
#[instrument(skip_all, fields(trees_count = config.trees_count, n_items = items.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    items: &[Item],
) -> Result<RandomForest, TreeError> {
    // --- Validate inputs ---
    config.sampling.validate()?;
    config.tree_config.check_predicates()?;
    let categories = validate_training_set(items, config.tree_config.category_attr())?;

    // Trees whose slice comes out empty predict the overall majority.
    let overall: VoteTally = categories.into_iter().collect();
    let fallback = overall
        .winner()
        .cloned()
        .ok_or(TreeError::EmptyTrainingSet)?;

    let n_items = items.len();
    let trees_count = config.trees_count;

    info!(
        trees_count,
        n_items,
        sampling = ?config.sampling,
        seed = config.seed,
        "training random forest"
    );

    // Generate per-tree seeds from master RNG.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..trees_count).map(|_| master_rng.r#gen()).collect();

    let sampling = config.sampling;
    let tree_config = &config.tree_config;
    let fallback = &fallback;

    // Parallel tree training.
    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .enumerate()
        .map(|(tree_index, seed)| -> Result<DecisionTree, TreeError> {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let indices = match sampling {
                Sampling::RoundRobin => round_robin_slice(n_items, trees_count, tree_index),
                Sampling::Subsample { keep_probability } => {
                    subsample(n_items, keep_probability, &mut rng)
                }
                Sampling::Bootstrap { fraction } => {
                    let draw_count = ((n_items as f64) * fraction).ceil() as usize;
                    bootstrap_sample(n_items, draw_count, &mut rng)
                }
            };

            if indices.is_empty() {
                debug!(tree_index, "empty slice, using majority leaf");
                return Ok(DecisionTree::single_leaf(fallback.clone(), tree_config.clone()));
            }

            let slice: Vec<Item> = indices.iter().map(|&i| items[i].clone()).collect();
            let tree = tree_config.fit(&slice)?;
            debug!(
                tree_index,
                n_items = slice.len(),
                n_nodes = tree.n_nodes(),
                "tree built"
            );
            Ok(tree)
        })
        .collect::<Result<Vec<_>, TreeError>>()?;

    info!(n_trees_trained = trees.len(), "random forest training complete");

    Ok(RandomForest { trees })
}
