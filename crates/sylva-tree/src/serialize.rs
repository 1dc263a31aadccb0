//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::TreeError;
use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// A trained model that can be written to and read back from disk.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Model {
    /// A single decision tree.
    Tree(DecisionTree),
    /// A random forest.
    Forest(RandomForest),
}

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of trees in the model.
    n_trees: usize,
    /// Category attribute the model predicts.
    category_attr: String,
    /// The serialized model.
    model: Model,
}

impl Model {
    /// Return the number of trees (1 for a single tree).
    #[must_use]
    pub fn n_trees(&self) -> usize {
        match self {
            Model::Tree(_) => 1,
            Model::Forest(forest) => forest.n_trees(),
        }
    }

    /// Return the category attribute the model was trained to predict.
    #[must_use]
    pub fn category_attr(&self) -> &str {
        match self {
            Model::Tree(tree) => tree.config().category_attr(),
            Model::Forest(forest) => forest
                .trees()
                .first()
                .map_or(crate::tree::DEFAULT_CATEGORY_ATTR, |t| {
                    t.config().category_attr()
                }),
        }
    }

    /// Save the model to a binary file.
    ///
    /// Uses bincode encoding wrapped in a versioned envelope for
    /// forward-compatibility checking.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::SerializeModel`] | bincode encoding failed |
    /// | [`TreeError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: self.n_trees(),
            category_attr: self.category_attr().to_string(),
            model: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|e| TreeError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| TreeError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.n_trees(),
            "model saved"
        );

        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// Checks the format version and returns an error on mismatch.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::ReadModel`] | file read failed |
    /// | [`TreeError::DeserializeModel`] | bincode decoding failed |
    /// | [`TreeError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`TreeError::CorruptModel`] | a tree's node layout is not a valid tree |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| TreeError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        // The version is the leading field, so it can be checked before the
        // rest of the envelope is decoded.
        let format_version: u32 =
            bincode::deserialize(&bytes).map_err(|e| TreeError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;
        if format_version != FORMAT_VERSION {
            return Err(TreeError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: format_version,
                path: path.to_path_buf(),
            });
        }

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|e| TreeError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        let trees: &[DecisionTree] = match &envelope.model {
            Model::Tree(tree) => std::slice::from_ref(tree),
            Model::Forest(forest) => forest.trees(),
        };
        if trees.is_empty() {
            return Err(TreeError::CorruptModel {
                path: path.to_path_buf(),
                reason: "forest has no trees".to_string(),
            });
        }
        for (tree_index, tree) in trees.iter().enumerate() {
            tree.check_layout().map_err(|reason| TreeError::CorruptModel {
                path: path.to_path_buf(),
                reason: format!("tree {tree_index}: {reason}"),
            })?;
        }

        debug!(
            n_trees = envelope.n_trees,
            category_attr = %envelope.category_attr,
            "model loaded"
        );

        Ok(envelope.model)
    }
}

impl From<DecisionTree> for Model {
    fn from(tree: DecisionTree) -> Self {
        Model::Tree(tree)
    }
}

impl From<RandomForest> for Model {
    fn from(forest: RandomForest) -> Self {
        Model::Forest(forest)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::item::{Item, Value};
    use crate::node::{Node, NodeIndex};
    use crate::predicate::Predicate;
    use crate::tree::DecisionTreeConfig;

    fn training_items() -> Vec<Item> {
        [1.0, 2.0, 3.0, 10.0, 11.0, 12.0]
            .iter()
            .map(|&x| {
                Item::new()
                    .with("x", x)
                    .with("colour", if x < 5.0 { "red" } else { "blue" })
                    .with("category", if x < 5.0 { "low" } else { "high" })
            })
            .collect()
    }

    #[test]
    fn tree_round_trip_identical_predictions() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("tree.bin");

        let tree = DecisionTreeConfig::new().fit(&training_items()).unwrap();
        Model::from(tree.clone()).save(&model_path).unwrap();

        let Model::Tree(loaded) = Model::load(&model_path).unwrap() else {
            panic!("expected a tree");
        };
        assert_eq!(loaded, tree);
        for x in [1.5, 11.0, 5.0] {
            let query = Item::new().with("x", x);
            assert_eq!(loaded.predict(&query), tree.predict(&query));
        }
    }

    #[test]
    fn forest_round_trip_identical_tallies() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("forest.bin");

        let forest = RandomForest::train(&training_items(), &DecisionTreeConfig::new(), 2).unwrap();
        let model = Model::from(forest.clone());
        model.save(&model_path).unwrap();

        let loaded = Model::load(&model_path).unwrap();
        assert_eq!(loaded.n_trees(), 2);
        assert_eq!(loaded.category_attr(), "category");
        let Model::Forest(loaded) = loaded else {
            panic!("expected a forest");
        };
        let query = Item::new().with("x", 2.0);
        assert_eq!(loaded.predict(&query), forest.predict(&query));
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = Model::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, TreeError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"no").unwrap();
        let err = Model::load(&path).unwrap_err();
        assert!(matches!(err, TreeError::DeserializeModel { .. }));
    }

    fn save_raw(dir: &TempDir, name: &str, model: Model) -> std::path::PathBuf {
        let path = dir.path().join(name);
        model.save(&path).unwrap();
        path
    }

    fn split_node(matched: usize, not_matched: usize) -> Node {
        Node::Split {
            attribute: "x".to_string(),
            predicate: Predicate::GreaterOrEqual,
            pivot: Value::from(10.0),
            matched: NodeIndex::new(matched),
            not_matched: NodeIndex::new(not_matched),
            matched_count: 1,
            not_matched_count: 1,
            entropy: 2.0_f64.ln(),
            gain: 2.0_f64.ln(),
        }
    }

    fn leaf_node(category: &str) -> Node {
        Node::Leaf {
            category: Value::from(category),
            n_items: 1,
            entropy: 0.0,
        }
    }

    fn tree_with(nodes: Vec<Node>) -> DecisionTree {
        DecisionTree {
            nodes,
            config: DecisionTreeConfig::new(),
        }
    }

    #[test]
    fn load_rejects_dangling_child_index() {
        let dir = TempDir::new().unwrap();
        let path = save_raw(&dir, "dangling.bin", Model::Tree(tree_with(vec![split_node(7, 1)])));
        let err = Model::load(&path).unwrap_err();
        assert!(matches!(err, TreeError::CorruptModel { .. }), "got {err:?}");
    }

    #[test]
    fn load_rejects_empty_arena() {
        let dir = TempDir::new().unwrap();
        let path = save_raw(&dir, "empty.bin", Model::Tree(tree_with(vec![])));
        let err = Model::load(&path).unwrap_err();
        assert!(matches!(err, TreeError::CorruptModel { .. }), "got {err:?}");
    }

    #[test]
    fn load_rejects_cycles_and_shared_children() {
        let dir = TempDir::new().unwrap();

        let self_loop = tree_with(vec![split_node(0, 1), leaf_node("A")]);
        let path = save_raw(&dir, "loop.bin", Model::Tree(self_loop));
        assert!(matches!(
            Model::load(&path).unwrap_err(),
            TreeError::CorruptModel { .. }
        ));

        let back_edge = tree_with(vec![
            split_node(1, 2),
            split_node(0, 3),
            leaf_node("A"),
            leaf_node("B"),
        ]);
        let path = save_raw(&dir, "back.bin", Model::Tree(back_edge));
        assert!(matches!(
            Model::load(&path).unwrap_err(),
            TreeError::CorruptModel { .. }
        ));

        let shared = tree_with(vec![split_node(1, 1), leaf_node("A")]);
        let path = save_raw(&dir, "shared.bin", Model::Tree(shared));
        assert!(matches!(
            Model::load(&path).unwrap_err(),
            TreeError::CorruptModel { .. }
        ));
    }

    #[test]
    fn load_rejects_corrupt_tree_inside_forest() {
        let dir = TempDir::new().unwrap();
        let good = DecisionTreeConfig::new().fit(&training_items()).unwrap();
        let forest = RandomForest {
            trees: vec![good, tree_with(vec![split_node(5, 6)])],
        };
        let path = save_raw(&dir, "forest.bin", Model::Forest(forest));
        let err = Model::load(&path).unwrap_err();
        assert!(
            matches!(&err, TreeError::CorruptModel { reason, .. } if reason.starts_with("tree 1")),
            "got {err:?}"
        );
    }

    #[test]
    fn load_accepts_hand_built_valid_tree() {
        let dir = TempDir::new().unwrap();
        let tree = tree_with(vec![split_node(1, 2), leaf_node("high"), leaf_node("low")]);
        let path = save_raw(&dir, "valid.bin", Model::Tree(tree.clone()));
        let Model::Tree(loaded) = Model::load(&path).unwrap() else {
            panic!("expected a tree");
        };
        assert_eq!(loaded.predict(&Item::new().with("x", 12.0)), &Value::from("high"));
        assert_eq!(loaded.predict(&Item::new()), &Value::from("low"));
    }

    #[test]
    fn version_mismatch_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        std::fs::write(&path, bincode::serialize(&(FORMAT_VERSION + 1)).unwrap()).unwrap();
        let err = Model::load(&path).unwrap_err();
        assert!(matches!(
            err,
            TreeError::IncompatibleModelVersion { found, .. } if found == FORMAT_VERSION + 1
        ));
    }
}
