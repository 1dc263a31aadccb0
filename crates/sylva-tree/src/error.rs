use std::path::PathBuf;

/// Errors from tree and forest operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Returned when training is attempted on zero items.
    #[error("training set has zero items")]
    EmptyTrainingSet,

    /// Returned when an item has no value for the category attribute.
    #[error("item {item_index} has no value for category attribute \"{category_attr}\"")]
    MissingCategory {
        /// The zero-based index of the offending item.
        item_index: usize,
        /// The configured category attribute.
        category_attr: String,
    },

    /// Returned when a numeric attribute value is NaN or infinite.
    #[error("non-finite value at item {item_index}, attribute \"{attribute}\"")]
    NonFiniteValue {
        /// The zero-based index of the offending item.
        item_index: usize,
        /// The attribute holding the non-finite value.
        attribute: String,
    },

    /// Returned when a fixed predicate set contains no predicates.
    #[error("predicate set is empty, at least one predicate is required")]
    EmptyPredicateSet,

    /// Returned when a predicate name cannot be parsed.
    #[error("unknown predicate \"{name}\" (expected equals, greater-or-equal or less-or-equal)")]
    UnknownPredicate {
        /// The unrecognised name.
        name: String,
    },

    /// Returned when trees_count is zero.
    #[error("trees_count must be at least 1, got {trees_count}")]
    InvalidTreeCount {
        /// The invalid trees_count value provided.
        trees_count: usize,
    },

    /// Returned when a subsampling keep probability is not in (0.0, 1.0].
    #[error("keep_probability must be in (0.0, 1.0], got {probability}")]
    InvalidKeepProbability {
        /// The invalid probability provided.
        probability: f64,
    },

    /// Returned when a bootstrap fraction is not in (0.0, 1.0].
    #[error("bootstrap fraction must be in (0.0, 1.0], got {fraction}")]
    InvalidBootstrapFraction {
        /// The invalid fraction provided.
        fraction: f64,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a decoded model's node layout is not a valid tree.
    #[error("corrupt model in {path}: {reason}")]
    CorruptModel {
        /// Path to the model file.
        path: PathBuf,
        /// What the layout check found.
        reason: String,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
