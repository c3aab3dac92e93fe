//! Error taxonomy for export, load, and inference.

use thiserror::Error;

/// Failures while exporting a fitted ensemble.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("ensemble has no boosting stages")]
    EmptyEnsemble,
    #[error(
        "stage {stage}: structural arrays have lengths {feature}/{threshold}/{left}/{right}"
    )]
    RaggedStage {
        stage: usize,
        feature: usize,
        threshold: usize,
        left: usize,
        right: usize,
    },
    #[error(
        "stage {stage}: value array has {values} entries for {nodes} nodes (multi-output leaves unsupported)"
    )]
    ValueLengthMismatch {
        stage: usize,
        values: usize,
        nodes: usize,
    },
    #[error("baseline has {0} components (expected a single scalar)")]
    BaselineNotScalar(usize),
    #[error("{names} feature names for {features} fit-time features")]
    FeatureCountMismatch { names: usize, features: usize },
    #[error("exported model failed validation: {0}")]
    Invalid(#[from] FormatError),
}

/// Failures while parsing or validating an interchange document.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown model type {0:?}")]
    UnknownModelType(String),
    #[error("feature_names is empty")]
    NoFeatureNames,
    #[error("trees is empty")]
    NoTrees,
    #[error("n_estimators is {declared} but {actual} trees are present")]
    EstimatorCountMismatch { declared: usize, actual: usize },
    #[error("tree {0} has no nodes")]
    EmptyTree(usize),
    #[error(
        "tree {tree}: arrays have lengths {feature}/{threshold}/{left}/{right}/{value}"
    )]
    RaggedTree {
        tree: usize,
        feature: usize,
        threshold: usize,
        left: usize,
        right: usize,
        value: usize,
    },
    #[error("tree {tree}, node {node}: child index {child} out of range")]
    ChildOutOfRange { tree: usize, node: usize, child: i32 },
    #[error("tree {tree}, node {node}: exactly one child is a leaf sentinel")]
    HalfLeaf { tree: usize, node: usize },
    #[error(
        "tree {tree}, node {node}: feature index {feature} out of range for {features} features"
    )]
    FeatureOutOfRange {
        tree: usize,
        node: usize,
        feature: i32,
        features: usize,
    },
    #[error("tree {tree}, node {node} is linked by more than one parent")]
    NodeRevisited { tree: usize, node: usize },
    #[error("tree {tree}: {count} nodes unreachable from the root")]
    UnreachableNodes { tree: usize, count: usize },
}

/// Feature-vector contract violations reported at prediction time.
#[derive(Debug, Error)]
pub enum ShapeMismatchError {
    #[error("feature vector has {got} values but the model expects {expected}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("feature {name:?} (index {index}) is NaN")]
    NotANumber { index: usize, name: String },
    #[error("missing feature {0:?}")]
    MissingFeature(String),
    #[error("unknown feature {0:?}")]
    UnknownFeature(String),
}
