//! Interchange model structure, loading, and validation.
//!
//! The wire format mirrors the training library's parallel-array tree
//! layout: flat arrays plus explicit child indices, never linked node
//! objects. Validation is exhaustive at load time; the inference hot
//! path indexes without further checks.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Wire discriminator for the staged additive ensemble format.
///
/// Any schema evolution introduces a new discriminator value; loaders
/// reject values they do not recognize.
pub const MODEL_TYPE_GRADIENT_BOOSTING: &str = "gradient_boosting";

/// Sentinel in `children_left`/`children_right` marking a leaf.
pub(crate) const LEAF_CHILD: i32 = -1;

/// One boosting stage as parallel node arrays.
///
/// Node 0 is the root. A node is a leaf iff both child entries are the
/// `-1` sentinel; `feature` is negative at leaves and `value` carries
/// the leaf contribution (ignored at internal nodes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub(crate) feature: Vec<i32>,
    pub(crate) threshold: Vec<f64>,
    pub(crate) children_left: Vec<i32>,
    pub(crate) children_right: Vec<i32>,
    pub(crate) value: Vec<f64>,
}

impl Tree {
    /// Number of nodes in the stage.
    pub fn n_nodes(&self) -> usize {
        self.feature.len()
    }
}

/// Immutable staged additive ensemble, reconstructed from the
/// interchange document.
///
/// Construction always runs [`Model::validate`]; a `Model` in hand is
/// structurally well-formed and safe to share across concurrent
/// prediction calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    #[serde(rename = "type")]
    pub(crate) model_type: String,
    pub(crate) n_estimators: usize,
    pub(crate) feature_names: Vec<String>,
    pub(crate) learning_rate: f64,
    pub(crate) initial_prediction: f64,
    pub(crate) trees: Vec<Tree>,
}

impl Model {
    /// Load a model from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self, FormatError> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    /// Parse a model from JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FormatError> {
        validated(serde_json::from_slice(bytes)?)
    }

    /// Parse a model from a JSON reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, FormatError> {
        validated(serde_json::from_reader(reader)?)
    }

    /// Feature names in the order `predict` expects.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of boosting stages.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Shrinkage applied to each stage contribution.
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Bias term applied before any stage contribution.
    pub fn initial_prediction(&self) -> f64 {
        self.initial_prediction
    }

    /// Validate structural invariants of the model.
    pub(crate) fn validate(&self) -> Result<(), FormatError> {
        if self.model_type != MODEL_TYPE_GRADIENT_BOOSTING {
            return Err(FormatError::UnknownModelType(self.model_type.clone()));
        }
        if self.feature_names.is_empty() {
            return Err(FormatError::NoFeatureNames);
        }
        if self.trees.is_empty() {
            return Err(FormatError::NoTrees);
        }
        if self.n_estimators != self.trees.len() {
            return Err(FormatError::EstimatorCountMismatch {
                declared: self.n_estimators,
                actual: self.trees.len(),
            });
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            validate_tree(tree_idx, tree, self.feature_names.len())?;
        }
        Ok(())
    }
}

fn validated(model: Model) -> Result<Model, FormatError> {
    model.validate()?;
    tracing::debug!(
        trees = model.trees.len(),
        features = model.feature_names.len(),
        "loaded gradient boosting model"
    );
    Ok(model)
}

/// Check one stage: equal array lengths, child indices in range, and a
/// strict binary tree shape (every node linked from node 0 exactly
/// once). The walk uses an explicit stack; a malformed document must be
/// rejected here, never looped over at inference time.
fn validate_tree(tree_idx: usize, tree: &Tree, n_features: usize) -> Result<(), FormatError> {
    let nodes = tree.feature.len();
    if tree.threshold.len() != nodes
        || tree.children_left.len() != nodes
        || tree.children_right.len() != nodes
        || tree.value.len() != nodes
    {
        return Err(FormatError::RaggedTree {
            tree: tree_idx,
            feature: nodes,
            threshold: tree.threshold.len(),
            left: tree.children_left.len(),
            right: tree.children_right.len(),
            value: tree.value.len(),
        });
    }
    if nodes == 0 {
        return Err(FormatError::EmptyTree(tree_idx));
    }

    let mut visited = vec![false; nodes];
    visited[0] = true;
    let mut seen = 1usize;
    let mut stack = vec![0usize];
    while let Some(node) = stack.pop() {
        let left = tree.children_left[node];
        let right = tree.children_right[node];
        if left == LEAF_CHILD && right == LEAF_CHILD {
            continue;
        }
        if left == LEAF_CHILD || right == LEAF_CHILD {
            return Err(FormatError::HalfLeaf {
                tree: tree_idx,
                node,
            });
        }
        let feature = tree.feature[node];
        if feature < 0 || feature as usize >= n_features {
            return Err(FormatError::FeatureOutOfRange {
                tree: tree_idx,
                node,
                feature,
                features: n_features,
            });
        }
        for child in [left, right] {
            if child < 0 || child as usize >= nodes {
                return Err(FormatError::ChildOutOfRange {
                    tree: tree_idx,
                    node,
                    child,
                });
            }
            let child = child as usize;
            if visited[child] {
                return Err(FormatError::NodeRevisited {
                    tree: tree_idx,
                    node: child,
                });
            }
            visited[child] = true;
            seen += 1;
            stack.push(child);
        }
    }
    if seen != nodes {
        return Err(FormatError::UnreachableNodes {
            tree: tree_idx,
            count: nodes - seen,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    /// Single split on feature 0 at 100.0, leaves 50.0 / -30.0.
    fn stump_document() -> Value {
        json!({
            "type": "gradient_boosting",
            "n_estimators": 1,
            "feature_names": ["aggregated_price_sqm"],
            "learning_rate": 0.1,
            "initial_prediction": 6500.0,
            "trees": [
                {
                    "feature": [0, -2, -2],
                    "threshold": [100.0, 0.0, 0.0],
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "value": [0.0, 50.0, -30.0]
                }
            ]
        })
    }

    fn load(document: Value) -> Result<Model, FormatError> {
        Model::from_slice(document.to_string().as_bytes())
    }

    #[test]
    fn loads_valid_document() {
        let model = load(stump_document()).unwrap();
        assert_eq!(model.n_trees(), 1);
        assert_eq!(model.feature_names(), ["aggregated_price_sqm"]);
        assert_eq!(model.learning_rate(), 0.1);
        assert_eq!(model.initial_prediction(), 6500.0);
        assert_eq!(model.trees[0].n_nodes(), 3);
    }

    #[test]
    fn rejects_unknown_model_type() {
        let mut doc = stump_document();
        doc["type"] = json!("random_forest");
        assert!(matches!(
            load(doc),
            Err(FormatError::UnknownModelType(kind)) if kind == "random_forest"
        ));
    }

    #[test]
    fn rejects_missing_discriminator() {
        let mut doc = stump_document();
        doc.as_object_mut().unwrap().remove("type");
        assert!(matches!(load(doc), Err(FormatError::Json(_))));
    }

    #[test]
    fn rejects_empty_feature_names() {
        let mut doc = stump_document();
        doc["feature_names"] = json!([]);
        assert!(matches!(load(doc), Err(FormatError::NoFeatureNames)));
    }

    #[test]
    fn rejects_empty_trees() {
        let mut doc = stump_document();
        doc["trees"] = json!([]);
        doc["n_estimators"] = json!(0);
        assert!(matches!(load(doc), Err(FormatError::NoTrees)));
    }

    #[test]
    fn rejects_estimator_count_mismatch() {
        let mut doc = stump_document();
        doc["n_estimators"] = json!(7);
        assert!(matches!(
            load(doc),
            Err(FormatError::EstimatorCountMismatch {
                declared: 7,
                actual: 1
            })
        ));
    }

    #[test]
    fn rejects_ragged_arrays() {
        let mut doc = stump_document();
        doc["trees"][0]["threshold"] = json!([100.0, 0.0]);
        assert!(matches!(load(doc), Err(FormatError::RaggedTree { tree: 0, .. })));
    }

    #[test]
    fn rejects_self_loop() {
        let mut doc = stump_document();
        doc["trees"][0]["children_left"] = json!([0, -1, -1]);
        assert!(matches!(
            load(doc),
            Err(FormatError::NodeRevisited { tree: 0, node: 0 })
        ));
    }

    #[test]
    fn rejects_child_out_of_range() {
        let mut doc = stump_document();
        doc["trees"][0]["children_right"] = json!([9, -1, -1]);
        assert!(matches!(
            load(doc),
            Err(FormatError::ChildOutOfRange {
                tree: 0,
                node: 0,
                child: 9
            })
        ));
    }

    #[test]
    fn rejects_half_leaf() {
        let mut doc = stump_document();
        doc["trees"][0]["children_right"] = json!([-1, -1, -1]);
        assert!(matches!(
            load(doc),
            Err(FormatError::HalfLeaf { tree: 0, node: 0 })
        ));
    }

    #[test]
    fn rejects_internal_feature_out_of_range() {
        let mut doc = stump_document();
        doc["trees"][0]["feature"] = json!([3, -2, -2]);
        assert!(matches!(
            load(doc),
            Err(FormatError::FeatureOutOfRange {
                tree: 0,
                node: 0,
                feature: 3,
                features: 1
            })
        ));
    }

    #[test]
    fn rejects_unreachable_nodes() {
        let mut doc = stump_document();
        // Root is a leaf, nodes 1 and 2 dangle.
        doc["trees"][0]["children_left"] = json!([-1, -1, -1]);
        doc["trees"][0]["children_right"] = json!([-1, -1, -1]);
        assert!(matches!(
            load(doc),
            Err(FormatError::UnreachableNodes { tree: 0, count: 2 })
        ));
    }

    #[test]
    fn rejects_empty_tree() {
        let mut doc = stump_document();
        doc["trees"][0] = json!({
            "feature": [],
            "threshold": [],
            "children_left": [],
            "children_right": [],
            "value": []
        });
        assert!(matches!(load(doc), Err(FormatError::EmptyTree(0))));
    }

    #[test]
    fn load_json_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, stump_document().to_string()).unwrap();
        let model = Model::load_json(&path).unwrap();
        assert_eq!(model.n_trees(), 1);
    }

    #[test]
    fn load_json_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let result = Model::load_json(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(FormatError::Io(_))));
    }
}
