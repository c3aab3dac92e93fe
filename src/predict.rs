//! Staged additive inference over a loaded model.

use std::collections::BTreeMap;

use crate::error::ShapeMismatchError;
use crate::model::{LEAF_CHILD, Model, Tree};

impl Model {
    /// Predict the target value for one positional feature vector.
    ///
    /// The vector must match [`Model::feature_names`] in length and
    /// order. Contributions accumulate in stage order in a single
    /// accumulator; floating-point addition is not associative, so this
    /// order is part of the reproducibility contract.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ShapeMismatchError> {
        self.check_shape(features)?;
        let mut prediction = self.initial_prediction;
        for tree in &self.trees {
            prediction += self.learning_rate * leaf_value(tree, features);
        }
        Ok(prediction)
    }

    /// Predict target values for a batch of rows, preserving input order.
    pub fn predict_batch<R: AsRef<[f64]>>(
        &self,
        rows: &[R],
    ) -> Result<Vec<f64>, ShapeMismatchError> {
        rows.iter().map(|row| self.predict(row.as_ref())).collect()
    }

    /// Assemble a positional vector from a name-keyed feature record.
    ///
    /// Every model feature must be present and no extra names are
    /// accepted; nothing is zero-filled.
    pub fn vector_from_named(
        &self,
        features: &BTreeMap<String, f64>,
    ) -> Result<Vec<f64>, ShapeMismatchError> {
        for name in features.keys() {
            if !self.feature_names.iter().any(|known| known == name) {
                return Err(ShapeMismatchError::UnknownFeature(name.clone()));
            }
        }
        self.feature_names
            .iter()
            .map(|name| {
                features
                    .get(name)
                    .copied()
                    .ok_or_else(|| ShapeMismatchError::MissingFeature(name.clone()))
            })
            .collect()
    }

    fn check_shape(&self, features: &[f64]) -> Result<(), ShapeMismatchError> {
        if features.len() != self.feature_names.len() {
            return Err(ShapeMismatchError::LengthMismatch {
                expected: self.feature_names.len(),
                got: features.len(),
            });
        }
        // NaN would compare false against any threshold and silently
        // route right; reject it up front.
        if let Some(index) = features.iter().position(|v| v.is_nan()) {
            return Err(ShapeMismatchError::NotANumber {
                index,
                name: self.feature_names[index].clone(),
            });
        }
        Ok(())
    }
}

/// Descend one stage from the root to a leaf.
///
/// Ties route right: a feature value equal to the threshold takes the
/// right branch, matching the training library's split semantics.
fn leaf_value(tree: &Tree, features: &[f64]) -> f64 {
    let mut node = 0usize;
    while tree.children_left[node] != LEAF_CHILD {
        node = if features[tree.feature[node] as usize] < tree.threshold[node] {
            tree.children_left[node] as usize
        } else {
            tree.children_right[node] as usize
        };
    }
    tree.value[node]
}
