//! Read-only trainer boundary and JSON export.
//!
//! The training library is only ever seen through [`FittedEnsemble`]:
//! ordered per-stage trees as four parallel structural arrays plus a
//! value array, a learning rate, a scalar baseline, and the fit-time
//! feature names. None of the trainer's object model crosses this
//! boundary.

use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::model::{MODEL_TYPE_GRADIENT_BOOSTING, Model, Tree};

/// Borrowed parallel node arrays for one fitted boosting stage.
#[derive(Debug, Clone, Copy)]
pub struct StageArrays<'a> {
    /// Split feature per node; negative at leaves.
    pub feature: &'a [i32],
    /// Split threshold per node.
    pub threshold: &'a [f64],
    /// Left child per node; `-1` at leaves.
    pub children_left: &'a [i32],
    /// Right child per node; `-1` at leaves.
    pub children_right: &'a [i32],
    /// Leaf contribution per node, one value per node.
    pub value: &'a [f64],
}

/// Narrow read-only capability exposed by a fitted ensemble.
pub trait FittedEnsemble {
    /// Feature names in fit order.
    fn feature_names(&self) -> &[String];

    /// Feature dimensionality the stages were fit on.
    fn n_features(&self) -> usize;

    /// Shrinkage applied to each stage contribution.
    fn learning_rate(&self) -> f64;

    /// Per-target bias terms. Single-target regression exposes exactly
    /// one; anything else is rejected at export rather than silently
    /// picking an element.
    fn baseline(&self) -> &[f64];

    /// Number of boosting stages, in boosting order.
    fn n_stages(&self) -> usize;

    /// Parallel node arrays for one stage.
    fn stage(&self, index: usize) -> StageArrays<'_>;
}

/// Convert a fitted ensemble into an interchange [`Model`].
///
/// The result additionally passes the loader's structural validation
/// before it is returned.
pub fn export_model(ensemble: &impl FittedEnsemble) -> Result<Model, ExportError> {
    if ensemble.n_stages() == 0 {
        return Err(ExportError::EmptyEnsemble);
    }
    let names = ensemble.feature_names();
    if names.len() != ensemble.n_features() {
        return Err(ExportError::FeatureCountMismatch {
            names: names.len(),
            features: ensemble.n_features(),
        });
    }
    let initial_prediction = match ensemble.baseline() {
        [bias] => *bias,
        other => return Err(ExportError::BaselineNotScalar(other.len())),
    };

    let mut trees = Vec::with_capacity(ensemble.n_stages());
    for stage_idx in 0..ensemble.n_stages() {
        let stage = ensemble.stage(stage_idx);
        let nodes = stage.feature.len();
        if stage.threshold.len() != nodes
            || stage.children_left.len() != nodes
            || stage.children_right.len() != nodes
        {
            return Err(ExportError::RaggedStage {
                stage: stage_idx,
                feature: nodes,
                threshold: stage.threshold.len(),
                left: stage.children_left.len(),
                right: stage.children_right.len(),
            });
        }
        if stage.value.len() != nodes {
            return Err(ExportError::ValueLengthMismatch {
                stage: stage_idx,
                values: stage.value.len(),
                nodes,
            });
        }
        trees.push(Tree {
            feature: stage.feature.to_vec(),
            threshold: stage.threshold.to_vec(),
            children_left: stage.children_left.to_vec(),
            children_right: stage.children_right.to_vec(),
            value: stage.value.to_vec(),
        });
    }

    let model = Model {
        model_type: MODEL_TYPE_GRADIENT_BOOSTING.to_string(),
        n_estimators: trees.len(),
        feature_names: names.to_vec(),
        learning_rate: ensemble.learning_rate(),
        initial_prediction,
        trees,
    };
    model.validate()?;
    Ok(model)
}

/// Serialize a model as pretty-printed JSON to a writer.
pub fn export_to_writer(model: &Model, writer: impl Write) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, model)?;
    Ok(())
}

/// Export an ensemble to a JSON file.
///
/// The document is staged in a temporary file next to `path` and
/// persisted only after a complete write; a failed export leaves no
/// partial artifact behind.
pub fn export_to_path(
    ensemble: &impl FittedEnsemble,
    path: &Path,
) -> Result<Model, ExportError> {
    let model = export_model(ensemble)?;
    write_json_atomic(&model, path)?;
    tracing::debug!(
        path = %path.display(),
        trees = model.n_trees(),
        "exported gradient boosting model"
    );
    Ok(model)
}

fn write_json_atomic(model: &Model, path: &Path) -> Result<(), ExportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, model)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| ExportError::Io(err.error))?;
    Ok(())
}
