//! Attribution Strategies
//!
//! Each strategy turns one transformed row into per-feature contributions
//! for a specific estimator family, or declines with an error.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use thiserror::Error;

use crate::logic::model::{Estimator, InferenceError};

#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("model has no '{0}' stage")]
    MissingStage(String),

    #[error("{strategy} does not support {estimator} estimators")]
    Unsupported {
        strategy: &'static str,
        estimator: &'static str,
    },

    #[error("could not transform input: {0}")]
    Transform(#[from] InferenceError),

    #[error("contribution shape mismatch: {0}")]
    Shape(String),

    #[error("no strategy could explain this model ({})", .0.join("; "))]
    Exhausted(Vec<String>),
}

/// Raw strategy output
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// One value per feature
    Flat(Array1<f64>),
    /// features x output classes
    PerClass(Array2<f64>),
}

/// Class slice treated as positive: 1 for two slices, otherwise the last
pub fn positive_class_index(n_slices: usize) -> Option<usize> {
    match n_slices {
        0 => None,
        2 => Some(1),
        n => Some(n - 1),
    }
}

impl Attribution {
    /// Contributions for the positive class
    pub fn positive_slice(self) -> Result<Array1<f64>, ExplainError> {
        match self {
            Attribution::Flat(values) => Ok(values),
            Attribution::PerClass(matrix) => {
                let idx = positive_class_index(matrix.ncols())
                    .ok_or_else(|| ExplainError::Shape("no class slices".to_string()))?;
                Ok(matrix.index_axis(Axis(1), idx).to_owned())
            }
        }
    }
}

pub trait AttributionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attribute(&self, estimator: Estimator<'_>, x: ArrayView1<f64>) -> Result<Attribution, ExplainError>;
}

fn estimator_kind(estimator: &Estimator<'_>) -> &'static str {
    match estimator {
        Estimator::Linear(_) => "linear",
        Estimator::Trees(_) => "tree",
    }
}

// ============================================================================
// LINEAR (generic explainer call)
// ============================================================================

/// `w_j * (x_j - background_j)` per feature
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearAttribution;

impl AttributionStrategy for LinearAttribution {
    fn name(&self) -> &'static str {
        "explainer_call"
    }

    fn attribute(&self, estimator: Estimator<'_>, x: ArrayView1<f64>) -> Result<Attribution, ExplainError> {
        let Estimator::Linear(model) = estimator else {
            return Err(ExplainError::Unsupported {
                strategy: self.name(),
                estimator: estimator_kind(&estimator),
            });
        };

        if x.len() != model.coefficients.len() {
            return Err(ExplainError::Shape(format!(
                "{} inputs for {} coefficients",
                x.len(),
                model.coefficients.len()
            )));
        }

        let background = model.background_or_zero();
        let values: Array1<f64> = x
            .iter()
            .zip(&model.coefficients)
            .zip(&background)
            .map(|((xi, w), b)| w * (xi - b))
            .collect();

        Ok(Attribution::Flat(values))
    }
}

// ============================================================================
// TREE PATH (tree-specific)
// ============================================================================

/// Decision-path attribution: each split credits its feature with the
/// change in node value along the path the row takes.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreePathAttribution;

impl AttributionStrategy for TreePathAttribution {
    fn name(&self) -> &'static str {
        "tree_path"
    }

    fn attribute(&self, estimator: Estimator<'_>, x: ArrayView1<f64>) -> Result<Attribution, ExplainError> {
        let Estimator::Trees(ensemble) = estimator else {
            return Err(ExplainError::Unsupported {
                strategy: self.name(),
                estimator: estimator_kind(&estimator),
            });
        };

        if x.len() != ensemble.n_features {
            return Err(ExplainError::Shape(format!(
                "{} inputs for {} tree features",
                x.len(),
                ensemble.n_features
            )));
        }

        let outputs = ensemble.n_outputs();
        let weight = ensemble.tree_weight();
        let mut contributions = Array2::<f64>::zeros((ensemble.n_features, outputs));

        for tree in &ensemble.trees {
            let path = tree.decision_path(x)?;
            for pair in path.windows(2) {
                let (parent, child) = (&tree.nodes[pair[0]], &tree.nodes[pair[1]]);
                let Some(feature) = parent.feature else { continue };
                for o in 0..outputs {
                    let delta = child.value.get(o).copied().unwrap_or(0.0)
                        - parent.value.get(o).copied().unwrap_or(0.0);
                    contributions[[feature, o]] += weight * delta;
                }
            }
        }

        Ok(Attribution::PerClass(contributions))
    }
}

/// Strategies in the order they are tried
pub fn default_strategies() -> Vec<Box<dyn AttributionStrategy>> {
    vec![Box::new(LinearAttribution), Box::new(TreePathAttribution)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::pipeline::{LinearModel, TreeEnsemble};
    use ndarray::array;
    use serde_json::json;

    #[test]
    fn test_positive_class_index() {
        assert_eq!(positive_class_index(0), None);
        assert_eq!(positive_class_index(1), Some(0));
        assert_eq!(positive_class_index(2), Some(1));
        assert_eq!(positive_class_index(3), Some(2));
    }

    #[test]
    fn test_two_slices_select_index_one() {
        let per_class = Attribution::PerClass(array![[-0.4, 0.4], [0.1, -0.1]]);
        assert_eq!(per_class.positive_slice().unwrap(), array![0.4, -0.1]);
    }

    #[test]
    fn test_single_slice_selects_index_zero() {
        let per_class = Attribution::PerClass(array![[0.7], [-0.2]]);
        assert_eq!(per_class.positive_slice().unwrap(), array![0.7, -0.2]);
    }

    #[test]
    fn test_flat_passes_through() {
        let flat = Attribution::Flat(array![1.0, 2.0]);
        assert_eq!(flat.positive_slice().unwrap(), array![1.0, 2.0]);
    }

    #[test]
    fn test_linear_attribution_uses_background() {
        let model = LinearModel {
            coefficients: vec![2.0, -1.0],
            intercept: 0.3,
            background: Some(vec![0.5, 0.0]),
        };
        let out = LinearAttribution
            .attribute(Estimator::Linear(&model), array![1.0, 1.0].view())
            .unwrap();
        assert_eq!(out, Attribution::Flat(array![1.0, -1.0]));
    }

    #[test]
    fn test_linear_rejects_trees() {
        let ensemble: TreeEnsemble = serde_json::from_value(json!({
            "n_features": 1, "trees": [{"nodes": [{"value": [0.0]}]}]
        }))
        .unwrap();
        let err = LinearAttribution
            .attribute(Estimator::Trees(&ensemble), array![0.0].view())
            .unwrap_err();
        assert_eq!(err.to_string(), "explainer_call does not support tree estimators");
    }

    #[test]
    fn test_tree_path_credits_split_features() {
        // root splits on feature 1; right child splits on feature 0
        let ensemble: TreeEnsemble = serde_json::from_value(json!({
            "n_features": 2,
            "trees": [{"nodes": [
                {"feature": 1, "threshold": 0.5, "left": 1, "right": 2, "value": [0.0]},
                {"value": [-1.0]},
                {"feature": 0, "threshold": 0.5, "left": 3, "right": 4, "value": [1.0]},
                {"value": [0.5]},
                {"value": [2.0]}
            ]}]
        }))
        .unwrap();

        let out = TreePathAttribution
            .attribute(Estimator::Trees(&ensemble), array![1.0, 1.0].view())
            .unwrap();
        // path 0 -> 2 -> 4: feature 1 gets +1.0, feature 0 gets +1.0
        assert_eq!(out, Attribution::PerClass(array![[1.0], [1.0]]));

        let out = TreePathAttribution
            .attribute(Estimator::Trees(&ensemble), array![1.0, 0.0].view())
            .unwrap();
        assert_eq!(out, Attribution::PerClass(array![[0.0], [-1.0]]));
    }

    #[test]
    fn test_tree_path_per_class_mean() {
        let forest: TreeEnsemble = serde_json::from_value(json!({
            "n_features": 1,
            "aggregation": "mean",
            "link": "identity",
            "trees": [
                {"nodes": [
                    {"feature": 0, "threshold": 0.0, "left": 1, "right": 2, "value": [0.5, 0.5]},
                    {"value": [0.9, 0.1]},
                    {"value": [0.1, 0.9]}
                ]},
                {"nodes": [{"value": [0.5, 0.5]}]}
            ]
        }))
        .unwrap();

        let out = TreePathAttribution
            .attribute(Estimator::Trees(&forest), array![1.0].view())
            .unwrap();
        let slice = out.positive_slice().unwrap();
        assert!((slice[0] - 0.2).abs() < 1e-12);
    }
}
