//! Explanation Engine
//!
//! Finds the preprocessing and model stages, tries each attribution strategy
//! in order and keeps the top contributions by magnitude. Explainers are
//! cached per model fingerprint; any failure becomes `Explanation::Unavailable`.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::Array1;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::strategy::{default_strategies, AttributionStrategy, ExplainError};
use super::types::{Explanation, FeatureContribution};
use crate::logic::config::ExplainSwitch;
use crate::logic::features::OrderedRecord;
use crate::logic::model::{LoadedModel, Preprocessor, ScoringModel};

const PREPROCESS_PREFIX: &str = "preprocess";
const MODEL_STEP: &str = "model";

/// Explainer bound to one model's feature space
pub struct Explainer {
    feature_names: Vec<String>,
    strategies: Vec<Box<dyn AttributionStrategy>>,
}

impl std::fmt::Debug for Explainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explainer")
            .field("features", &self.feature_names.len())
            .field("strategies", &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

fn preprocessor_of(model: &dyn ScoringModel) -> Result<&Preprocessor, ExplainError> {
    model
        .named_stage(PREPROCESS_PREFIX)
        .and_then(|s| s.stage.as_preprocessor())
        .ok_or_else(|| ExplainError::MissingStage(format!("{}*", PREPROCESS_PREFIX)))
}

impl Explainer {
    pub fn for_model(model: &dyn ScoringModel) -> Result<Self, ExplainError> {
        Self::with_strategies(model, default_strategies())
    }

    pub fn with_strategies(
        model: &dyn ScoringModel,
        strategies: Vec<Box<dyn AttributionStrategy>>,
    ) -> Result<Self, ExplainError> {
        let pre = preprocessor_of(model)?;
        if model.estimator().is_none() {
            return Err(ExplainError::MissingStage(MODEL_STEP.to_string()));
        }

        Ok(Self {
            feature_names: pre.feature_names_out(),
            strategies,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Positive-class contributions from the first strategy that succeeds
    pub fn attribute(
        &self,
        model: &dyn ScoringModel,
        record: &OrderedRecord,
    ) -> Result<(&'static str, Array1<f64>), ExplainError> {
        let pre = preprocessor_of(model)?;
        let estimator = model
            .estimator()
            .ok_or_else(|| ExplainError::MissingStage(MODEL_STEP.to_string()))?;
        let x = pre.transform(record)?;

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            let outcome = strategy
                .attribute(estimator, x.view())
                .and_then(|a| a.positive_slice());

            match outcome {
                Ok(values) if values.len() == self.feature_names.len() => {
                    return Ok((strategy.name(), values));
                }
                Ok(values) => failures.push(format!(
                    "{}: {} contributions for {} features",
                    strategy.name(),
                    values.len(),
                    self.feature_names.len()
                )),
                Err(e) => failures.push(format!("{}: {}", strategy.name(), e)),
            }
        }

        Err(ExplainError::Exhausted(failures))
    }

    pub fn explain(
        &self,
        model: &dyn ScoringModel,
        record: &OrderedRecord,
        top_n: usize,
    ) -> Result<Explanation, ExplainError> {
        let (strategy, values) = self.attribute(model, record)?;
        Ok(Explanation::Available {
            strategy: strategy.to_string(),
            contributions: rank_contributions(&self.feature_names, &values, top_n),
        })
    }
}

/// Sort by descending |contribution| and keep the first `top_n`.
/// Ties keep feature order; non-finite values sink to the end.
pub fn rank_contributions(names: &[String], values: &Array1<f64>, top_n: usize) -> Vec<FeatureContribution> {
    let mut ranked: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| {
        let (ka, kb) = (magnitude(a.1), magnitude(b.1));
        kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(top_n);

    ranked
        .into_iter()
        .filter_map(|(i, v)| names.get(i).map(|name| FeatureContribution::new(name.clone(), v)))
        .collect()
}

fn magnitude(v: f64) -> f64 {
    if v.is_finite() { v.abs() } else { -1.0 }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Explain without caching; every failure folds into `Unavailable`.
pub fn explain_model(model: &dyn ScoringModel, record: &OrderedRecord, top_n: usize) -> Explanation {
    let result = Explainer::for_model(model).and_then(|e| e.explain(model, record, top_n));
    contain(result)
}

type CachedExplainer = Result<Arc<Explainer>, String>;

// Built once per model file; construction failures are cached too.
static EXPLAINERS: Lazy<RwLock<HashMap<String, CachedExplainer>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn cache_key(loaded: &LoadedModel) -> String {
    format!("{}#{}", loaded.metadata.model_path, loaded.metadata.sha256)
}

fn cached_explainer(loaded: &LoadedModel) -> CachedExplainer {
    let key = cache_key(loaded);

    if let Some(entry) = EXPLAINERS.read().get(&key) {
        return entry.clone();
    }

    let mut cache = EXPLAINERS.write();
    if let Some(entry) = cache.get(&key) {
        return entry.clone();
    }

    let entry = match Explainer::for_model(loaded.model.as_ref()) {
        Ok(explainer) => {
            log::debug!("Explainer ready: {:?}", explainer);
            Ok(Arc::new(explainer))
        }
        Err(e) => {
            log::warn!("No explainer for {}: {}", loaded.metadata.name, e);
            Err(e.to_string())
        }
    };
    cache.insert(key, entry.clone());
    entry
}

/// Explanation for a loaded model, honouring the kill-switch
pub fn explain(loaded: &LoadedModel, record: &OrderedRecord, top_n: usize) -> Explanation {
    if !ExplainSwitch::is_enabled() {
        return Explanation::unavailable("Local explanations are disabled");
    }

    match cached_explainer(loaded) {
        Ok(explainer) => contain(explainer.explain(loaded.model.as_ref(), record, top_n)),
        Err(reason) => Explanation::unavailable(reason),
    }
}

fn contain(result: Result<Explanation, ExplainError>) -> Explanation {
    match result {
        Ok(explanation) => explanation,
        Err(e) => {
            log::warn!("Explanation unavailable: {}", e);
            Explanation::unavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::{assemble, guard, FormInput};
    use crate::logic::model::{InferenceError, PipelineModel};
    use ndarray::{array, Array2, ArrayView1};
    use serde_json::json;

    use super::super::strategy::{Attribution, TreePathAttribution};
    use crate::logic::model::Estimator;

    fn default_row() -> OrderedRecord {
        guard(&assemble(&FormInput::default())).unwrap()
    }

    /// Scores fine but exposes no stages
    struct OpaqueModel;

    impl ScoringModel for OpaqueModel {
        fn name(&self) -> &str {
            "opaque"
        }
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }
        fn predict_proba(&self, rows: &[OrderedRecord]) -> Result<Array2<f64>, InferenceError> {
            Ok(Array2::from_elem((rows.len(), 2), 0.5))
        }
    }

    fn linear_model() -> PipelineModel {
        serde_json::from_value(json!({
            "name": "unit_linear",
            "steps": [
                {"name": "preprocess", "stage": {"type": "column_transformer",
                    "numeric": [{"column": "AGE_IM", "mean": 20.0, "scale": 10.0}],
                    "categorical": [{"column": "ALCOHOL", "categories": [1, 2]}]}},
                {"name": "model", "stage": {"type": "logistic_regression",
                    "coefficients": [0.1, 2.0, -0.5], "intercept": 0.0,
                    "background": [0.0, 0.5, 0.5]}}
            ]
        }))
        .unwrap()
    }

    fn tree_model() -> PipelineModel {
        serde_json::from_value(json!({
            "name": "unit_trees",
            "steps": [
                {"name": "preprocessor", "stage": {"type": "column_transformer",
                    "numeric": [{"column": "AGE_IM"}, {"column": "NUMOCCS"}]}},
                {"name": "model", "stage": {"type": "tree_ensemble",
                    "n_features": 2,
                    "trees": [{"nodes": [
                        {"feature": 0, "threshold": 50.0, "left": 1, "right": 2, "value": [0.0]},
                        {"value": [-0.3]},
                        {"value": [0.9]}
                    ]}]}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_missing_stages_is_unavailable() {
        let err = Explainer::for_model(&OpaqueModel).unwrap_err();
        assert!(matches!(err, ExplainError::MissingStage(_)));

        let explanation = explain_model(&OpaqueModel, &default_row(), 12);
        assert!(!explanation.is_available());
        assert!(explanation.contributions().is_empty());
    }

    #[test]
    fn test_linear_model_uses_explainer_call() {
        let model = linear_model();
        let explanation = explain_model(&model, &default_row(), 12);

        let Explanation::Available { strategy, contributions } = explanation else {
            panic!("expected an explanation");
        };
        assert_eq!(strategy, "explainer_call");
        // AGE 30 -> x=1.0 -> 0.1; ALCOHOL=2 -> (0-0.5)*2.0 = -1.0, (1-0.5)*-0.5 = -0.25
        let names: Vec<&str> = contributions.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(names, vec!["cat__ALCOHOL_1", "cat__ALCOHOL_2", "num__AGE_IM"]);
        assert!((contributions[0].contribution + 1.0).abs() < 1e-12);
        assert!((contributions[1].contribution + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_tree_model_falls_back_to_tree_path() {
        let model = tree_model();
        let explanation = explain_model(&model, &default_row(), 12);

        let Explanation::Available { strategy, contributions } = explanation else {
            panic!("expected an explanation");
        };
        assert_eq!(strategy, "tree_path");
        assert_eq!(contributions[0].feature, "num__AGE_IM");
        assert!((contributions[0].contribution + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_top_n_truncates() {
        let explanation = explain_model(&linear_model(), &default_row(), 1);
        assert_eq!(explanation.contributions().len(), 1);

        let explanation = explain_model(&linear_model(), &default_row(), 0);
        assert!(explanation.is_available());
        assert!(explanation.contributions().is_empty());
    }

    #[test]
    fn test_exhaustion_collects_diagnostics() {
        let model = linear_model();
        let explainer =
            Explainer::with_strategies(&model, vec![Box::new(TreePathAttribution)]).unwrap();
        let err = explainer.explain(&model, &default_row(), 12).unwrap_err();
        assert!(err.to_string().contains("tree_path does not support linear estimators"));
    }

    struct TwoSlice;

    impl AttributionStrategy for TwoSlice {
        fn name(&self) -> &'static str {
            "two_slice"
        }
        fn attribute(&self, _: Estimator<'_>, x: ArrayView1<f64>) -> Result<Attribution, ExplainError> {
            let mut m = Array2::zeros((x.len(), 2));
            for i in 0..x.len() {
                m[[i, 0]] = -(i as f64);
                m[[i, 1]] = i as f64;
            }
            Ok(Attribution::PerClass(m))
        }
    }

    #[test]
    fn test_two_class_slices_pick_positive() {
        let model = linear_model();
        let explainer = Explainer::with_strategies(&model, vec![Box::new(TwoSlice)]).unwrap();
        let (_, values) = explainer.attribute(&model, &default_row()).unwrap();
        assert_eq!(values, array![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_rank_contributions_orders_by_magnitude() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_contributions(&names, &array![0.1, -0.9, f64::NAN, 0.5], 3);
        let order: Vec<&str> = ranked.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "d", "a"]);
        assert!(!ranked[0].increases_risk());
    }
}
