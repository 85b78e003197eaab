//! Model Pipeline - JSON-serialized fitted pipeline
//!
//! Two named steps: a column transformer (`preprocess*`) and an estimator
//! (`model`). The file is produced by the training notebook's export step.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::inference::{InferenceError, ScoringModel};
use crate::logic::features::{column_index, OrderedRecord};

// ============================================================================
// PIPELINE
// ============================================================================

/// Fitted two-stage pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineModel {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    /// Class labels in probability-column order
    #[serde(default = "default_classes")]
    pub classes: Vec<i64>,
    pub steps: Vec<NamedStep>,
}

fn default_classes() -> Vec<i64> {
    vec![0, 1]
}

/// A pipeline step addressable by name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedStep {
    pub name: String,
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    ColumnTransformer(Preprocessor),
    LogisticRegression(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

/// Borrowed view of an estimator stage
#[derive(Debug, Clone, Copy)]
pub enum Estimator<'a> {
    Linear(&'a LinearModel),
    Trees(&'a TreeEnsemble),
}

impl Stage {
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::ColumnTransformer(_) => "column_transformer",
            Stage::LogisticRegression(_) => "logistic_regression",
            Stage::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    pub fn as_preprocessor(&self) -> Option<&Preprocessor> {
        match self {
            Stage::ColumnTransformer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_estimator(&self) -> Option<Estimator<'_>> {
        match self {
            Stage::LogisticRegression(m) => Some(Estimator::Linear(m)),
            Stage::TreeEnsemble(t) => Some(Estimator::Trees(t)),
            Stage::ColumnTransformer(_) => None,
        }
    }
}

impl<'a> Estimator<'a> {
    pub fn n_features(&self) -> usize {
        match self {
            Estimator::Linear(m) => m.coefficients.len(),
            Estimator::Trees(t) => t.n_features,
        }
    }

    /// Class probabilities for one transformed row
    pub fn predict_proba_row(&self, x: ArrayView1<f64>, n_classes: usize) -> Result<Vec<f64>, InferenceError> {
        match self {
            Estimator::Linear(m) => m.predict_proba_row(x),
            Estimator::Trees(t) => t.predict_proba_row(x, n_classes),
        }
    }
}

impl PipelineModel {
    pub fn from_json(json: &str) -> Result<Self, InferenceError> {
        let model: PipelineModel = serde_json::from_str(json)
            .map_err(|e| InferenceError::Format(format!("invalid pipeline JSON: {}", e)))?;
        model.validate()?;
        Ok(model)
    }

    pub fn step(&self, name: &str) -> Option<&NamedStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// First step whose name starts with `prefix`
    pub fn step_with_prefix(&self, prefix: &str) -> Option<&NamedStep> {
        self.steps.iter().find(|s| s.name.starts_with(prefix))
    }

    pub fn preprocessor(&self) -> Option<&Preprocessor> {
        self.step_with_prefix("preprocess")
            .and_then(|s| s.stage.as_preprocessor())
    }

    pub fn final_estimator(&self) -> Option<Estimator<'_>> {
        self.step("model").and_then(|s| s.stage.as_estimator())
    }

    /// Structural checks run once at load time
    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.classes.is_empty() {
            return Err(InferenceError::Format("pipeline declares no classes".to_string()));
        }

        let mut names: Vec<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        let total = names.len();
        names.dedup();
        if names.len() != total {
            return Err(InferenceError::Format("duplicate step names".to_string()));
        }

        let pre = self.preprocessor().ok_or_else(|| {
            InferenceError::Format("no step named 'preprocess*' with a column transformer".to_string())
        })?;
        pre.validate()?;

        let est = self.final_estimator().ok_or_else(|| {
            InferenceError::Format("no estimator step named 'model'".to_string())
        })?;

        if pre.n_features_out() != est.n_features() {
            return Err(InferenceError::Format(format!(
                "preprocess emits {} features but model expects {}",
                pre.n_features_out(),
                est.n_features()
            )));
        }

        if let Estimator::Trees(t) = est {
            t.validate()?;
        }

        Ok(())
    }
}

impl ScoringModel for PipelineModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, rows: &[OrderedRecord]) -> Result<Array2<f64>, InferenceError> {
        let pre = self.preprocessor()
            .ok_or_else(|| InferenceError::Format("preprocess step missing".to_string()))?;
        let est = self.final_estimator()
            .ok_or_else(|| InferenceError::Format("model step missing".to_string()))?;

        let n_classes = self.classes.len();
        let mut out = Array2::<f64>::zeros((rows.len(), n_classes));

        for (i, row) in rows.iter().enumerate() {
            let x = pre.transform(row)?;
            let proba = est.predict_proba_row(x.view(), n_classes)?;
            if proba.len() != n_classes {
                return Err(InferenceError::Shape(format!(
                    "estimator returned {} probabilities for {} classes",
                    proba.len(),
                    n_classes
                )));
            }
            for (j, p) in proba.into_iter().enumerate() {
                out[[i, j]] = p;
            }
        }

        Ok(out)
    }

    fn stage_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    fn named_stage(&self, prefix: &str) -> Option<&NamedStep> {
        self.step_with_prefix(prefix)
    }

    fn estimator(&self) -> Option<Estimator<'_>> {
        self.final_estimator()
    }
}

// ============================================================================
// PREPROCESSING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericColumn {
    pub column: String,
    #[serde(default)]
    pub mean: f64,
    #[serde(default = "one")]
    pub scale: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub column: String,
    pub categories: Vec<i64>,
}

/// Standardise numeric columns, one-hot encode categorical ones.
/// Unseen categories encode as all zeros.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preprocessor {
    #[serde(default)]
    pub numeric: Vec<NumericColumn>,
    #[serde(default)]
    pub categorical: Vec<CategoricalColumn>,
}

impl Preprocessor {
    pub fn n_features_out(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// Output feature names (`num__<col>`, `cat__<col>_<code>`)
    pub fn feature_names_out(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.n_features_out());
        for n in &self.numeric {
            names.push(format!("num__{}", n.column));
        }
        for c in &self.categorical {
            for code in &c.categories {
                names.push(format!("cat__{}_{}", c.column, code));
            }
        }
        names
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        let columns = self.numeric.iter().map(|n| &n.column)
            .chain(self.categorical.iter().map(|c| &c.column));
        for column in columns {
            if column_index(column).is_none() {
                return Err(InferenceError::Format(format!(
                    "preprocess references unknown column '{}'",
                    column
                )));
            }
        }
        if self.n_features_out() == 0 {
            return Err(InferenceError::Format("preprocess emits no features".to_string()));
        }
        Ok(())
    }

    pub fn transform(&self, record: &OrderedRecord) -> Result<Array1<f64>, InferenceError> {
        let mut out = Vec::with_capacity(self.n_features_out());

        for n in &self.numeric {
            let value = lookup(record, &n.column)? as f64;
            let scale = if n.scale.abs() < f64::EPSILON { 1.0 } else { n.scale };
            out.push((value - n.mean) / scale);
        }

        for c in &self.categorical {
            let value = lookup(record, &c.column)?;
            out.extend(c.categories.iter().map(|code| if *code == value { 1.0 } else { 0.0 }));
        }

        Ok(Array1::from(out))
    }
}

fn lookup(record: &OrderedRecord, column: &str) -> Result<i64, InferenceError> {
    record
        .get(column)
        .ok_or_else(|| InferenceError::Format(format!("column '{}' not in record", column)))
}

// ============================================================================
// ESTIMATORS
// ============================================================================

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(z: &[f64]) -> Vec<f64> {
    let max = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = z.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Binary logistic regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    /// Training means of the transformed features (attribution baseline)
    #[serde(default)]
    pub background: Option<Vec<f64>>,
}

impl LinearModel {
    pub fn decision(&self, x: ArrayView1<f64>) -> Result<f64, InferenceError> {
        if x.len() != self.coefficients.len() {
            return Err(InferenceError::Shape(format!(
                "row has {} features, coefficients {}",
                x.len(),
                self.coefficients.len()
            )));
        }
        let dot: f64 = x.iter().zip(&self.coefficients).map(|(a, w)| a * w).sum();
        Ok(dot + self.intercept)
    }

    pub fn predict_proba_row(&self, x: ArrayView1<f64>) -> Result<Vec<f64>, InferenceError> {
        let p = sigmoid(self.decision(x)?);
        Ok(vec![1.0 - p, p])
    }

    /// Baseline value per feature, zeros when not exported
    pub fn background_or_zero(&self) -> Vec<f64> {
        match &self.background {
            Some(b) if b.len() == self.coefficients.len() => b.clone(),
            _ => vec![0.0; self.coefficients.len()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Boosting: add tree outputs
    #[default]
    Sum,
    /// Bagging: average tree outputs
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Raw output is a margin (sigmoid / softmax applied)
    #[default]
    Logit,
    /// Raw output already is a probability
    Identity,
}

/// Tree node; a node without `feature` is a leaf.
/// `value` is the node's expected output (one entry per output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub left: usize,
    #[serde(default)]
    pub right: usize,
    pub value: Vec<f64>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.feature.is_none()
    }
}

/// Nodes indexed from the root at 0; `x[feature] <= threshold` goes left
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Node indices from root to leaf for one row
    pub fn decision_path(&self, x: ArrayView1<f64>) -> Result<Vec<usize>, InferenceError> {
        let mut path = Vec::new();
        let mut idx = 0usize;
        // bounded by node count so malformed cycles cannot loop forever
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx)
                .ok_or_else(|| InferenceError::Format(format!("node index {} out of range", idx)))?;
            path.push(idx);
            let Some(feature) = node.feature else {
                return Ok(path);
            };
            let value = x.get(feature)
                .ok_or_else(|| InferenceError::Shape(format!("feature {} out of range", feature)))?;
            idx = if *value <= node.threshold { node.left } else { node.right };
        }
        Err(InferenceError::Format("tree does not terminate".to_string()))
    }

    pub fn leaf_value(&self, x: ArrayView1<f64>) -> Result<&[f64], InferenceError> {
        let path = self.decision_path(x)?;
        let leaf = path.last().and_then(|i| self.nodes.get(*i))
            .ok_or_else(|| InferenceError::Format("empty tree".to_string()))?;
        Ok(&leaf.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub link: Link,
    /// Initial raw output per output (zeros when empty)
    #[serde(default)]
    pub base_score: Vec<f64>,
}

impl TreeEnsemble {
    /// Number of outputs carried by each node
    pub fn n_outputs(&self) -> usize {
        self.trees
            .first()
            .and_then(|t| t.nodes.first())
            .map(|n| n.value.len())
            .unwrap_or(0)
    }

    pub fn base(&self) -> Vec<f64> {
        if self.base_score.len() == self.n_outputs() {
            self.base_score.clone()
        } else {
            vec![0.0; self.n_outputs()]
        }
    }

    /// Weight applied to each tree's output
    pub fn tree_weight(&self) -> f64 {
        match self.aggregation {
            Aggregation::Sum => 1.0,
            Aggregation::Mean => 1.0 / self.trees.len().max(1) as f64,
        }
    }

    pub fn validate(&self) -> Result<(), InferenceError> {
        if self.trees.is_empty() {
            return Err(InferenceError::Format("tree ensemble has no trees".to_string()));
        }
        let outputs = self.n_outputs();
        if outputs == 0 {
            return Err(InferenceError::Format("tree nodes carry no values".to_string()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(InferenceError::Format(format!("tree {} is empty", t)));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                if node.value.len() != outputs {
                    return Err(InferenceError::Format(format!(
                        "tree {} node {} has {} values, expected {}",
                        t, n, node.value.len(), outputs
                    )));
                }
                if let Some(feature) = node.feature {
                    if feature >= self.n_features {
                        return Err(InferenceError::Format(format!(
                            "tree {} node {} splits on feature {} of {}",
                            t, n, feature, self.n_features
                        )));
                    }
                    if node.left >= tree.nodes.len() || node.right >= tree.nodes.len() {
                        return Err(InferenceError::Format(format!(
                            "tree {} node {} has a child out of range",
                            t, n
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Aggregated raw output before the link function
    pub fn raw_output(&self, x: ArrayView1<f64>) -> Result<Vec<f64>, InferenceError> {
        let weight = self.tree_weight();
        let mut raw = self.base();
        for tree in &self.trees {
            let leaf = tree.leaf_value(x)?;
            for (acc, v) in raw.iter_mut().zip(leaf) {
                *acc += weight * v;
            }
        }
        Ok(raw)
    }

    pub fn predict_proba_row(&self, x: ArrayView1<f64>, n_classes: usize) -> Result<Vec<f64>, InferenceError> {
        let raw = self.raw_output(x)?;
        let proba = match (raw.len(), self.link) {
            (1, Link::Logit) => {
                let p = sigmoid(raw[0]);
                vec![1.0 - p, p]
            }
            (1, Link::Identity) => {
                let p = raw[0].clamp(0.0, 1.0);
                vec![1.0 - p, p]
            }
            (_, Link::Logit) => softmax(&raw),
            (_, Link::Identity) => raw,
        };
        if proba.len() != n_classes {
            return Err(InferenceError::Shape(format!(
                "ensemble produced {} class scores for {} classes",
                proba.len(),
                n_classes
            )));
        }
        Ok(proba)
    }
}
