//! Inference Engine - Model loading, caching and scoring
//!
//! The fitted model is loaded once per path and cached for the lifetime of
//! the process. Scoring goes through the [`ScoringModel`] capability trait so
//! the JSON pipeline and the ONNX backend are interchangeable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::pipeline::{Estimator, NamedStep, PipelineModel};
use crate::logic::features::{LayoutInfo, OrderedRecord};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read model {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model file: {0}")]
    Format(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Model returned invalid probability {0} (expected a value in [0, 1])")]
    InvalidProbability(f64),

    #[error("Unsupported model: {0}")]
    Unsupported(String),

    #[error("Inference failed: {0}")]
    Runtime(String),
}

// ============================================================================
// SCORING CAPABILITY
// ============================================================================

/// Fitted classifier collaborator
pub trait ScoringModel: Send + Sync {
    fn name(&self) -> &str;

    /// Class labels in probability-column order
    fn classes(&self) -> &[i64];

    /// Per-class probabilities, one row per record
    fn predict_proba(&self, rows: &[OrderedRecord]) -> Result<Array2<f64>, InferenceError>;

    fn stage_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// First stage whose name starts with `prefix`
    fn named_stage(&self, _prefix: &str) -> Option<&NamedStep> {
        None
    }

    /// Final estimator stage, if the model exposes its internals
    fn estimator(&self) -> Option<Estimator<'_>> {
        None
    }
}

/// Probability of the positive class (column 1) for one record
pub fn positive_probability(model: &dyn ScoringModel, record: &OrderedRecord) -> Result<f64, InferenceError> {
    let proba = model.predict_proba(std::slice::from_ref(record))?;

    if proba.nrows() != 1 || proba.ncols() < 2 {
        return Err(InferenceError::Shape(format!(
            "expected 1 x >=2 probabilities, got {} x {}",
            proba.nrows(),
            proba.ncols()
        )));
    }

    let p = proba[[0, 1]];
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(InferenceError::InvalidProbability(p));
    }
    Ok(p)
}

// ============================================================================
// METADATA
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_path: String,
    pub name: String,
    pub format: String,          // "json_pipeline" or "onnx"
    pub sha256: String,
    pub classes: Vec<i64>,
    pub stages: Vec<String>,
    pub layout: LayoutInfo,
    pub loaded_at: chrono::DateTime<chrono::Utc>,
}

/// A loaded model plus its metadata; shared across requests
pub struct LoadedModel {
    pub model: Arc<dyn ScoringModel>,
    pub metadata: ModelMetadata,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl LoadedModel {
    /// Wrap a model that did not come from disk
    pub fn in_memory(model: Arc<dyn ScoringModel>) -> Self {
        let metadata = ModelMetadata {
            model_path: format!("memory:{}", model.name()),
            name: model.name().to_string(),
            format: "in_memory".to_string(),
            sha256: fingerprint(uuid::Uuid::new_v4().as_bytes()),
            classes: model.classes().to_vec(),
            stages: model.stage_names(),
            layout: LayoutInfo::current(),
            loaded_at: chrono::Utc::now(),
        };
        Self { model, metadata }
    }
}

// ============================================================================
// STATE
// ============================================================================

/// Process-wide model cache keyed by path; entries are never evicted
static MODEL_CACHE: Lazy<RwLock<HashMap<PathBuf, Arc<LoadedModel>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

// ============================================================================
// MODEL LOADING
// ============================================================================

/// SHA-256 hex of the model bytes
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Load a model from disk without touching the cache
pub fn load_model(path: &Path) -> Result<LoadedModel, InferenceError> {
    log::info!("Loading model from: {}", path.display());

    if !path.exists() {
        return Err(InferenceError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| InferenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    let (model, format): (Arc<dyn ScoringModel>, &str) = if is_onnx {
        (load_onnx(&bytes)?, "onnx")
    } else {
        let text = String::from_utf8(bytes.clone())
            .map_err(|e| InferenceError::Format(format!("model file is not UTF-8: {}", e)))?;
        (Arc::new(PipelineModel::from_json(&text)?), "json_pipeline")
    };

    let metadata = ModelMetadata {
        model_path: path.display().to_string(),
        name: model.name().to_string(),
        format: format.to_string(),
        sha256: fingerprint(&bytes),
        classes: model.classes().to_vec(),
        stages: model.stage_names(),
        layout: LayoutInfo::current(),
        loaded_at: chrono::Utc::now(),
    };

    log::info!(
        "Model '{}' loaded ({}, sha256 {})",
        metadata.name,
        metadata.format,
        &metadata.sha256[..12]
    );

    Ok(LoadedModel { model, metadata })
}

#[cfg(feature = "onnx")]
fn load_onnx(bytes: &[u8]) -> Result<Arc<dyn ScoringModel>, InferenceError> {
    Ok(Arc::new(super::onnx::OnnxModel::from_bytes(bytes)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_bytes: &[u8]) -> Result<Arc<dyn ScoringModel>, InferenceError> {
    Err(InferenceError::Unsupported(
        "ONNX model given but this build lacks the `onnx` feature".to_string(),
    ))
}

/// Cached model for `path`, loading it on first access
pub fn get_or_load(path: impl AsRef<Path>) -> Result<Arc<LoadedModel>, InferenceError> {
    let path = path.as_ref();

    if let Some(hit) = MODEL_CACHE.read().get(path) {
        log::debug!("Model cache hit: {}", path.display());
        return Ok(Arc::clone(hit));
    }

    let mut cache = MODEL_CACHE.write();
    // another caller may have loaded it between the locks
    if let Some(hit) = cache.get(path) {
        return Ok(Arc::clone(hit));
    }

    let loaded = Arc::new(load_model(path)?);
    cache.insert(path.to_path_buf(), Arc::clone(&loaded));
    Ok(loaded)
}

/// Whether a model for `path` is already cached
pub fn is_model_loaded(path: impl AsRef<Path>) -> bool {
    MODEL_CACHE.read().contains_key(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::{assemble, guard, FormInput};
    use ndarray::array;
    use std::io::Write;

    struct FixedModel(Array2<f64>);

    impl ScoringModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }
        fn predict_proba(&self, _rows: &[OrderedRecord]) -> Result<Array2<f64>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    fn row() -> OrderedRecord {
        guard(&assemble(&FormInput::default())).unwrap()
    }

    const TINY_MODEL: &str = r#"{
        "name": "tiny",
        "steps": [
            {"name": "preprocess", "stage": {"type": "column_transformer",
                "numeric": [{"column": "AGE_IM"}]}},
            {"name": "model", "stage": {"type": "logistic_regression",
                "coefficients": [0.0], "intercept": 0.0}}
        ]
    }"#;

    #[test]
    fn test_positive_probability_reads_column_one() {
        let model = FixedModel(array![[0.7, 0.3]]);
        assert_eq!(positive_probability(&model, &row()).unwrap(), 0.3);
    }

    #[test]
    fn test_out_of_range_probability_is_fatal() {
        let model = FixedModel(array![[-0.2, 1.2]]);
        assert!(matches!(
            positive_probability(&model, &row()),
            Err(InferenceError::InvalidProbability(_))
        ));
        let nan = FixedModel(array![[0.5, f64::NAN]]);
        assert!(positive_probability(&nan, &row()).is_err());
    }

    #[test]
    fn test_single_column_output_rejected() {
        let model = FixedModel(array![[1.0]]);
        assert!(matches!(
            positive_probability(&model, &row()),
            Err(InferenceError::Shape(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let path = PathBuf::from("/definitely/not/here/model.json");
        let err = load_model(&path).unwrap_err();
        assert_eq!(err.to_string(), "Model file not found: /definitely/not/here/model.json");
    }

    #[test]
    fn test_load_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(TINY_MODEL.as_bytes())
            .unwrap();

        assert!(!is_model_loaded(&path));
        let first = get_or_load(&path).unwrap();
        let second = get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(is_model_loaded(&path));

        assert_eq!(first.metadata.name, "tiny");
        assert_eq!(first.metadata.format, "json_pipeline");
        assert_eq!(first.metadata.sha256, fingerprint(TINY_MODEL.as_bytes()));
        assert_eq!(first.metadata.stages, vec!["preprocess", "model"]);
        assert_eq!(positive_probability(first.model.as_ref(), &row()).unwrap(), 0.5);
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_onnx_requires_feature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"not really onnx").unwrap();
        assert!(matches!(load_model(&path), Err(InferenceError::Unsupported(_))));
    }
}
