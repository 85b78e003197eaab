//! ONNX Backend - classifier exported with a probability tensor output
//!
//! Expects one float input of shape `[N, 16]` in layout order and an output
//! whose name contains "prob" (falls back to the last output) of shape
//! `[N, n_classes]`. Internals are opaque, so no local explanation is offered.

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use super::inference::{InferenceError, ScoringModel};
use crate::logic::features::{OrderedRecord, COLUMN_COUNT};

pub struct OnnxModel {
    session: Mutex<Session>,
    output_name: String,
    classes: Vec<i64>,
}

impl OnnxModel {
    pub fn from_bytes(model_bytes: &[u8]) -> Result<Self, InferenceError> {
        log::info!("Loading ONNX model from memory ({} bytes)", model_bytes.len());

        let session = Session::builder()
            .map_err(|e| InferenceError::Runtime(format!("Session builder error: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Runtime(format!("Optimization error: {}", e)))?
            .commit_from_memory(model_bytes)
            .map_err(|e| InferenceError::Format(format!("Load from memory error: {}", e)))?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.to_ascii_lowercase().contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::Format("No output defined".to_string()))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            classes: vec![0, 1],
        })
    }
}

impl ScoringModel for OnnxModel {
    fn name(&self) -> &str {
        "onnx"
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict_proba(&self, rows: &[OrderedRecord]) -> Result<Array2<f64>, InferenceError> {
        let mut input_data = Vec::with_capacity(rows.len() * COLUMN_COUNT);
        for row in rows {
            input_data.extend(row.values().iter().map(|v| *v as f32));
        }

        let input_array = Array2::<f32>::from_shape_vec((rows.len(), COLUMN_COUNT), input_data)
            .map_err(|e| InferenceError::Shape(format!("Array error: {}", e)))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| InferenceError::Runtime(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Runtime(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(&self.output_name)
            .ok_or_else(|| InferenceError::Runtime("No output".to_string()))?;

        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Runtime(format!("Extract error: {}", e)))?;

        if rows.is_empty() || data.len() % rows.len() != 0 {
            return Err(InferenceError::Shape(format!(
                "{} output values for {} rows",
                data.len(),
                rows.len()
            )));
        }
        let n_classes = data.len() / rows.len();

        Array2::from_shape_vec(
            (rows.len(), n_classes),
            data.iter().map(|v| *v as f64).collect(),
        )
        .map_err(|e| InferenceError::Shape(format!("Output shape error: {}", e)))
    }
}
