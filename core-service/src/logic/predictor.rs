//! Predictor - one form submission to one verdict
//!
//! validate -> assemble -> guard -> confidence -> score -> decide -> explain.
//! Invalid input and schema failures stop before the model is touched;
//! explanation failures only degrade the report.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::constants;
use crate::logic::codes::{table_for, tables};
use crate::logic::confidence::{self, ConfidenceAssessment};
use crate::logic::explain::{self, Explanation};
use crate::logic::features::{assemble, guard, CrashRecord, FormInput, InputError, OrderedRecord, SchemaError};
use crate::logic::model::{
    get_or_load, positive_probability, Decision, DecisionThreshold, InferenceError, LoadedModel,
    ModelMetadata, RiskLabel, ThresholdError,
};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Scoring failed: {0}")]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}

/// One audited record value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordField {
    pub column: &'static str,
    pub code: i64,
    /// Dictionary label; numeric columns have none
    pub label: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model_name: String,
    pub probability: f64,
    pub probability_display: String,
    pub percentage_display: String,
    pub threshold: DecisionThreshold,
    pub label: RiskLabel,
    pub summary: String,
    pub record: OrderedRecord,
    pub fields: Vec<RecordField>,
    pub confidence: ConfidenceAssessment,
    pub explanation: Explanation,
}

impl PredictionReport {
    pub fn decision(&self) -> Decision {
        Decision::new(self.probability, self.threshold)
    }

    pub fn is_high(&self) -> bool {
        self.label == RiskLabel::High
    }
}

/// Record values with their dictionary labels, layout order.
/// BODY_TYP has no dictionary of its own; see `label_body_typ_group`.
pub fn audit_fields(record: &OrderedRecord) -> Vec<RecordField> {
    record
        .iter()
        .map(|(column, code)| RecordField {
            column,
            code,
            label: table_for(column).and_then(|t| t.label(code)),
        })
        .collect()
}

/// Label BODY_TYP with its vehicle group when the group supplied the code
fn label_body_typ_group(fields: &mut [RecordField], group_code: i64) {
    if let Some(field) = fields.iter_mut().find(|f| f.column == "BODY_TYP") {
        field.label = tables::BODY_TYP_GROUP.label(group_code);
    }
}

#[derive(Debug, Clone)]
pub struct Predictor {
    loaded: Arc<LoadedModel>,
    top_n: usize,
}

impl Predictor {
    pub fn new(loaded: Arc<LoadedModel>) -> Self {
        Self {
            loaded,
            top_n: constants::get_top_n(),
        }
    }

    /// Predictor over the cached model at `path`
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        Ok(Self::new(get_or_load(path)?))
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.loaded.metadata
    }

    pub fn predict(&self, input: &FormInput, threshold: DecisionThreshold) -> Result<PredictionReport, PredictError> {
        input.validate()?;
        let mut report = self.predict_record(&assemble(input), threshold)?;
        if input.uses_group_body_typ() {
            label_body_typ_group(&mut report.fields, input.body_typ_group);
        }
        Ok(report)
    }

    pub fn predict_record(
        &self,
        record: &CrashRecord,
        threshold: DecisionThreshold,
    ) -> Result<PredictionReport, PredictError> {
        let ordered = guard(record)?;
        let confidence = confidence::assess(&ordered);

        let probability = self.score(&ordered)?;
        let decision = Decision::new(probability, threshold);
        log::info!(
            "Scored record with '{}': p={} -> {}",
            self.loaded.metadata.name,
            decision.probability_display(),
            decision.label
        );

        let explanation = explain::explain(&self.loaded, &ordered, self.top_n);

        Ok(PredictionReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            model_name: self.loaded.metadata.name.clone(),
            probability,
            probability_display: decision.probability_display(),
            percentage_display: decision.percentage_display(),
            threshold,
            label: decision.label,
            summary: decision.summary(),
            fields: audit_fields(&ordered),
            record: ordered,
            confidence,
            explanation,
        })
    }

    /// Positive-class probability for an already ordered record
    pub fn score(&self, record: &OrderedRecord) -> Result<f64, InferenceError> {
        positive_probability(self.loaded.model.as_ref(), record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::ScoringModel;
    use ndarray::Array2;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns a fixed probability
    struct CountingModel {
        calls: AtomicUsize,
        p: f64,
    }

    impl ScoringModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }
        fn classes(&self) -> &[i64] {
            &[0, 1]
        }
        fn predict_proba(&self, rows: &[OrderedRecord]) -> Result<Array2<f64>, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = Array2::zeros((rows.len(), 2));
            for mut row in out.rows_mut() {
                row[0] = 1.0 - self.p;
                row[1] = self.p;
            }
            Ok(out)
        }
    }

    fn counting(p: f64) -> (Arc<CountingModel>, Predictor) {
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0), p });
        let loaded = LoadedModel::in_memory(model.clone());
        (model, Predictor::new(Arc::new(loaded)).with_top_n(12))
    }

    fn shipped_model_path() -> String {
        format!("{}/../{}", env!("CARGO_MANIFEST_DIR"), constants::DEFAULT_MODEL_PATH)
    }

    #[test]
    fn test_schema_failure_skips_scoring() {
        let (model, predictor) = counting(0.5);
        let mut record = assemble(&FormInput::default());
        record.remove("REGION");
        record.insert("SEAT_POS", 11);

        let err = predictor.predict_record(&record, DecisionThreshold::default()).unwrap_err();
        match err {
            PredictError::Schema(e) => {
                assert_eq!(e.missing, vec!["REGION"]);
                assert_eq!(e.extra, vec!["SEAT_POS"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_opaque_model_reports_unavailable_explanation() {
        let (model, predictor) = counting(0.25);
        let report = predictor.predict(&FormInput::default(), DecisionThreshold::default()).unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.label, RiskLabel::High);
        assert_eq!(report.summary, "HIGH risk (p ≥ 0.25)");
        assert!(!report.explanation.is_available());
    }

    #[test]
    fn test_invalid_probability_is_fatal() {
        let (_, predictor) = counting(1.5);
        let err = predictor.predict(&FormInput::default(), DecisionThreshold::default()).unwrap_err();
        assert!(matches!(err, PredictError::Inference(InferenceError::InvalidProbability(_))));
    }

    #[test]
    fn test_audit_fields_carry_labels() {
        let record = guard(&assemble(&FormInput::default())).unwrap();
        let fields = audit_fields(&record);
        assert_eq!(fields.len(), 16);
        assert_eq!(fields[0].column, "AGE_IM");
        assert_eq!(fields[0].label, None);
        let alcohol = fields.iter().find(|f| f.column == "ALCOHOL").unwrap();
        assert_eq!(alcohol.code, 2);
        assert_eq!(alcohol.label, Some("No alcohol involved"));
    }

    #[test]
    fn test_invalid_input_skips_scoring() {
        let (model, predictor) = counting(0.5);
        let input = FormInput {
            sex_im: 42,
            body_typ_group: 5000,
            ..FormInput::default()
        };

        let err = predictor.predict(&input, DecisionThreshold::default()).unwrap_err();
        match err {
            PredictError::Input(e) => assert_eq!(e.field_names(), vec!["SEX_IM", "body_typ_group"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_body_typ_label_follows_its_source() {
        let (_, predictor) = counting(0.1);
        let body_typ = |report: &PredictionReport| {
            report.fields.iter().find(|f| f.column == "BODY_TYP").cloned().unwrap()
        };

        let grouped = predictor.predict(&FormInput::default(), DecisionThreshold::default()).unwrap();
        assert_eq!(body_typ(&grouped).label, Some("Passenger Cars (01–11, 17)"));

        // exact code 1 happens to equal a group code; it must stay unlabelled
        let exact = FormInput {
            body_typ_group: 80,
            use_exact_body_typ: true,
            exact_body_typ: Some(1),
            ..FormInput::default()
        };
        let report = predictor.predict(&exact, DecisionThreshold::default()).unwrap();
        assert_eq!(body_typ(&report).code, 1);
        assert_eq!(body_typ(&report).label, None);
    }

    #[test]
    fn test_shipped_model_default_scenario() {
        let predictor = Predictor::from_path(shipped_model_path()).unwrap().with_top_n(12);
        let report = predictor
            .predict(&FormInput::default(), DecisionThreshold::new(0.25).unwrap())
            .unwrap();

        assert!((0.0..=1.0).contains(&report.probability));
        let expected = if report.probability >= 0.25 { RiskLabel::High } else { RiskLabel::Low };
        assert_eq!(report.label, expected);
        assert!(!report.confidence.low_confidence);

        let Explanation::Available { strategy, contributions } = &report.explanation else {
            panic!("shipped model should be explainable");
        };
        assert_eq!(strategy, "explainer_call");
        assert!(!contributions.is_empty() && contributions.len() <= 12);
        for pair in contributions.windows(2) {
            assert!(pair[0].contribution.abs() >= pair[1].contribution.abs());
        }
    }

    #[test]
    fn test_repeat_prediction_is_identical() {
        let predictor = Predictor::from_path(shipped_model_path()).unwrap();
        let input = FormInput::default();
        let t = DecisionThreshold::new(0.4).unwrap();

        let a = predictor.predict(&input, t).unwrap();
        let b = predictor.predict(&input, t).unwrap();
        assert_eq!(a.probability, b.probability);
        assert_eq!(a.label, b.label);
        assert_eq!(a.explanation, b.explanation);
        assert_ne!(a.id, b.id);
    }
}
