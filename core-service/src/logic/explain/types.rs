use serde::{Deserialize, Serialize};

use crate::logic::codes::table_for;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Encoded feature name, e.g. `cat__WEATHR_IM_2`
    pub feature: String,
    /// Signed impact on the model output (positive raises risk)
    pub contribution: f64,
    pub description: Option<String>,
}

impl FeatureContribution {
    pub fn new(feature: impl Into<String>, contribution: f64) -> Self {
        let feature = feature.into();
        let description = describe_feature(&feature);
        Self { feature, contribution, description }
    }

    pub fn increases_risk(&self) -> bool {
        self.contribution > 0.0
    }
}

/// Local explanation for one scored record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Explanation {
    Available {
        strategy: String,
        contributions: Vec<FeatureContribution>,
    },
    Unavailable {
        reason: String,
    },
}

impl Explanation {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Explanation::Unavailable { reason: reason.into() }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Explanation::Available { .. })
    }

    pub fn contributions(&self) -> &[FeatureContribution] {
        match self {
            Explanation::Available { contributions, .. } => contributions,
            Explanation::Unavailable { .. } => &[],
        }
    }
}

/// Readable form of an encoded feature name
///
/// `num__AGE_IM` -> `AGE_IM`, `cat__WEATHR_IM_2` -> `WEATHR_IM = Rain`
pub fn describe_feature(feature: &str) -> Option<String> {
    if let Some(column) = feature.strip_prefix("num__") {
        return Some(column.to_string());
    }

    let encoded = feature.strip_prefix("cat__")?;
    let (column, code) = encoded.rsplit_once('_')?;
    let code: i64 = code.parse().ok()?;
    let label = table_for(column)
        .and_then(|t| t.label(code))
        .map(str::to_string)
        .unwrap_or_else(|| code.to_string());
    Some(format!("{} = {}", column, label))
}
