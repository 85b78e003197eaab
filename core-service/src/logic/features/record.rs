//! Crash Record - Form input and record assembly
//!
//! `FormInput` holds one value per logical control. `assemble` turns it into
//! an unordered `CrashRecord`; ordering and validation belong to the schema guard.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::codes::{table_for, tables};
use crate::logic::features::layout::numeric_bounds;

// ============================================================================
// FORM INPUT
// ============================================================================

/// Current state of the input form (codes already resolved from labels)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormInput {
    #[serde(rename = "AGE_IM")]
    pub age_im: i64,
    #[serde(rename = "SEX_IM")]
    pub sex_im: i64,
    #[serde(rename = "ALCOHOL")]
    pub alcohol: i64,
    #[serde(rename = "DRUGS")]
    pub drugs: i64,
    #[serde(rename = "HOUR_acc")]
    pub hour_acc: i64,
    #[serde(rename = "MONTH_acc")]
    pub month_acc: i64,
    #[serde(rename = "NUMOCCS")]
    pub numoccs: i64,
    #[serde(rename = "DAY_WEEK")]
    pub day_week: i64,
    #[serde(rename = "LGTCON_IM")]
    pub lgtcon_im: i64,
    #[serde(rename = "WEATHR_IM")]
    pub weathr_im: i64,
    #[serde(rename = "REGION")]
    pub region: i64,
    #[serde(rename = "REL_ROAD")]
    pub rel_road: i64,
    #[serde(rename = "RELJCT2_IM")]
    pub reljct2_im: i64,
    #[serde(rename = "REST_USE")]
    pub rest_use: i64,
    #[serde(rename = "SPEEDREL")]
    pub speedrel: i64,
    /// Representative BODY_TYP of the selected vehicle group
    pub body_typ_group: i64,
    /// Use `exact_body_typ` instead of the group code
    pub use_exact_body_typ: bool,
    /// Exact BODY_TYP override; defaults to the group code when absent
    pub exact_body_typ: Option<i64>,
}

impl Default for FormInput {
    fn default() -> Self {
        Self {
            age_im: 30,
            sex_im: tables::SEX_IM.default_code,
            alcohol: tables::ALCOHOL.default_code,
            drugs: tables::DRUGS.default_code,
            hour_acc: 12,
            month_acc: 6,
            numoccs: 1,
            day_week: tables::DAY_WEEK.default_code,
            lgtcon_im: tables::LGTCON_IM.default_code,
            weathr_im: tables::WEATHR_IM.default_code,
            region: tables::REGION.default_code,
            rel_road: tables::REL_ROAD.default_code,
            reljct2_im: tables::RELJCT2_IM.default_code,
            rest_use: tables::REST_USE.default_code,
            speedrel: tables::SPEEDREL.default_code,
            body_typ_group: tables::BODY_TYP_GROUP.default_code,
            use_exact_body_typ: false,
            exact_body_typ: None,
        }
    }
}

impl FormInput {
    /// BODY_TYP after applying the exact-code override policy
    pub fn body_typ(&self) -> i64 {
        resolve_body_typ(self.body_typ_group, self.use_exact_body_typ, self.exact_body_typ)
    }

    /// True when BODY_TYP comes from the vehicle group, not an exact code
    pub fn uses_group_body_typ(&self) -> bool {
        !(self.use_exact_body_typ && self.exact_body_typ.is_some())
    }

    /// Reject codes outside their dictionary and numbers outside their range.
    /// Every offending field is reported, not just the first.
    pub fn validate(&self) -> Result<(), InputError> {
        let mut fields = Vec::new();

        let numeric = [
            ("AGE_IM", self.age_im),
            ("HOUR_acc", self.hour_acc),
            ("MONTH_acc", self.month_acc),
            ("NUMOCCS", self.numoccs),
        ];
        for (column, value) in numeric {
            check_range(&mut fields, column, column, value);
        }

        let categorical = [
            ("SEX_IM", self.sex_im),
            ("ALCOHOL", self.alcohol),
            ("DRUGS", self.drugs),
            ("DAY_WEEK", self.day_week),
            ("LGTCON_IM", self.lgtcon_im),
            ("WEATHR_IM", self.weathr_im),
            ("REGION", self.region),
            ("REL_ROAD", self.rel_road),
            ("RELJCT2_IM", self.reljct2_im),
            ("REST_USE", self.rest_use),
            ("SPEEDREL", self.speedrel),
            ("body_typ_group", self.body_typ_group),
        ];
        for (column, value) in categorical {
            if let Some(table) = table_for(column) {
                if !table.contains(value) {
                    fields.push(InvalidField::new(column, value, "not in the code dictionary"));
                }
            }
        }

        if let Some(exact) = self.exact_body_typ {
            check_range(&mut fields, "exact_body_typ", "BODY_TYP", exact);
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(InputError { fields })
        }
    }
}

fn check_range(fields: &mut Vec<InvalidField>, field: &'static str, column: &str, value: i64) {
    if let Some((lo, hi)) = numeric_bounds(column) {
        if !(lo..=hi).contains(&value) {
            fields.push(InvalidField::new(field, value, format!("outside [{}, {}]", lo, hi)));
        }
    }
}

/// Exact override wins only when the flag is set
pub fn resolve_body_typ(group_code: i64, use_exact: bool, exact: Option<i64>) -> i64 {
    if use_exact {
        exact.unwrap_or(group_code)
    } else {
        group_code
    }
}

// ============================================================================
// INPUT VALIDATION
// ============================================================================

/// One rejected form value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidField {
    pub field: &'static str,
    pub value: i64,
    pub reason: String,
}

impl InvalidField {
    fn new(field: &'static str, value: i64, reason: impl Into<String>) -> Self {
        Self {
            field,
            value,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for InvalidField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} {}", self.field, self.value, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid input ({})", join_fields(.fields))]
pub struct InputError {
    pub fields: Vec<InvalidField>,
}

impl InputError {
    /// Names of the rejected fields, form order
    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.field).collect()
    }
}

fn join_fields(fields: &[InvalidField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// CRASH RECORD
// ============================================================================

/// Single-row record; keeps columns in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    columns: Vec<(String, i64)>,
}

impl CrashRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column; an existing column keeps its position
    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<i64> {
        let idx = self.columns.iter().position(|(n, _)| n == name)?;
        Some(self.columns.remove(idx).1)
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, i64)> for CrashRecord {
    fn from_iter<T: IntoIterator<Item = (String, i64)>>(iter: T) -> Self {
        let mut record = CrashRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

// ============================================================================
// ASSEMBLY
// ============================================================================

/// Collect every form value into one record. No validation happens here.
pub fn assemble(input: &FormInput) -> CrashRecord {
    CrashRecord::new()
        .with("AGE_IM", input.age_im)
        .with("SEX_IM", input.sex_im)
        .with("ALCOHOL", input.alcohol)
        .with("DRUGS", input.drugs)
        .with("HOUR_acc", input.hour_acc)
        .with("MONTH_acc", input.month_acc)
        .with("DAY_WEEK", input.day_week)
        .with("LGTCON_IM", input.lgtcon_im)
        .with("WEATHR_IM", input.weathr_im)
        .with("REGION", input.region)
        .with("REL_ROAD", input.rel_road)
        .with("RELJCT2_IM", input.reljct2_im)
        .with("BODY_TYP", input.body_typ())
        .with("REST_USE", input.rest_use)
        .with("SPEEDREL", input.speedrel)
        .with("NUMOCCS", input.numoccs)
}
