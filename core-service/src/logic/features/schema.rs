//! Schema Guard
//!
//! Checks an assembled record against `EXPECTED_COLUMNS` (no missing, no
//! extra) and reorders it into the layout order. An `OrderedRecord` can only
//! be obtained through [`guard`].

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

use super::layout::{layout_hash, COLUMN_COUNT, EXPECTED_COLUMNS, LAYOUT_VERSION};
use super::record::CrashRecord;

/// Column set mismatch; both lists are reported verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Column mismatch. Missing={missing:?} Extra={extra:?}")]
pub struct SchemaError {
    /// Expected columns absent from the record, in layout order
    pub missing: Vec<String>,
    /// Record columns not in the layout, in record order
    pub extra: Vec<String>,
}

/// Record validated and ordered for the scoring model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedRecord {
    values: [i64; COLUMN_COUNT],
}

impl OrderedRecord {
    /// Values in `EXPECTED_COLUMNS` order
    pub fn values(&self) -> &[i64; COLUMN_COUNT] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<i64> {
        super::layout::column_index(column).map(|i| self.values[i])
    }

    /// (column, value) pairs in layout order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> + '_ {
        EXPECTED_COLUMNS.iter().copied().zip(self.values.iter().copied())
    }

    pub fn layout_version(&self) -> u8 {
        LAYOUT_VERSION
    }

    pub fn layout_hash(&self) -> u32 {
        layout_hash()
    }
}

impl Serialize for OrderedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMN_COUNT))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, &value)?;
        }
        map.end()
    }
}

/// Compute (missing, extra) against the expected layout
pub fn diff_columns(record: &CrashRecord) -> (Vec<String>, Vec<String>) {
    let missing = EXPECTED_COLUMNS
        .iter()
        .filter(|c| !record.contains(c))
        .map(|c| c.to_string())
        .collect();

    let extra = record
        .column_names()
        .filter(|c| !EXPECTED_COLUMNS.contains(c))
        .map(|c| c.to_string())
        .collect();

    (missing, extra)
}

/// Validate the column set and reorder into layout order
pub fn guard(record: &CrashRecord) -> Result<OrderedRecord, SchemaError> {
    let (missing, extra) = diff_columns(record);
    if !missing.is_empty() || !extra.is_empty() {
        log::warn!("Schema guard rejected record: missing={:?} extra={:?}", missing, extra);
        return Err(SchemaError { missing, extra });
    }

    let mut values = [0i64; COLUMN_COUNT];
    for (slot, column) in values.iter_mut().zip(EXPECTED_COLUMNS) {
        // presence checked above
        *slot = record.get(column).ok_or_else(|| SchemaError {
            missing: vec![column.to_string()],
            extra: Vec::new(),
        })?;
    }

    Ok(OrderedRecord { values })
}

#[cfg(test)]
impl OrderedRecord {
    /// Build directly from layout-ordered values (tests only)
    pub(crate) fn from_values(values: [i64; COLUMN_COUNT]) -> Self {
        Self { values }
    }
}
