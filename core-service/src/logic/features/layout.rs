//! Column Layout - Centralized Record Definition
//!
//! **CRITICAL: This file controls the scoring schema**
//!
//! The fitted pipeline consumes columns by position once inside its numeric
//! stages, so the order below is part of the model contract.
//!
//! ## Rules (NEVER break these):
//! 1. Add column → increment LAYOUT_VERSION
//! 2. Change order → increment LAYOUT_VERSION
//! 3. Remove column → increment LAYOUT_VERSION

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// LAYOUT VERSION
// ============================================================================

/// Current column layout version
pub const LAYOUT_VERSION: u8 = 1;

// ============================================================================
// EXPECTED COLUMNS (Authoritative source)
// ============================================================================

/// Column names in the exact order handed to the scoring model
pub const EXPECTED_COLUMNS: [&str; COLUMN_COUNT] = [
    "AGE_IM",     // 0: driver age, 0-120
    "SEX_IM",     // 1
    "ALCOHOL",    // 2
    "DRUGS",      // 3
    "HOUR_acc",   // 4: crash hour, 0-23
    "MONTH_acc",  // 5: month, 1-12
    "NUMOCCS",    // 6: occupants, 0-20
    "DAY_WEEK",   // 7
    "LGTCON_IM",  // 8
    "WEATHR_IM",  // 9
    "REGION",     // 10
    "REL_ROAD",   // 11
    "RELJCT2_IM", // 12
    "BODY_TYP",   // 13: vehicle body type, 0-999
    "REST_USE",   // 14
    "SPEEDREL",   // 15
];

/// Total number of columns
pub const COLUMN_COUNT: usize = 16;

/// Inclusive bounds of the numeric (non-dictionary) columns
pub const NUMERIC_BOUNDS: [(&str, i64, i64); 5] = [
    ("AGE_IM", 0, 120),
    ("HOUR_acc", 0, 23),
    ("MONTH_acc", 1, 12),
    ("NUMOCCS", 0, 20),
    ("BODY_TYP", 0, 999),
];

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 of version + ordered column names
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[LAYOUT_VERSION]);

    for name in EXPECTED_COLUMNS {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

/// Layout description for model metadata and logs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub columns: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: LAYOUT_VERSION,
            hash: layout_hash(),
            columns: EXPECTED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ============================================================================
// COLUMN LOOKUP
// ============================================================================

/// Position of a column in the expected order
pub fn column_index(name: &str) -> Option<usize> {
    EXPECTED_COLUMNS.iter().position(|&n| n == name)
}

pub fn column_name(index: usize) -> Option<&'static str> {
    EXPECTED_COLUMNS.get(index).copied()
}

/// Inclusive bounds for a numeric column
pub fn numeric_bounds(name: &str) -> Option<(i64, i64)> {
    NUMERIC_BOUNDS
        .iter()
        .find(|(column, _, _)| *column == name)
        .map(|(_, lo, hi)| (*lo, *hi))
}
