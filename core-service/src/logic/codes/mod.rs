//! Codes Module - Code Dictionaries & Field Selection

pub mod selector;
pub mod tables;

pub use selector::{CodeTableView, FieldSelector, SelectOption};
pub use tables::{table_for, CodeTable, ALL_TABLES};

use crate::constants::UNKNOWN_CODES;

/// Whether a value is one of the shared "unknown / not reported" codes
pub fn is_unknown_code(value: i64) -> bool {
    UNKNOWN_CODES.contains(&value)
}
