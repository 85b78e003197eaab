//! Features Module - Crash Record Assembly & Schema
//!
//! - `layout` - the authoritative column order
//! - `record` - form input and record assembly
//! - `schema` - column-set guard and reordering

pub mod layout;
pub mod record;
pub mod schema;


pub use layout::{column_index, layout_hash, numeric_bounds, LayoutInfo, COLUMN_COUNT, EXPECTED_COLUMNS, LAYOUT_VERSION};
pub use record::{assemble, resolve_body_typ, CrashRecord, FormInput, InputError, InvalidField};
pub use schema::{guard, OrderedRecord, SchemaError};
