//! Logic Module - Scoring Pipeline & Engines
//!
//! - `codes/` - Code dictionaries and field selection
//! - `features/` - Record assembly, column layout, schema guard
//! - `confidence` - Unknown-code heuristic
//! - `model/` - Model pipeline, inference cache, decision threshold
//! - `explain/` - Local attribution strategies
//! - `predictor` - End-to-end request flow
//! - `config` - Runtime switches

pub mod codes;
pub mod config;
pub mod confidence;
pub mod explain;
pub mod features;
pub mod model;
pub mod predictor;
