//! HTTP handlers

pub mod catalog;
pub mod decide;
pub mod health;
pub mod predict;
