//! Runtime switches
//!
//! Process-wide toggles read on every prediction.

use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;

use crate::constants;

// Kill-switch for the explanation engine, seeded from CRASH_RISK_EXPLAIN
static EXPLAIN_ENABLED: Lazy<AtomicBool> =
    Lazy::new(|| AtomicBool::new(constants::is_explain_enabled()));

pub struct ExplainSwitch;

impl ExplainSwitch {
    pub fn is_enabled() -> bool {
        EXPLAIN_ENABLED.load(Ordering::Relaxed)
    }

    pub fn set(val: bool) {
        EXPLAIN_ENABLED.store(val, Ordering::Relaxed);
        log::info!("Local explanations {}", if val { "enabled" } else { "disabled" });
    }
}
