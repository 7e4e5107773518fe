//! Which analyzers run, and the time-window constants they use.
//!
//! Grounded on `rayhunter::analysis::analyzer::AnalyzerConfig`: a
//! `#[serde(default)]` bool-per-heuristic struct with a `Default` impl
//! enabling everything, consumed by a `Harness::new_with_config`
//! constructor. This crate has no `Harness` of its own (see
//! [`crate::dispatcher::Dispatcher`]) but keeps the same config shape so an
//! embedding CLI can deserialize it from the same kind of TOML/JSON file
//! `rayhunter-daemon` does.

use serde::{Deserialize, Serialize};

/// Selects which of the seven procedure analyzers an embedding program
/// wires into a [`crate::dispatcher::Dispatcher`]. The core itself never
/// reads this struct; it exists so a host can serialize/deserialize one
/// config covering the whole analyzer set, the way
/// `rayhunter::analysis::analyzer::AnalyzerConfig` does for its heuristics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub identification: bool,
    pub security_mode: bool,
    pub guti_reallocation: bool,
    pub authentication: bool,
    pub attach: bool,
    pub detach: bool,
    pub tau: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            identification: true,
            security_mode: true,
            guti_reallocation: true,
            authentication: true,
            attach: true,
            detach: true,
            tau: true,
        }
    }
}

/// The time-window constants, with their defaults, each analyzer correlates
/// messages under. Configuration, not invariants: every analyzer
/// constructor takes a `Thresholds` by value instead of hardcoding these.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    /// `THRESHOLD`: the inter-message correlation window, in seconds.
    pub threshold_secs: f64,
    /// `HANDOVER_WINDOW`: the maximum age of an unfinished procedure still
    /// eligible for handover attribution, in seconds.
    pub handover_window_secs: f64,
    /// `T3450`: the GUTI reallocation retransmit window, in seconds.
    pub t3450_secs: f64,
    /// The number of accumulated in-window retransmits that constitute a
    /// timeout.
    pub strike_count: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            threshold_secs: 60.0,
            handover_window_secs: 600.0,
            t3450_secs: 6.0,
            strike_count: crate::retransmit::DEFAULT_STRIKE_THRESHOLD,
        }
    }
}
