//! The shared procedure-timestamp table and handover-failure attribution.
//!
//! The original `mobile_insight` analyzers each keep a private
//! `handover_timestamps` dict and duplicate every other procedure's
//! trigger-decoding logic just to keep it current. This core instead makes
//! the table a first-class component with a single-writer API: each
//! analyzer calls `start`/`end` only for its own [`Procedure`], and reads
//! the rest only through [`SharedTimestampTable::is_handover_target`].

use crate::message::{seconds_between, Timestamp};

/// The six procedures participating in shared handover attribution. Attach
/// is tracked by its own analyzer only and is not part of this table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    Identification,
    Security,
    Guti,
    Authentication,
    Detach,
    Tau,
}

/// Canonical order of the table's entries, seeded from
/// `auth_fr_analyzer.py`'s `handover_timestamps` initialization
/// (`["Identification", "Security", "GUTI", "Authentication", "Detach",
/// "TAU"]`). This order is the tiebreak when two entries share the same
/// maximum timestamp: first-registered wins by iteration order.
const CANONICAL_ORDER: [Procedure; 6] = [
    Procedure::Identification,
    Procedure::Security,
    Procedure::Guti,
    Procedure::Authentication,
    Procedure::Detach,
    Procedure::Tau,
];

/// A mapping from procedure to "timestamp of most recent unfinished start,
/// or ⊥". An entry transitions only ⊥→t (on `start`) or t→⊥ (on `end`),
/// never t→t′ — retransmits update an analyzer's own `request_sent_at` but
/// never rewrite this table.
#[derive(Debug, Clone)]
pub struct SharedTimestampTable {
    entries: [Option<Timestamp>; 6],
}

impl Default for SharedTimestampTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedTimestampTable {
    pub fn new() -> Self {
        SharedTimestampTable { entries: [None; 6] }
    }

    fn index(procedure: Procedure) -> usize {
        CANONICAL_ORDER
            .iter()
            .position(|p| *p == procedure)
            .expect("CANONICAL_ORDER covers every Procedure variant")
    }

    /// Record `procedure` as newly outstanding at `at`. Called once, on the
    /// message that begins the procedure's pending phase — not on every
    /// retransmit.
    pub fn start(&mut self, procedure: Procedure, at: Timestamp) {
        self.entries[Self::index(procedure)] = Some(at);
    }

    /// Clear `procedure`'s entry. Called on success, reject, abort, or any
    /// failure that resets the owning analyzer.
    pub fn end(&mut self, procedure: Procedure) {
        self.entries[Self::index(procedure)] = None;
    }

    pub fn get(&self, procedure: Procedure) -> Option<Timestamp> {
        self.entries[Self::index(procedure)]
    }

    /// Whether an RRC-reported handover failure observed at `now` should be
    /// attributed to `procedure`:
    ///
    /// 1. `procedure`'s entry must be non-⊥.
    /// 2. It must equal the maximum of all entries (ties broken by
    ///    [`CANONICAL_ORDER`]: the first entry to reach the maximum value
    ///    wins, matching `max()` over a dict seeded in that order applied
    ///    to monotonic timestamps where ties are vanishingly rare but
    ///    possible across analyzers sharing a clock tick).
    /// 3. `now` must fall within `window_secs` of that timestamp.
    pub fn is_handover_target(&self, procedure: Procedure, now: Timestamp, window_secs: f64) -> bool {
        let Some(t_me) = self.get(procedure) else {
            return false;
        };

        let mut t_max: Option<Timestamp> = None;
        for p in CANONICAL_ORDER {
            if let Some(t) = self.entries[Self::index(p)] {
                if t_max.is_none_or(|max| t > max) {
                    t_max = Some(t);
                }
            }
        }

        if Some(t_me) != t_max {
            return false;
        }

        let delta = seconds_between(now, t_me);
        (0.0..=window_secs).contains(&delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn fresh_table_has_no_handover_target() {
        let table = SharedTimestampTable::new();
        assert!(!table.is_handover_target(Procedure::Security, ts(100), 600.0));
    }

    #[test]
    fn most_recent_unfinished_procedure_is_attributed() {
        let mut table = SharedTimestampTable::new();
        table.start(Procedure::Identification, ts(0));
        table.start(Procedure::Security, ts(100));
        assert!(table.is_handover_target(Procedure::Security, ts(200), 600.0));
        assert!(!table.is_handover_target(Procedure::Identification, ts(200), 600.0));
    }

    #[test]
    fn outside_window_is_not_attributed() {
        let mut table = SharedTimestampTable::new();
        table.start(Procedure::Tau, ts(0));
        assert!(!table.is_handover_target(Procedure::Tau, ts(700), 600.0));
    }

    #[test]
    fn ended_procedure_is_never_attributed() {
        let mut table = SharedTimestampTable::new();
        table.start(Procedure::Guti, ts(0));
        table.end(Procedure::Guti);
        assert!(!table.is_handover_target(Procedure::Guti, ts(1), 600.0));
    }

    #[test]
    fn tie_is_broken_by_canonical_order() {
        let mut table = SharedTimestampTable::new();
        // Identification precedes Security in CANONICAL_ORDER.
        table.start(Procedure::Identification, ts(100));
        table.start(Procedure::Security, ts(100));
        assert!(table.is_handover_target(Procedure::Identification, ts(100), 600.0));
        assert!(!table.is_handover_target(Procedure::Security, ts(100), 600.0));
    }

    #[test]
    fn start_then_end_then_start_again_is_not_a_direct_t_to_t_transition() {
        let mut table = SharedTimestampTable::new();
        table.start(Procedure::Detach, ts(0));
        table.end(Procedure::Detach);
        assert_eq!(table.get(Procedure::Detach), None);
        table.start(Procedure::Detach, ts(10));
        assert_eq!(table.get(Procedure::Detach), Some(ts(10)));
    }
}
