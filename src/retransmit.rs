//! The retransmit-based timeout rule shared by all seven analyzers.
//!
//! Grounded on the `self.timeouts` increment/reset/strike-5 block repeated
//! almost verbatim at the top of every `*_analyzer.py`'s incoming-message
//! handler; factored here into one reusable counter so each analyzer only
//! supplies its own window and strike threshold.

use crate::message::{seconds_between, Timestamp};

/// Tracks successive in-window re-emissions of a procedure-start event.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrikeCounter {
    strikes: u32,
}

impl StrikeCounter {
    pub fn new() -> Self {
        StrikeCounter { strikes: 0 }
    }

    pub fn reset(&mut self) {
        self.strikes = 0;
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    /// Record a re-emission observed `now`, given the previous request was
    /// sent at `previous_sent_at`, under a window of `window_secs`. Returns
    /// `true` once the strike count reaches `threshold`; the caller is
    /// responsible for emitting the timeout failure and resetting all other
    /// analyzer state when this returns `true` — this type only owns the
    /// counter itself.
    pub fn record_retransmit(
        &mut self,
        now: Timestamp,
        previous_sent_at: Timestamp,
        window_secs: f64,
        threshold: u32,
    ) -> bool {
        let delta = seconds_between(now, previous_sent_at);
        if (0.0..=window_secs).contains(&delta) {
            self.strikes += 1;
        } else {
            self.strikes = 0;
        }
        self.strikes >= threshold
    }
}

/// The default strike count: five accumulated in-window retransmits
/// constitute a timeout.
pub const DEFAULT_STRIKE_THRESHOLD: u32 = 5;
