//! The dispatcher and analyzer contract.
//!
//! Grounded on `rayhunter::analysis::analyzer::Harness`: a
//! `Vec<Box<dyn Analyzer + Send>>` fanned out to in registration order,
//! with a `register`/`add_analyzer`-style entry point and one dispatch
//! method per message shape. This core has only one message shape, so
//! there is a single `on_message` rather than a
//! `analyze_pcap_packet`/`analyze_qmdl_messages` split.

use crate::counter::CounterSink;
use crate::error::DispatchError;
use crate::message::Message;
use crate::timestamp_table::SharedTimestampTable;

/// One procedure's state machine. Implementations must not block and must
/// be safe against malformed or missing fields: every field
/// lookup in this crate already returns `Option`, so "safe against absence"
/// falls out of simply propagating `None`.
pub trait ProcedureAnalyzer {
    /// A stable, unique name used for duplicate-registration detection and
    /// diagnostics. Not a KPI name.
    fn name(&self) -> &'static str;

    /// Handle one message: update internal state, update this analyzer's
    /// own entry in `table` if (and only if) it owns one, and publish any
    /// counter increments to `sink`. Never returns an error.
    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink);
}

/// Fans a [`Message`] stream out to every registered [`ProcedureAnalyzer`]
/// in registration order, each seeing every message: in-order delivery,
/// at-most-one in-flight message, every analyzer sees every message.
pub struct Dispatcher {
    analyzers: Vec<Box<dyn ProcedureAnalyzer>>,
    table: SharedTimestampTable,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            analyzers: Vec::new(),
            table: SharedTimestampTable::new(),
        }
    }

    /// Add `analyzer` to the enabled list. Fails if an analyzer with the
    /// same [`ProcedureAnalyzer::name`] is already registered — a
    /// programmer error the caller should treat as fatal at startup.
    pub fn register(&mut self, analyzer: Box<dyn ProcedureAnalyzer>) -> Result<(), DispatchError> {
        if self.analyzers.iter().any(|a| a.name() == analyzer.name()) {
            return Err(DispatchError::DuplicateAnalyzer(analyzer.name().to_string()));
        }
        self.analyzers.push(analyzer);
        Ok(())
    }

    /// Deliver `msg` to every registered analyzer, in registration order.
    pub fn on_message(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
        for analyzer in &mut self.analyzers {
            analyzer.handle(msg, &mut self.table, sink);
        }
    }

    /// A snapshot of the current shared timestamp table, mostly useful for
    /// tests and diagnostics — analyzers read it internally via
    /// `handle`'s `table` argument, not through this accessor.
    pub fn timestamp_table(&self) -> &SharedTimestampTable {
        &self.table
    }
}
