//! The counter-publication contract.
//!
//! Grounded on `rayhunter::analysis::analyzer::Analyzer`'s minimal trait
//! surface: the core only depends on a small interface implemented by an
//! external collaborator, never on a concrete sink.

use std::fmt;

use crate::message::Timestamp;
use crate::timestamp_table::Procedure;

/// The seven procedures carrying a `KPI_Retainability_*` counter family.
/// Distinct from [`Procedure`](crate::timestamp_table::Procedure): Attach
/// is not part of the shared handover table but does publish counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KpiProcedure {
    Identify,
    Security,
    Guti,
    Auth,
    Attach,
    Detach,
    Tau,
}

impl fmt::Display for KpiProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KpiProcedure::Identify => "IDENTIFY",
            KpiProcedure::Security => "SECURITY",
            KpiProcedure::Guti => "GUTI",
            KpiProcedure::Auth => "AUTH",
            KpiProcedure::Attach => "ATTACH",
            KpiProcedure::Detach => "DETACH",
            KpiProcedure::Tau => "TAU",
        };
        f.write_str(s)
    }
}

impl From<Procedure> for KpiProcedure {
    fn from(p: Procedure) -> Self {
        match p {
            Procedure::Identification => KpiProcedure::Identify,
            Procedure::Security => KpiProcedure::Security,
            Procedure::Guti => KpiProcedure::Guti,
            Procedure::Authentication => KpiProcedure::Auth,
            Procedure::Detach => KpiProcedure::Detach,
            Procedure::Tau => KpiProcedure::Tau,
        }
    }
}

/// Build a stable KPI name of the form `KPI_Retainability_<PROC>_<KIND>_FAILURE`.
pub fn kpi_name(procedure: KpiProcedure, kind: &str) -> String {
    format!("KPI_Retainability_{procedure}_{kind}_FAILURE")
}

/// The KPI category every counter in this core registers under, fixed to
/// `"Retainability"` following every `*_analyzer.py`'s
/// `self.register_kpi("Retainability", ...)` call.
pub const KPI_CATEGORY: &str = "Retainability";

/// Increment `counter`, publish its new running total under
/// `KPI_Retainability_<procedure>_<kind>_FAILURE`, and return that total.
/// Every procedure analyzer's failure branches funnel through this one
/// function instead of repeating the increment-then-`store_kpi` pair
/// inline at each of the ~30 call sites across the seven analyzers.
pub fn publish_increment(
    sink: &mut dyn CounterSink,
    procedure: KpiProcedure,
    kind: &str,
    counter: &mut u64,
    timestamp: Timestamp,
) -> u64 {
    *counter += 1;
    sink.store_kpi(&kpi_name(procedure, kind), *counter, timestamp);
    *counter
}

/// The external collaborator that receives counter increments. Calls are
/// advisory: an analyzer's own state never depends on what the sink does
/// with a published value — a sink write failure is swallowed.
pub trait CounterSink {
    /// Called once per increment, with the counter's new running total —
    /// not a delta.
    fn store_kpi(&mut self, name: &str, value: u64, timestamp: Timestamp);

    /// Declarative registration, called once per counter at startup. The
    /// default implementation is a no-op: a sink that doesn't care about
    /// advance registration (most test doubles) need not override it.
    fn register_kpi(&mut self, _category: &str, _name: &str) {}
}

/// A sink that discards every call. Useful when a caller only wants the
/// analyzers' internal state (e.g. for assertions) and has no real sink to
/// wire in.
#[derive(Debug, Default)]
pub struct NullSink;

impl CounterSink for NullSink {
    fn store_kpi(&mut self, _name: &str, _value: u64, _timestamp: Timestamp) {}
}

/// A sink that logs every publication at `info` level via the `log` crate.
/// Grounded on `rayhunter`'s convention of leaving all actual I/O sinks
/// (stdout, a file, an HTTP client) to the embedding binary: this is the
/// one sink this core itself is willing to own, since logging has no
/// failure mode that needs handling.
#[derive(Debug, Default)]
pub struct LoggingSink;

impl CounterSink for LoggingSink {
    fn store_kpi(&mut self, name: &str, value: u64, timestamp: Timestamp) {
        log::info!("{name}={value} at {timestamp}");
    }

    fn register_kpi(&mut self, category: &str, name: &str) {
        log::debug!("registered KPI {category}/{name}");
    }
}

/// A sink that records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub published: Vec<(String, u64, Timestamp)>,
    pub registered: Vec<(String, String)>,
}

impl CounterSink for RecordingSink {
    fn store_kpi(&mut self, name: &str, value: u64, timestamp: Timestamp) {
        self.published.push((name.to_string(), value, timestamp));
    }

    fn register_kpi(&mut self, category: &str, name: &str) {
        self.registered.push((category.to_string(), name.to_string()));
    }
}

impl RecordingSink {
    /// The most recent published value for `name`, if any.
    pub fn latest(&self, name: &str) -> Option<u64> {
        self.published
            .iter()
            .rev()
            .find(|(n, _, _)| n == name)
            .map(|(_, v, _)| *v)
    }
}
