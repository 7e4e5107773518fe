//! The Tracking Area Update procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/tau_fr_analyzer.py`.

use crate::config::Thresholds;
use crate::counter::{publish_increment, CounterSink, KpiProcedure};
use crate::dispatcher::ProcedureAnalyzer;
use crate::emm::{self, EmmMessageType};
use crate::ie_diff::{self, TAU_FINGERPRINT};
use crate::message::{within_window, Field, Message, MessageType, Timestamp};
use crate::retransmit::StrikeCounter;
use crate::rrc;
use crate::timestamp_table::{Procedure, SharedTimestampTable};

const DETACH_SWITCH_OFF_MARKER: &str = "Switch off";
const CONGESTION_T3346_MARKER: &str = "T3346";

fn reattach_reason(payload: &Field) -> (bool, bool) {
    let mut reattach_not_required = false;
    let mut reattach_required = false;
    for field in payload.descendants() {
        let lower = field.showname.to_lowercase();
        if lower.contains("re-attach not required") {
            reattach_not_required = true;
        }
        if lower.contains("re-attach required") {
            reattach_required = true;
        }
    }
    (reattach_not_required, reattach_required)
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    concurrent: u64,
    protocol_error: u64,
    timeout: u64,
    detach: u64,
    emm: u64,
    handover: u64,
}

pub struct TauAnalyzer {
    thresholds: Thresholds,
    pending_tau: bool,
    accepting_tau: bool,
    req_at: Option<Timestamp>,
    accept_at: Option<Timestamp>,
    strike: StrikeCounter,
    prev_request: Option<Field>,
    counters: Counters,
}

impl TauAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        TauAnalyzer {
            thresholds,
            pending_tau: false,
            accepting_tau: false,
            req_at: None,
            accept_at: None,
            strike: StrikeCounter::new(),
            prev_request: None,
            counters: Counters::default(),
        }
    }

    fn full_reset(&mut self, table: &mut SharedTimestampTable) {
        self.pending_tau = false;
        self.accepting_tau = false;
        self.req_at = None;
        self.accept_at = None;
        self.strike.reset();
        self.prev_request = None;
        table.end(Procedure::Tau);
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Tau, kind, field(&mut self.counters), now);
    }

    fn pending_anchor(&self) -> Option<Timestamp> {
        self.req_at.or(self.accept_at)
    }

    fn on_network_detach_request(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if !self.pending_tau {
            return;
        }
        let Some(req_at) = self.req_at else {
            return;
        };
        if !within_window(msg.timestamp, req_at, self.thresholds.threshold_secs) {
            return;
        }
        let (reattach_not_required, reattach_required) = reattach_reason(&msg.payload);
        let cause = emm::cause(&msg.payload);
        if (reattach_not_required && cause != Some(2)) || reattach_required {
            self.publish(sink, "DETACH", |c| &mut c.detach, msg.timestamp);
            self.full_reset(table);
        }
    }

    fn on_tau_accept(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        if self.accepting_tau
            && let Some(accept_at) = self.accept_at
        {
            let timed_out = self.strike.record_retransmit(
                now,
                accept_at,
                self.thresholds.threshold_secs,
                self.thresholds.strike_count,
            );
            if timed_out {
                self.publish(sink, "TIMEOUT", |c| &mut c.timeout, now);
                self.full_reset(table);
            }
        }
        if !self.pending_tau && !self.accepting_tau {
            table.start(Procedure::Tau, now);
        }
        self.accepting_tau = true;
        self.accept_at = Some(now);
        self.prev_request = Some(msg.payload.clone());
        self.pending_tau = false;
        self.req_at = None;
    }

    fn on_tau_reject(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        for cause in emm::causes(&msg.payload) {
            if emm::is_protocol_error_cause(cause) {
                self.publish(sink, "PROTOCOL_ERROR", |c| &mut c.protocol_error, now);
            } else if cause == emm::CAUSE_CONGESTION {
                if msg.payload.any_showname_contains(CONGESTION_T3346_MARKER) {
                    self.publish(sink, "EMM", |c| &mut c.emm, now);
                }
            } else {
                self.publish(sink, "EMM", |c| &mut c.emm, now);
            }
        }
        self.full_reset(table);
    }

    fn handle_incoming(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::DetachRequest => self.on_network_detach_request(msg, table, sink),
            EmmMessageType::TauAccept => self.on_tau_accept(msg, table, sink),
            EmmMessageType::TauReject => self.on_tau_reject(msg, table, sink),
            _ => {}
        }
    }

    fn on_outgoing_detach_request(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if self.pending_tau && msg.payload.any_showname_contains(DETACH_SWITCH_OFF_MARKER) {
            self.publish(sink, "DETACH", |c| &mut c.detach, msg.timestamp);
            self.full_reset(table);
        }
    }

    fn on_tau_request(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        if (self.pending_tau || self.accepting_tau)
            && let Some(anchor) = self.pending_anchor()
            && within_window(now, anchor, self.thresholds.threshold_secs)
            && let Some(prev) = &self.prev_request
            && ie_diff::fingerprints_differ(TAU_FINGERPRINT, prev, &msg.payload)
        {
            self.publish(sink, "CONCURRENT", |c| &mut c.concurrent, now);
            self.full_reset(table);
        }

        if self.pending_tau
            && let Some(req_at) = self.req_at
        {
            let timed_out = self.strike.record_retransmit(
                now,
                req_at,
                self.thresholds.threshold_secs,
                self.thresholds.strike_count,
            );
            if timed_out {
                self.publish(sink, "TIMEOUT", |c| &mut c.timeout, now);
                self.full_reset(table);
            }
        }

        if !self.pending_tau && !self.accepting_tau {
            table.start(Procedure::Tau, now);
        }
        self.pending_tau = true;
        self.req_at = Some(now);
        self.prev_request = Some(msg.payload.clone());
    }

    fn handle_outgoing(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::DetachRequest => self.on_outgoing_detach_request(msg, table, sink),
            EmmMessageType::TauRequest => self.on_tau_request(msg, table, sink),
            EmmMessageType::TauComplete => {
                if let Some(accept_at) = self.accept_at
                    && within_window(msg.timestamp, accept_at, self.thresholds.threshold_secs)
                {
                    self.full_reset(table);
                }
            }
            _ => {}
        }
    }

    fn handle_rrc(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if rrc::reports_handover_failure(&msg.payload)
            && table.is_handover_target(Procedure::Tau, msg.timestamp, self.thresholds.handover_window_secs)
        {
            self.publish(sink, "HANDOVER", |c| &mut c.handover, msg.timestamp);
            self.full_reset(table);
        }
    }
}

impl ProcedureAnalyzer for TauAnalyzer {
    fn name(&self) -> &'static str {
        "tau"
    }

    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, table, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, table, sink),
            MessageType::RrcOta => self.handle_rrc(msg, table, sink),
        }
    }
}
