//! The Identification procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/identification_analyzer.py`.

use crate::config::Thresholds;
use crate::counter::{publish_increment, CounterSink, KpiProcedure};
use crate::dispatcher::ProcedureAnalyzer;
use crate::emm::{self, EmmMessageType};
use crate::ie_diff::{self, ATTACH_FINGERPRINT};
use crate::message::{within_window, Field, Message, MessageType, Timestamp};
use crate::retransmit::StrikeCounter;
use crate::rrc;
use crate::timestamp_table::{Procedure, SharedTimestampTable};

const MOBILE_ID_TYPE_FIELD: &str = "gsm_a.ie.mobileid.type";
const VALID_MOBILE_ID_TYPES: [&str; 3] = ["IMEISV", "TMSI/P-TMSI/M-TMSI", "IMSI"];

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    collision: u64,
    timeout: u64,
    concurrent: u64,
    transmission_tau: u64,
    transmission_service: u64,
    unavailable: u64,
    handover: u64,
}

pub struct IdentificationAnalyzer {
    thresholds: Thresholds,
    pending_id: bool,
    req_at: Option<Timestamp>,
    strike: StrikeCounter,
    pending_attach: bool,
    prev_attach_log: Option<Field>,
    pending_service: bool,
    pending_tau: bool,
    counters: Counters,
}

impl IdentificationAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        IdentificationAnalyzer {
            thresholds,
            pending_id: false,
            req_at: None,
            strike: StrikeCounter::new(),
            pending_attach: false,
            prev_attach_log: None,
            pending_service: false,
            pending_tau: false,
            counters: Counters::default(),
        }
    }

    /// Clears every flag this analyzer owns, including the secondary ones,
    /// and its shared-table entry. Used after any counted failure.
    fn full_reset(&mut self, table: &mut SharedTimestampTable) {
        self.pending_id = false;
        self.req_at = None;
        self.strike.reset();
        self.pending_attach = false;
        self.prev_attach_log = None;
        self.pending_service = false;
        self.pending_tau = false;
        table.end(Procedure::Identification);
    }

    /// Clears only the Identification-specific state, leaving the
    /// secondary flags (attach/service/tau) intact. Used on a normal
    /// Identification Response.
    fn terminate(&mut self, table: &mut SharedTimestampTable) {
        self.pending_id = false;
        self.req_at = None;
        self.strike.reset();
        table.end(Procedure::Identification);
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, counter_field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Identify, kind, counter_field(&mut self.counters), now);
    }

    fn on_identity_request(&mut self, now: Timestamp, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if self.pending_id && self.pending_service {
            if let Some(req_at) = self.req_at {
                if within_window(now, req_at, self.thresholds.threshold_secs) {
                    self.publish(sink, "TRANSMISSION_SERVICE", |c| &mut c.transmission_service, now);
                    self.full_reset(table);
                }
            }
        } else if self.pending_id && self.pending_tau {
            if let Some(req_at) = self.req_at {
                if within_window(now, req_at, self.thresholds.threshold_secs) {
                    self.publish(sink, "TRANSMISSION_TAU", |c| &mut c.transmission_tau, now);
                    self.full_reset(table);
                }
            }
        } else if self.pending_id {
            if let Some(req_at) = self.req_at {
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
        }

        if !self.pending_id {
            table.start(Procedure::Identification, now);
        }
        self.pending_id = true;
        self.req_at = Some(now);
    }

    fn on_outgoing_attach_request(&mut self, payload: &Field, now: Timestamp, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if self.pending_id {
            if !self.pending_attach {
                self.publish(sink, "COLLISION", |c| &mut c.collision, now);
                self.full_reset(table);
            } else if let Some(prev) = &self.prev_attach_log
                && ie_diff::fingerprints_differ(ATTACH_FINGERPRINT, prev, payload)
            {
                self.publish(sink, "CONCURRENT", |c| &mut c.concurrent, now);
                self.full_reset(table);
            }
        }
        self.pending_attach = true;
        self.prev_attach_log = Some(payload.clone());
    }

    fn check_mobile_id_type(&mut self, payload: &Field, now: Timestamp, sink: &mut dyn CounterSink) {
        for field in payload.find_all_by_name(MOBILE_ID_TYPE_FIELD) {
            let showname = field.showname.as_str();
            let unavailable = showname.contains("no identity")
                || !VALID_MOBILE_ID_TYPES.iter().any(|t| showname.contains(t));
            if unavailable {
                self.publish(sink, "UNAVAILABLE", |c| &mut c.unavailable, now);
            }
        }
    }

    fn handle_incoming(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::AttachReject => self.pending_attach = false,
            EmmMessageType::TauReject => self.pending_tau = false,
            EmmMessageType::ServiceReject | EmmMessageType::ServiceAccept => self.pending_service = false,
            EmmMessageType::IdentityRequest => self.on_identity_request(msg.timestamp, table, sink),
            _ => {}
        }
    }

    fn handle_outgoing(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if let Some(emm_type) = emm::message_type(&msg.payload) {
            match emm_type {
                EmmMessageType::AttachRequest => {
                    self.on_outgoing_attach_request(&msg.payload, msg.timestamp, table, sink)
                }
                EmmMessageType::AttachComplete => {
                    self.pending_attach = false;
                    self.prev_attach_log = None;
                }
                EmmMessageType::DetachRequest => {
                    if self.pending_id && msg.payload.any_showname_contains("Switch off") {
                        self.publish(sink, "COLLISION", |c| &mut c.collision, msg.timestamp);
                        self.full_reset(table);
                    }
                }
                EmmMessageType::TauRequest => {
                    if !self.pending_id {
                        self.pending_tau = true;
                    }
                }
                EmmMessageType::TauComplete => self.pending_tau = false,
                EmmMessageType::IdentityResponse => self.terminate(table),
                EmmMessageType::ServiceRequest => {
                    if !self.pending_id {
                        self.pending_service = true;
                    }
                }
                _ => {}
            }
        }
        self.check_mobile_id_type(&msg.payload, msg.timestamp, sink);
    }

    fn handle_rrc(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if rrc::reports_handover_failure(&msg.payload)
            && table.is_handover_target(Procedure::Identification, msg.timestamp, self.thresholds.handover_window_secs)
        {
            self.publish(sink, "HANDOVER", |c| &mut c.handover, msg.timestamp);
            self.full_reset(table);
        }
    }
}

impl ProcedureAnalyzer for IdentificationAnalyzer {
    fn name(&self) -> &'static str {
        "identification"
    }

    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, table, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, table, sink),
            MessageType::RrcOta => self.handle_rrc(msg, table, sink),
        }
    }
}
