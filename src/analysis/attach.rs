//! The Attach procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/attach_fr_analyzer.py`.
//! Attach has no `HANDOVER` kind and never touches the shared timestamp
//! table: the original never seeds a `handover_timestamps["Attach"]` entry,
//! and that omission is kept here.

use crate::config::Thresholds;
use crate::counter::{publish_increment, CounterSink, KpiProcedure};
use crate::dispatcher::ProcedureAnalyzer;
use crate::emm::{self, EmmMessageType};
use crate::ie_diff::{self, ATTACH_FINGERPRINT};
use crate::message::{within_window, Field, Message, MessageType, Timestamp};
use crate::retransmit::StrikeCounter;
use crate::timestamp_table::SharedTimestampTable;

const CONGESTION_T3346_MARKER: &str = "T3346";
const REATTACH_NOT_REQUIRED: &str = "Re-attach not required";
const REATTACH_REQUIRED: &str = "Re-attach required";

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    timeout: u64,
    concurrent: u64,
    detach: u64,
    protocol_error: u64,
    emm: u64,
}

pub struct AttachAnalyzer {
    thresholds: Thresholds,
    pending_attach: bool,
    accepting_attach: bool,
    req_at: Option<Timestamp>,
    accept_at: Option<Timestamp>,
    strike: StrikeCounter,
    prev_request: Option<Field>,
    counters: Counters,
}

impl AttachAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        AttachAnalyzer {
            thresholds,
            pending_attach: false,
            accepting_attach: false,
            req_at: None,
            accept_at: None,
            strike: StrikeCounter::new(),
            prev_request: None,
            counters: Counters::default(),
        }
    }

    fn full_reset(&mut self) {
        self.pending_attach = false;
        self.accepting_attach = false;
        self.req_at = None;
        self.accept_at = None;
        self.strike.reset();
        self.prev_request = None;
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Attach, kind, field(&mut self.counters), now);
    }

    fn pending_anchor(&self) -> Option<Timestamp> {
        self.req_at.or(self.accept_at)
    }

    fn on_attach_reject(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
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
        self.full_reset();
    }

    fn on_network_detach(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
        let Some(anchor) = self.pending_anchor() else {
            return;
        };
        if !within_window(msg.timestamp, anchor, self.thresholds.threshold_secs) {
            return;
        }
        let reattach_not_required = msg.payload.any_showname_contains(REATTACH_NOT_REQUIRED);
        let reattach_required = msg.payload.any_showname_contains(REATTACH_REQUIRED);
        let cause = emm::cause(&msg.payload);
        let is_failure = (reattach_not_required && cause != Some(2)) || reattach_required;
        if is_failure {
            self.publish(sink, "DETACH", |c| &mut c.detach, msg.timestamp);
            self.full_reset();
        }
    }

    fn on_attach_accept(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        if self.accepting_attach
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
                self.full_reset();
                return;
            }
        }
        if self.pending_attach || self.accepting_attach {
            self.accepting_attach = true;
            self.accept_at = Some(now);
            self.prev_request = None;
            self.pending_attach = false;
            self.req_at = None;
        }
    }

    fn handle_incoming(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::AttachAccept => self.on_attach_accept(msg, sink),
            EmmMessageType::AttachReject => self.on_attach_reject(msg, sink),
            EmmMessageType::DetachRequest => self.on_network_detach(msg, sink),
            _ => {}
        }
    }

    fn on_attach_request(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        if (self.pending_attach || self.accepting_attach)
            && let Some(anchor) = self.pending_anchor()
            && within_window(now, anchor, self.thresholds.threshold_secs)
            && let Some(prev) = &self.prev_request
            && ie_diff::fingerprints_differ(ATTACH_FINGERPRINT, prev, &msg.payload)
        {
            self.publish(sink, "CONCURRENT", |c| &mut c.concurrent, now);
            self.full_reset();
        }

        if let Some(req_at) = self.req_at {
            let timed_out = self.strike.record_retransmit(
                now,
                req_at,
                self.thresholds.threshold_secs,
                self.thresholds.strike_count,
            );
            if timed_out {
                self.publish(sink, "TIMEOUT", |c| &mut c.timeout, now);
                self.full_reset();
            }
        }

        self.pending_attach = true;
        self.req_at = Some(now);
        self.prev_request = Some(msg.payload.clone());
    }

    fn handle_outgoing(&mut self, msg: &Message, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::AttachRequest => self.on_attach_request(msg, sink),
            EmmMessageType::AttachComplete => {
                if let Some(accept_at) = self.accept_at
                    && within_window(msg.timestamp, accept_at, self.thresholds.threshold_secs)
                {
                    self.full_reset();
                }
            }
            EmmMessageType::DetachRequest => {
                if (self.pending_attach || self.accepting_attach)
                    && let Some(anchor) = self.pending_anchor()
                    && within_window(msg.timestamp, anchor, self.thresholds.threshold_secs)
                {
                    self.publish(sink, "DETACH", |c| &mut c.detach, msg.timestamp);
                    self.full_reset();
                }
            }
            _ => {}
        }
    }
}

impl ProcedureAnalyzer for AttachAnalyzer {
    fn name(&self) -> &'static str {
        "attach"
    }

    fn handle(&mut self, msg: &Message, _table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, sink),
            MessageType::RrcOta => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::RecordingSink;
    use chrono::{TimeZone, Utc};

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn attach_request(at: Timestamp, key_set_id: &str) -> Message {
        let payload = Field::new("root", "0", "root")
            .child(Field::new("gsm_a.L3_protocol_discriminator", "7", "EPS"))
            .child(Field::new("nas_eps.security_header_type", "0", "Plain"))
            .child(Field::new(emm::EMM_TYPE_FIELD, "65", "Attach request"))
            .child(Field::new("nas_eps.emm.eps_att_type", "1", "EPS attach"))
            .child(Field::new("nas_eps.emm.nas_key_set_id", key_set_id, "key set"))
            .child(Field::new("nas_eps.emm.type_of_id", "1", "IMSI"))
            .child(Field::new("nas_eps.emm.esm_msg_cont", "abc", "ESM content"));
        Message::new(MessageType::EmmOutgoingNas, at, payload)
    }

    fn attach_reject(at: Timestamp, cause: &str) -> Message {
        let payload = Field::new("root", "0", "root")
            .child(Field::new(emm::EMM_TYPE_FIELD, "68", "Attach reject"))
            .child(Field::new(emm::EMM_CAUSE_FIELD, cause, "cause"));
        Message::new(MessageType::EmmIncomingNas, at, payload)
    }

    fn attach_accept(at: Timestamp) -> Message {
        Message::new(
            MessageType::EmmIncomingNas,
            at,
            Field::new("root", "0", "root").child(Field::new(emm::EMM_TYPE_FIELD, "66", "Attach accept")),
        )
    }

    fn network_detach_request(at: Timestamp, cause: &str, showname: &str) -> Message {
        let payload = Field::new("root", "0", "root")
            .child(Field::new(emm::EMM_TYPE_FIELD, "69", "Detach request"))
            .child(Field::new("detach_type", "0", showname))
            .child(Field::new(emm::EMM_CAUSE_FIELD, cause, "cause"));
        Message::new(MessageType::EmmIncomingNas, at, payload)
    }

    #[test]
    fn five_retransmits_publish_timeout() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        for i in 0..5 {
            analyzer.handle(&attach_request(ts(i), "3"), &mut table, &mut sink);
        }
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_TIMEOUT_FAILURE"), Some(1));
    }

    #[test]
    fn concurrent_request_with_differing_fingerprint() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
        analyzer.handle(&attach_request(ts(1), "4"), &mut table, &mut sink);
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_CONCURRENT_FAILURE"), Some(1));
    }

    #[test]
    fn protocol_error_cause_publishes_protocol_error() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        analyzer.handle(&attach_reject(ts(0), "96"), &mut table, &mut sink);
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_PROTOCOL_ERROR_FAILURE"), Some(1));
    }

    #[test]
    fn ordinary_reject_cause_publishes_emm() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        analyzer.handle(&attach_reject(ts(0), "7"), &mut table, &mut sink);
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_EMM_FAILURE"), Some(1));
    }

    #[test]
    fn five_retransmitted_accepts_publish_timeout() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
        for i in 1..=5 {
            analyzer.handle(&attach_accept(ts(i)), &mut table, &mut sink);
        }
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_TIMEOUT_FAILURE"), Some(1));
    }

    #[test]
    fn network_detach_with_reattach_required_while_pending_is_a_detach_failure() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
        let detach = network_detach_request(ts(10), "7", "Re-attach required");
        analyzer.handle(&detach, &mut table, &mut sink);
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_DETACH_FAILURE"), Some(1));
    }

    #[test]
    fn network_detach_with_reattach_not_required_and_cause_two_is_not_a_detach_failure() {
        let mut analyzer = AttachAnalyzer::new(Thresholds::default());
        let mut table = SharedTimestampTable::new();
        let mut sink = RecordingSink::default();
        analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
        let detach = network_detach_request(ts(10), "2", "Re-attach not required");
        analyzer.handle(&detach, &mut table, &mut sink);
        assert_eq!(sink.latest("KPI_Retainability_ATTACH_DETACH_FAILURE"), None);
    }
}
