//! The Detach procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/detach_analyzer.py`.
//! This keeps the original's internal `initiator` distinction (network- vs
//! UE-initiated) even though both directions publish into the same counter
//! family; it only ever affects which message shows up as a retransmit of
//! which, not the KPI names.
//!
//! EMM-cause failures are published once per `nas_eps.emm.cause` occurrence
//! — an observable quirk of the original's per-field loop, preserved rather
//! than collapsed to a single increment. Unlike the original, every cause
//! value counts, not only the `"Not authorized for this CSG"` (25) case the
//! source happened to gate on.
//!
//! Handover attribution checks the shared timestamp table against the same
//! 60-second window used for retransmit/collision detection, not the
//! 600-second window every other procedure uses — the original seeds its
//! own `handover_timestamps` entry for Detach but never extends its window
//! past `THRESHOLD`, so that narrower window is kept here too.

use crate::config::Thresholds;
use crate::counter::{publish_increment, CounterSink, KpiProcedure};
use crate::dispatcher::ProcedureAnalyzer;
use crate::emm::{self, EmmMessageType};
use crate::message::{within_window, Field, Message, MessageType, Timestamp};
use crate::retransmit::StrikeCounter;
use crate::rrc;
use crate::timestamp_table::{Procedure, SharedTimestampTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Initiator {
    Network,
    Ue,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    timeout: u64,
    collision: u64,
    emm: u64,
    handover: u64,
}

struct DetachReason {
    reattach_not_required: bool,
    reattach_required: bool,
    imsi_detach: bool,
    cause: Option<u8>,
}

fn detach_reason(payload: &Field) -> DetachReason {
    let mut reattach_not_required = false;
    let mut reattach_required = false;
    let mut imsi_detach = false;
    for field in payload.descendants() {
        let lower = field.showname.to_lowercase();
        if lower.contains("re-attach not required") {
            reattach_not_required = true;
        }
        if lower.contains("re-attach required") {
            reattach_required = true;
        }
        if lower.contains("imsi detach") {
            imsi_detach = true;
        }
    }
    DetachReason {
        reattach_not_required,
        reattach_required,
        imsi_detach,
        cause: emm::cause(payload),
    }
}

pub struct DetachAnalyzer {
    thresholds: Thresholds,
    pending_detach: bool,
    req_at: Option<Timestamp>,
    strike: StrikeCounter,
    prev_log: Option<Field>,
    initiator: Option<Initiator>,
    counters: Counters,
}

impl DetachAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        DetachAnalyzer {
            thresholds,
            pending_detach: false,
            req_at: None,
            strike: StrikeCounter::new(),
            prev_log: None,
            initiator: None,
            counters: Counters::default(),
        }
    }

    fn full_reset(&mut self, table: &mut SharedTimestampTable) {
        self.pending_detach = false;
        self.req_at = None;
        self.strike.reset();
        self.prev_log = None;
        self.initiator = None;
        table.end(Procedure::Detach);
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Detach, kind, field(&mut self.counters), now);
    }

    fn record_request(&mut self, payload: &Field, now: Timestamp, initiator: Initiator, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
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
        if !self.pending_detach {
            table.start(Procedure::Detach, now);
        }
        self.pending_detach = true;
        self.req_at = Some(now);
        self.prev_log = Some(payload.clone());
        self.initiator = Some(initiator);
    }

    fn on_network_detach_request(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        for _cause in emm::causes(&msg.payload) {
            self.publish(sink, "EMM", |c| &mut c.emm, now);
            self.strike.reset();
        }
        self.record_request(&msg.payload, now, Initiator::Network, table, sink);
    }

    fn collides_with_attach(reason: &DetachReason) -> bool {
        (reason.reattach_not_required && reason.cause != Some(2))
            || (reason.imsi_detach && reason.cause != Some(2))
            || reason.reattach_required
    }

    fn collides_with_tau(reason: &DetachReason) -> bool {
        (reason.reattach_not_required && reason.cause == Some(2)) || reason.imsi_detach
    }

    fn handle_incoming(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::DetachRequest => self.on_network_detach_request(msg, table, sink),
            EmmMessageType::DetachAccept => self.full_reset(table),
            _ => {}
        }
    }

    fn handle_outgoing(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::AttachRequest => {
                if self.pending_detach
                    && let Some(req_at) = self.req_at
                    && within_window(msg.timestamp, req_at, self.thresholds.threshold_secs)
                    && let Some(prev) = &self.prev_log
                    && Self::collides_with_attach(&detach_reason(prev))
                {
                    self.publish(sink, "COLLISION", |c| &mut c.collision, msg.timestamp);
                    self.full_reset(table);
                }
            }
            EmmMessageType::TauRequest => {
                if self.pending_detach
                    && let Some(req_at) = self.req_at
                    && within_window(msg.timestamp, req_at, self.thresholds.threshold_secs)
                    && let Some(prev) = &self.prev_log
                    && Self::collides_with_tau(&detach_reason(prev))
                {
                    self.publish(sink, "COLLISION", |c| &mut c.collision, msg.timestamp);
                    self.full_reset(table);
                }
            }
            EmmMessageType::DetachRequest => {
                self.record_request(&msg.payload, msg.timestamp, Initiator::Ue, table, sink)
            }
            EmmMessageType::DetachAccept => self.full_reset(table),
            _ => {}
        }
    }

    fn handle_rrc(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if rrc::reports_handover_failure(&msg.payload)
            && table.is_handover_target(Procedure::Detach, msg.timestamp, self.thresholds.threshold_secs)
        {
            self.publish(sink, "HANDOVER", |c| &mut c.handover, msg.timestamp);
            self.full_reset(table);
        }
    }
}

impl ProcedureAnalyzer for DetachAnalyzer {
    fn name(&self) -> &'static str {
        "detach"
    }

    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, table, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, table, sink),
            MessageType::RrcOta => self.handle_rrc(msg, table, sink),
        }
    }
}
