//! The Authentication procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/auth_fr_analyzer.py`.
//! A TIMEOUT reached while TRANSMISSION_TAU/SERVICE would also apply
//! publishes only its own counter — the original's `elif` chain already
//! guarantees mutual exclusion, so this keeps the same
//! `if`/`else if`/`else if` shape.

use crate::config::Thresholds;
use crate::counter::{publish_increment, CounterSink, KpiProcedure};
use crate::dispatcher::ProcedureAnalyzer;
use crate::emm::{self, EmmMessageType};
use crate::message::{within_window, Message, MessageType, Timestamp};
use crate::retransmit::StrikeCounter;
use crate::rrc;
use crate::timestamp_table::{Procedure, SharedTimestampTable};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    timeout: u64,
    mac: u64,
    sync: u64,
    non_eps: u64,
    emm: u64,
    transmission_tau: u64,
    transmission_service: u64,
    handover: u64,
}

pub struct AuthenticationAnalyzer {
    thresholds: Thresholds,
    pending_auth: bool,
    auth_at: Option<Timestamp>,
    strike: StrikeCounter,
    pending_tau: bool,
    pending_service: bool,
    counters: Counters,
}

impl AuthenticationAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        AuthenticationAnalyzer {
            thresholds,
            pending_auth: false,
            auth_at: None,
            strike: StrikeCounter::new(),
            pending_tau: false,
            pending_service: false,
            counters: Counters::default(),
        }
    }

    fn full_reset(&mut self, table: &mut SharedTimestampTable) {
        self.pending_auth = false;
        self.auth_at = None;
        self.strike.reset();
        self.pending_tau = false;
        self.pending_service = false;
        table.end(Procedure::Authentication);
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Auth, kind, field(&mut self.counters), now);
    }

    fn on_auth_request(&mut self, now: Timestamp, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if self.pending_auth && self.pending_service {
            if let Some(auth_at) = self.auth_at
                && within_window(now, auth_at, self.thresholds.threshold_secs)
            {
                self.publish(sink, "TRANSMISSION_SERVICE", |c| &mut c.transmission_service, now);
                self.full_reset(table);
            }
        } else if self.pending_auth && self.pending_tau {
            if let Some(auth_at) = self.auth_at
                && within_window(now, auth_at, self.thresholds.threshold_secs)
            {
                self.publish(sink, "TRANSMISSION_TAU", |c| &mut c.transmission_tau, now);
                self.full_reset(table);
            }
        } else if self.pending_auth
            && let Some(auth_at) = self.auth_at
        {
            let timed_out = self.strike.record_retransmit(
                now,
                auth_at,
                self.thresholds.threshold_secs,
                self.thresholds.strike_count,
            );
            if timed_out {
                self.publish(sink, "TIMEOUT", |c| &mut c.timeout, now);
                self.full_reset(table);
            }
        }

        if !self.pending_auth {
            table.start(Procedure::Authentication, now);
        }
        self.pending_auth = true;
        self.auth_at = Some(now);
    }

    fn on_auth_failure(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let now = msg.timestamp;
        for cause in emm::causes(&msg.payload) {
            match cause {
                emm::CAUSE_MAC_FAILURE => self.publish(sink, "MAC", |c| &mut c.mac, now),
                emm::CAUSE_SYNC_FAILURE => self.publish(sink, "SYNCH", |c| &mut c.sync, now),
                emm::CAUSE_NON_EPS_UNACCEPT => self.publish(sink, "NON_EPS", |c| &mut c.non_eps, now),
                _ => self.publish(sink, "EMM", |c| &mut c.emm, now),
            }
        }
        self.full_reset(table);
    }

    fn handle_incoming(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::TauReject => self.pending_tau = false,
            EmmMessageType::ServiceReject | EmmMessageType::ServiceAccept => self.pending_service = false,
            EmmMessageType::AuthRequest => self.on_auth_request(msg.timestamp, table, sink),
            EmmMessageType::AuthReject => self.full_reset(table),
            _ => {}
        }
    }

    fn handle_outgoing(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::TauRequest => {
                if !self.pending_auth {
                    self.pending_tau = true;
                }
            }
            EmmMessageType::TauComplete => self.pending_tau = false,
            EmmMessageType::AuthResponse => self.full_reset(table),
            EmmMessageType::AuthFailure => self.on_auth_failure(msg, table, sink),
            EmmMessageType::ServiceRequest => {
                if !self.pending_auth {
                    self.pending_service = true;
                }
            }
            _ => {}
        }
    }

    fn handle_rrc(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if rrc::reports_handover_failure(&msg.payload)
            && table.is_handover_target(Procedure::Authentication, msg.timestamp, self.thresholds.handover_window_secs)
        {
            self.publish(sink, "HANDOVER", |c| &mut c.handover, msg.timestamp);
            self.full_reset(table);
        }
    }
}

impl ProcedureAnalyzer for AuthenticationAnalyzer {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, table, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, table, sink),
            MessageType::RrcOta => self.handle_rrc(msg, table, sink),
        }
    }
}
