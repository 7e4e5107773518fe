//! The Security Mode Control procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/security_mode_control_fr_analyzer.py`.

use crate::config::Thresholds;
use crate::counter::{publish_increment, CounterSink, KpiProcedure};
use crate::dispatcher::ProcedureAnalyzer;
use crate::emm::{self, EmmMessageType};
use crate::message::{within_window, Field, Message, MessageType, Timestamp};
use crate::retransmit::StrikeCounter;
use crate::rrc;
use crate::timestamp_table::{Procedure, SharedTimestampTable};

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    collision: u64,
    timeout: u64,
    transmission_tau: u64,
    transmission_service: u64,
    handover: u64,
}

pub struct SecurityModeAnalyzer {
    thresholds: Thresholds,
    pending_security_mode: bool,
    cmd_at: Option<Timestamp>,
    strike: StrikeCounter,
    pending_service: bool,
    pending_tau: bool,
    counters: Counters,
}

impl SecurityModeAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        SecurityModeAnalyzer {
            thresholds,
            pending_security_mode: false,
            cmd_at: None,
            strike: StrikeCounter::new(),
            pending_service: false,
            pending_tau: false,
            counters: Counters::default(),
        }
    }

    fn full_reset(&mut self, table: &mut SharedTimestampTable) {
        self.pending_security_mode = false;
        self.cmd_at = None;
        self.strike.reset();
        self.pending_service = false;
        self.pending_tau = false;
        table.end(Procedure::Security);
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Security, kind, field(&mut self.counters), now);
    }

    fn on_security_mode_command(&mut self, now: Timestamp, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if self.pending_security_mode && self.pending_service {
            if let Some(cmd_at) = self.cmd_at
                && within_window(now, cmd_at, self.thresholds.threshold_secs)
            {
                self.publish(sink, "TRANSMISSION_SERVICE", |c| &mut c.transmission_service, now);
                self.full_reset(table);
            }
        } else if self.pending_security_mode && self.pending_tau {
            if let Some(cmd_at) = self.cmd_at
                && within_window(now, cmd_at, self.thresholds.threshold_secs)
            {
                self.publish(sink, "TRANSMISSION_TAU", |c| &mut c.transmission_tau, now);
                self.full_reset(table);
            }
        } else if self.pending_security_mode
            && let Some(cmd_at) = self.cmd_at
        {
            let timed_out = self.strike.record_retransmit(
                now,
                cmd_at,
                self.thresholds.threshold_secs,
                self.thresholds.strike_count,
            );
            if timed_out {
                self.publish(sink, "TIMEOUT", |c| &mut c.timeout, now);
                self.full_reset(table);
            }
        }

        if !self.pending_security_mode {
            table.start(Procedure::Security, now);
        }
        self.pending_security_mode = true;
        self.cmd_at = Some(now);
    }

    fn handle_incoming(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::TauReject => self.pending_tau = false,
            EmmMessageType::ServiceReject | EmmMessageType::ServiceAccept => self.pending_service = false,
            EmmMessageType::SecurityModeCommand => self.on_security_mode_command(msg.timestamp, table, sink),
            _ => {}
        }
    }

    fn handle_outgoing(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::AttachRequest | EmmMessageType::TauRequest | EmmMessageType::ServiceRequest => {
                if self.pending_security_mode
                    && let Some(cmd_at) = self.cmd_at
                    && within_window(msg.timestamp, cmd_at, self.thresholds.threshold_secs)
                {
                    self.publish(sink, "COLLISION", |c| &mut c.collision, msg.timestamp);
                    self.full_reset(table);
                }
                if emm_type == EmmMessageType::TauRequest && !self.pending_security_mode {
                    self.pending_tau = true;
                }
                if emm_type == EmmMessageType::ServiceRequest && !self.pending_security_mode {
                    self.pending_service = true;
                }
            }
            EmmMessageType::DetachRequest => {
                if self.pending_security_mode
                    && let Some(cmd_at) = self.cmd_at
                    && within_window(msg.timestamp, cmd_at, self.thresholds.threshold_secs)
                    && !msg.payload.any_showname_contains("Switch off")
                {
                    self.publish(sink, "COLLISION", |c| &mut c.collision, msg.timestamp);
                    self.full_reset(table);
                }
            }
            EmmMessageType::TauComplete => self.pending_tau = false,
            EmmMessageType::SecurityModeComplete | EmmMessageType::SecurityModeReject => self.full_reset(table),
            _ => {}
        }
    }

    fn handle_rrc(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if rrc::reports_handover_failure(&msg.payload)
            && table.is_handover_target(Procedure::Security, msg.timestamp, self.thresholds.handover_window_secs)
        {
            self.publish(sink, "HANDOVER", |c| &mut c.handover, msg.timestamp);
            self.full_reset(table);
        }
    }
}

impl ProcedureAnalyzer for SecurityModeAnalyzer {
    fn name(&self) -> &'static str {
        "security_mode"
    }

    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, table, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, table, sink),
            MessageType::RrcOta => self.handle_rrc(msg, table, sink),
        }
    }
}
