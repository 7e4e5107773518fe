//! The GUTI Reallocation procedure analyzer.
//!
//! Grounded on
//! `examples/original_source/mobile_insight/analyzer/kpi/guti_reallocation_fr_analyzer.py`
//! for `TIMEOUT`/`COLLISION`; the original has no RRC branch of its own, but
//! it already participates in the cross-procedure handover table as a
//! possible source of the maximum via `table.start`/`end`, so it also gets
//! a `HANDOVER` counter on the standard 600-second window, matching every
//! other procedure analyzer except Detach.

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
    collision: u64,
    handover: u64,
}

pub struct GutiAnalyzer {
    thresholds: Thresholds,
    pending_guti: bool,
    cmd_at: Option<Timestamp>,
    strike: StrikeCounter,
    counters: Counters,
}

impl GutiAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        GutiAnalyzer {
            thresholds,
            pending_guti: false,
            cmd_at: None,
            strike: StrikeCounter::new(),
            counters: Counters::default(),
        }
    }

    fn full_reset(&mut self, table: &mut SharedTimestampTable) {
        self.pending_guti = false;
        self.cmd_at = None;
        self.strike.reset();
        table.end(Procedure::Guti);
    }

    fn publish(&mut self, sink: &mut dyn CounterSink, kind: &str, field: fn(&mut Counters) -> &mut u64, now: Timestamp) {
        publish_increment(sink, KpiProcedure::Guti, kind, field(&mut self.counters), now);
    }

    fn handle_incoming(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if emm::message_type(&msg.payload) != Some(EmmMessageType::GutiReallocationCommand) {
            return;
        }
        let now = msg.timestamp;
        if self.pending_guti
            && let Some(cmd_at) = self.cmd_at
        {
            let timed_out = self.strike.record_retransmit(
                now,
                cmd_at,
                self.thresholds.t3450_secs,
                self.thresholds.strike_count,
            );
            if timed_out {
                self.publish(sink, "TIMEOUT", |c| &mut c.timeout, now);
                self.full_reset(table);
            }
        }
        if !self.pending_guti {
            table.start(Procedure::Guti, now);
        }
        self.pending_guti = true;
        self.cmd_at = Some(now);
    }

    fn handle_outgoing(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        let Some(emm_type) = emm::message_type(&msg.payload) else {
            return;
        };
        match emm_type {
            EmmMessageType::AttachRequest
            | EmmMessageType::DetachRequest
            | EmmMessageType::TauRequest
            | EmmMessageType::ServiceRequest => {
                if self.pending_guti
                    && let Some(cmd_at) = self.cmd_at
                    && within_window(msg.timestamp, cmd_at, self.thresholds.threshold_secs)
                {
                    self.publish(sink, "COLLISION", |c| &mut c.collision, msg.timestamp);
                    self.full_reset(table);
                }
            }
            EmmMessageType::GutiReallocationComplete => self.full_reset(table),
            _ => {}
        }
    }

    fn handle_rrc(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        if rrc::reports_handover_failure(&msg.payload)
            && table.is_handover_target(Procedure::Guti, msg.timestamp, self.thresholds.handover_window_secs)
        {
            self.publish(sink, "HANDOVER", |c| &mut c.handover, msg.timestamp);
            self.full_reset(table);
        }
    }
}

impl ProcedureAnalyzer for GutiAnalyzer {
    fn name(&self) -> &'static str {
        "guti_reallocation"
    }

    fn handle(&mut self, msg: &Message, table: &mut SharedTimestampTable, sink: &mut dyn CounterSink) {
        match msg.type_id {
            MessageType::EmmIncomingNas => self.handle_incoming(msg, table, sink),
            MessageType::EmmOutgoingNas => self.handle_outgoing(msg, table, sink),
            MessageType::RrcOta => self.handle_rrc(msg, table, sink),
        }
    }
}
