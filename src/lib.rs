//! Passive analysis of a decoded LTE EMM/RRC signaling stream: seven
//! procedure-level retainability counters, published
//! through a small [`counter::CounterSink`] trait an embedding program
//! implements.
//!
//! This crate does no capture or decoding of its own — it consumes
//! [`message::Message`] values a host has already produced from a NAS/RRC
//! dissector, the same boundary `rayhunter`'s own analyzers sit behind
//! relative to its GSMTAP/QMDL parsing layers.

pub mod analysis;
pub mod config;
pub mod counter;
pub mod dispatcher;
pub mod emm;
pub mod error;
pub mod ie_diff;
pub mod message;
pub mod retransmit;
pub mod rrc;
pub mod timestamp_table;

pub use analysis::attach::AttachAnalyzer;
pub use analysis::authentication::AuthenticationAnalyzer;
pub use analysis::detach::DetachAnalyzer;
pub use analysis::guti::GutiAnalyzer;
pub use analysis::identification::IdentificationAnalyzer;
pub use analysis::security_mode::SecurityModeAnalyzer;
pub use analysis::tau::TauAnalyzer;
pub use config::{AnalyzerConfig, Thresholds};
pub use counter::{CounterSink, KpiProcedure, LoggingSink, NullSink};
pub use dispatcher::{Dispatcher, ProcedureAnalyzer};
pub use error::DispatchError;
pub use message::{Field, Message, MessageType, Timestamp};

/// Build a [`Dispatcher`] with every analyzer enabled by `config`
/// registered, using `thresholds` for all of them. Mirrors the
/// `Harness::new_with_config` convenience constructor pattern from the
/// teacher crate.
pub fn dispatcher_from_config(config: &AnalyzerConfig, thresholds: Thresholds) -> Result<Dispatcher, DispatchError> {
    let mut dispatcher = Dispatcher::new();
    if config.identification {
        dispatcher.register(Box::new(IdentificationAnalyzer::new(thresholds)))?;
    }
    if config.security_mode {
        dispatcher.register(Box::new(SecurityModeAnalyzer::new(thresholds)))?;
    }
    if config.guti_reallocation {
        dispatcher.register(Box::new(GutiAnalyzer::new(thresholds)))?;
    }
    if config.authentication {
        dispatcher.register(Box::new(AuthenticationAnalyzer::new(thresholds)))?;
    }
    if config.attach {
        dispatcher.register(Box::new(AttachAnalyzer::new(thresholds)))?;
    }
    if config.detach {
        dispatcher.register(Box::new(DetachAnalyzer::new(thresholds)))?;
    }
    if config.tau {
        dispatcher.register(Box::new(TauAnalyzer::new(thresholds)))?;
    }
    Ok(dispatcher)
}
