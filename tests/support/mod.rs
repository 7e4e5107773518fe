//! Shared fixture-building helpers for the integration test suite.
//!
//! Each `tests/*.rs` file is its own crate as far as `cargo test` is
//! concerned, so this lives under `tests/support/mod.rs` rather than
//! `tests/support.rs` to avoid being picked up as a test binary of its own
//! (the same layout `rayhunter`'s own `tests/` directory uses for shared
//! setup code).

use chrono::{TimeZone, Utc};
use nas_retainability::{Field, Message, MessageType, Timestamp};
use nas_retainability::emm::{EMM_CAUSE_FIELD, EMM_TYPE_FIELD};
use nas_retainability::rrc::REESTABLISHMENT_CAUSE_FIELD;

pub fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// A minimal EMM message carrying only a type-code field, for procedures
/// whose analyzer never inspects anything past `nas_eps.nas_msg_emm_type`.
pub fn emm_message(direction: MessageType, at: Timestamp, type_code: &str, type_showname: &str) -> Message {
    Message::new(
        direction,
        at,
        Field::new("root", "0", "root").child(Field::new(EMM_TYPE_FIELD, type_code, type_showname)),
    )
}

/// `emm_message` plus a trailing `nas_eps.emm.cause` field, for reject/failure
/// messages whose analyzer branches on the cause code.
pub fn emm_message_with_cause(
    direction: MessageType,
    at: Timestamp,
    type_code: &str,
    type_showname: &str,
    cause: &str,
    cause_showname: &str,
) -> Message {
    let payload = Field::new("root", "0", "root")
        .child(Field::new(EMM_TYPE_FIELD, type_code, type_showname))
        .child(Field::new(EMM_CAUSE_FIELD, cause, cause_showname));
    Message::new(direction, at, payload)
}

/// An RRC OTA message reporting `handoverFailure` as its reestablishment
/// cause — the only RRC detail any analyzer in this crate reads.
pub fn handover_failure(at: Timestamp) -> Message {
    Message::new(
        MessageType::RrcOta,
        at,
        Field::new("root", "0", "root").child(Field::new(
            REESTABLISHMENT_CAUSE_FIELD,
            "3",
            "handoverFailure",
        )),
    )
}
