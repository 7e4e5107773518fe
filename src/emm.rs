//! EMM message-type and cause code tables.
//!
//! Grounded on `rayhunter::gsmtap::LteNasSubtype`/`GsmtapType`, which use
//! `num_enum::TryFromPrimitive` to turn a raw wire code into a closed Rust
//! enum and simply fail (ignored by the caller) for any code the analyzer
//! doesn't care about.

use num_enum::TryFromPrimitive;

use crate::message::Field;

/// The field name carrying the EMM message-type discriminator.
pub const EMM_TYPE_FIELD: &str = "nas_eps.nas_msg_emm_type";

/// The field name carrying an EMM reject cause.
pub const EMM_CAUSE_FIELD: &str = "nas_eps.emm.cause";

/// All EMM message-type codes referenced by this core.
/// Codes not listed here are ignored by every analyzer, matching the
/// table's "others are ignored" note.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
pub enum EmmMessageType {
    AttachRequest = 65,
    AttachAccept = 66,
    AttachComplete = 67,
    AttachReject = 68,
    DetachRequest = 69,
    DetachAccept = 70,
    TauRequest = 72,
    TauAccept = 73,
    TauComplete = 74,
    TauReject = 75,
    ServiceReject = 78,
    ServiceAccept = 79,
    GutiReallocationCommand = 80,
    GutiReallocationComplete = 81,
    AuthRequest = 82,
    AuthResponse = 83,
    AuthReject = 84,
    IdentityRequest = 85,
    IdentityResponse = 86,
    AuthFailure = 92,
    SecurityModeCommand = 93,
    SecurityModeComplete = 94,
    SecurityModeReject = 95,
    ServiceRequest = 255,
}

/// EMM cause codes with dedicated handling somewhere in this core.
pub const CAUSE_MAC_FAILURE: u8 = 20;
pub const CAUSE_SYNC_FAILURE: u8 = 21;
pub const CAUSE_CONGESTION: u8 = 22;
pub const CAUSE_NON_EPS_UNACCEPT: u8 = 26;

/// Reject causes treated as a protocol error rather than a counted EMM
/// failure.
pub const PROTOCOL_ERROR_CAUSES: [u8; 4] = [96, 99, 100, 111];

pub fn is_protocol_error_cause(cause: u8) -> bool {
    PROTOCOL_ERROR_CAUSES.contains(&cause)
}

/// Read the message-type discriminator out of a payload tree, if present
/// and within the known code table. Absence or an unrecognized code is
/// silently ignored.
pub fn message_type(payload: &Field) -> Option<EmmMessageType> {
    let field = payload.find_by_name(EMM_TYPE_FIELD)?;
    let code: u8 = field.show.parse().ok()?;
    EmmMessageType::try_from(code).ok()
}

/// Read the first `nas_eps.emm.cause` field's numeric value, if present.
pub fn cause(payload: &Field) -> Option<u8> {
    payload.find_by_name(EMM_CAUSE_FIELD)?.show.parse().ok()
}

/// Read every `nas_eps.emm.cause` field's numeric value, in document order.
/// Used by the Detach analyzer, which increments once per cause field
/// encountered.
pub fn causes(payload: &Field) -> Vec<u8> {
    payload
        .find_all_by_name(EMM_CAUSE_FIELD)
        .filter_map(|f| f.show.parse().ok())
        .collect()
}
