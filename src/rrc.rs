//! The one RRC-layer detail this core reads: the reestablishment cause
//! used for handover-failure attribution.

use crate::message::Field;

pub const REESTABLISHMENT_CAUSE_FIELD: &str = "lte-rrc.reestablishmentCause";

/// True iff `payload` carries a `lte-rrc.reestablishmentCause` field whose
/// `showname` contains `"handoverFailure"`.
pub fn reports_handover_failure(payload: &Field) -> bool {
    payload
        .find_by_name(REESTABLISHMENT_CAUSE_FIELD)
        .is_some_and(|f| f.showname.contains("handoverFailure"))
}
