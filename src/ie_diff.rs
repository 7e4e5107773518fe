//! Mandatory information-element fingerprinting for the concurrent-request
//! rule.
//!
//! Grounded on the `prev_IE`/`curr_IE` dict-building loops duplicated across
//! `identification_analyzer.py`, `attach_fr_analyzer.py`, and
//! `tau_fr_analyzer.py`: each walks a request's field tree, picks a fixed
//! set of field names (or, for three IEs, subtrees keyed by their own
//! `show` label) and records each field's `showname`, keyed by whichever
//! attribute selected it. Two requests are "the same" iff those two maps
//! are equal.

use std::collections::BTreeMap;

use crate::message::Field;

/// One field (or show-keyed subtree) to include in a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Select by `field.name`; the map key is that same name.
    Name(&'static str),
    /// Select by `field.show`; the map key is that same value. Used for the
    /// three TAU IEs identified by their subtree label rather than a dotted
    /// field name (`"EPS mobile identity"`, `"UE network capability"`,
    /// `"DRX parameter"`).
    Show(&'static str),
}

/// The Attach-request mandatory-IE selector set.
pub const ATTACH_FINGERPRINT: &[Selector] = &[
    Selector::Name("gsm_a.L3_protocol_discriminator"),
    Selector::Name("nas_eps.security_header_type"),
    Selector::Name("nas_eps.nas_msg_emm_type"),
    Selector::Name("nas_eps.emm.eps_att_type"),
    Selector::Name("nas_eps.emm.nas_key_set_id"),
    Selector::Name("nas_eps.emm.type_of_id"),
    Selector::Name("nas_eps.emm.esm_msg_cont"),
];

/// The TAU-request mandatory-IE selector set.
pub const TAU_FINGERPRINT: &[Selector] = &[
    Selector::Name("nas_eps.emm.esm_msg_cont"),
    Selector::Name("nas_eps.emm.type_of_id"),
    Selector::Name("gsm_a.gm.gmm.ue_usage_setting"),
    Selector::Show("EPS mobile identity"),
    Selector::Show("UE network capability"),
    Selector::Show("DRX parameter"),
];

/// Build the mandatory-IE fingerprint of `root` under `selectors`. If a
/// selector matches more than one field in the tree, the last match in
/// document order wins (matching the original's single-key dict
/// assignment, which silently overwrites on a repeated field).
pub fn fingerprint(selectors: &[Selector], root: &Field) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    for field in root.descendants() {
        for selector in selectors {
            match selector {
                Selector::Name(name) if field.name == *name => {
                    map.insert(*name, field.showname.clone());
                }
                Selector::Show(show) if field.show == *show => {
                    map.insert(*show, field.showname.clone());
                }
                _ => {}
            }
        }
    }
    map
}

/// True iff `prev` and `curr`'s fingerprints under `selectors` are not
/// identical.
pub fn fingerprints_differ(selectors: &[Selector], prev: &Field, curr: &Field) -> bool {
    fingerprint(selectors, prev) != fingerprint(selectors, curr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach_request(key_set_id: &str) -> Field {
        Field::new("root", "0", "root")
            .child(Field::new("gsm_a.L3_protocol_discriminator", "7", "EPS"))
            .child(Field::new("nas_eps.security_header_type", "0", "Plain"))
            .child(Field::new("nas_eps.nas_msg_emm_type", "65", "Attach request"))
            .child(Field::new("nas_eps.emm.eps_att_type", "1", "EPS attach"))
            .child(Field::new("nas_eps.emm.nas_key_set_id", key_set_id, "key set"))
            .child(Field::new("nas_eps.emm.type_of_id", "1", "IMSI"))
            .child(Field::new("nas_eps.emm.esm_msg_cont", "abc", "ESM content"))
    }

    #[test]
    fn identical_attach_requests_have_equal_fingerprints() {
        let a = attach_request("3");
        let b = attach_request("3");
        assert!(!fingerprints_differ(ATTACH_FINGERPRINT, &a, &b));
    }

    #[test]
    fn differing_attach_requests_have_unequal_fingerprints() {
        let a = attach_request("3");
        let b = attach_request("4");
        assert!(fingerprints_differ(ATTACH_FINGERPRINT, &a, &b));
    }

    #[test]
    fn tau_fingerprint_uses_show_keyed_subtrees() {
        let a = Field::new("root", "0", "root")
            .child(Field::new("nas_eps.emm.esm_msg_cont", "x", "ESM"))
            .child(Field::new("nas_eps.emm.type_of_id", "1", "IMSI"))
            .child(Field::new("gsm_a.gm.gmm.ue_usage_setting", "0", "voice"))
            .child(Field::new("eps_mobile_identity", "EPS mobile identity", "GUTI 1"))
            .child(Field::new("ue_net_cap", "UE network capability", "cap A"))
            .child(Field::new("drx", "DRX parameter", "drx A"));
        let b = Field::new("root", "0", "root")
            .child(Field::new("nas_eps.emm.esm_msg_cont", "x", "ESM"))
            .child(Field::new("nas_eps.emm.type_of_id", "1", "IMSI"))
            .child(Field::new("gsm_a.gm.gmm.ue_usage_setting", "0", "voice"))
            .child(Field::new("eps_mobile_identity", "EPS mobile identity", "GUTI 2"))
            .child(Field::new("ue_net_cap", "UE network capability", "cap A"))
            .child(Field::new("drx", "DRX parameter", "drx A"));
        assert!(fingerprints_differ(TAU_FINGERPRINT, &a, &b));
    }

    #[test]
    fn repeated_field_keeps_last_occurrence() {
        let tree = Field::new("root", "0", "root")
            .child(Field::new("gsm_a.L3_protocol_discriminator", "7", "first"))
            .child(Field::new("gsm_a.L3_protocol_discriminator", "7", "second"));
        let fp = fingerprint(ATTACH_FINGERPRINT, &tree);
        assert_eq!(
            fp.get("gsm_a.L3_protocol_discriminator").map(String::as_str),
            Some("second")
        );
    }
}
