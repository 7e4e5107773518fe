//! The decoded-message data model consumed by the analyzers.
//!
//! Decoding from a binary capture into this shape is an external
//! collaborator; this module only defines what an already
//! decoded message looks like: a tagged field tree modeled after the
//! `name`/`show`/`showname` triples a tshark-style NAS/RRC dissector
//! produces, the same shape `mobile_insight`'s KPI analyzers walk with
//! `ElementTree`.

use chrono::{DateTime, Utc};

/// A monotonic point in time. The dispatcher relies on messages arriving
/// in non-decreasing `Timestamp` order; out-of-order delivery
/// has bounded but undefined effects on counters.
pub type Timestamp = DateTime<Utc>;

/// Seconds elapsed from `earlier` to `later`. Negative if `later` precedes
/// `earlier`.
pub fn seconds_between(later: Timestamp, earlier: Timestamp) -> f64 {
    later.signed_duration_since(earlier).num_milliseconds() as f64 / 1000.0
}

/// True iff `later` falls within `[earlier, earlier + window_secs]`. The
/// recurring "`0 <= delta <= THRESHOLD`" guard used throughout every
/// procedure's retransmit and collision checks.
pub fn within_window(later: Timestamp, earlier: Timestamp, window_secs: f64) -> bool {
    (0.0..=window_secs).contains(&seconds_between(later, earlier))
}

/// Which decoded stream a [`Message`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `LTE_NAS_EMM_OTA_Incoming_Packet`: network-to-UE EMM signaling.
    EmmIncomingNas,
    /// `LTE_NAS_EMM_OTA_Outgoing_Packet`: UE-to-network EMM signaling.
    EmmOutgoingNas,
    /// `LTE_RRC_OTA_Packet`: RRC layer signaling, used here only for
    /// handover-failure attribution.
    RrcOta,
}

/// One node of a decoded message's field tree.
///
/// `show` and `showname` are both kept as strings: `show` carries either a
/// numeric discriminator rendered as text (an EMM message-type code like
/// `"65"`) or, for a handful of selectors used by the IE-diff rule, a
/// subtree's own label (e.g. `"EPS mobile identity"`); `showname` is always
/// the human-readable rendering compared against substrings like
/// `"Switch off"` or `"handoverFailure"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    pub name: String,
    pub show: String,
    pub showname: String,
    pub children: Vec<Field>,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        show: impl Into<String>,
        showname: impl Into<String>,
    ) -> Self {
        Field {
            name: name.into(),
            show: show.into(),
            showname: showname.into(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Field>) -> Self {
        self.children = children;
        self
    }

    pub fn child(mut self, child: Field) -> Self {
        self.children.push(child);
        self
    }

    /// All fields in this subtree in document order, starting with `self`.
    pub fn descendants(&self) -> Vec<&Field> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a Field>) {
        out.push(self);
        for child in &self.children {
            child.collect_descendants(out);
        }
    }

    /// The first field anywhere in this subtree (including `self`) whose
    /// `name` matches, in document order.
    pub fn find_by_name(&self, name: &str) -> Option<&Field> {
        self.descendants().into_iter().find(|f| f.name == name)
    }

    /// Every field anywhere in this subtree (including `self`) whose `name`
    /// matches, in document order.
    pub fn find_all_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Field> {
        self.descendants().into_iter().filter(move |f| f.name == name)
    }

    /// True if any field in this subtree has a `showname` containing `needle`.
    pub fn any_showname_contains(&self, needle: &str) -> bool {
        self.descendants().iter().any(|f| f.showname.contains(needle))
    }
}

/// A single decoded signaling message, immutable once emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub type_id: MessageType,
    pub timestamp: Timestamp,
    pub payload: Field,
}

impl Message {
    pub fn new(type_id: MessageType, timestamp: Timestamp, payload: Field) -> Self {
        Message {
            type_id,
            timestamp,
            payload,
        }
    }
}
