mod support;

use nas_retainability::emm::{EMM_CAUSE_FIELD, EMM_TYPE_FIELD};
use nas_retainability::counter::RecordingSink;
use nas_retainability::timestamp_table::SharedTimestampTable;
use nas_retainability::{AttachAnalyzer, Field, Message, MessageType, ProcedureAnalyzer, Thresholds};
use support::ts;

fn attach_request(at: nas_retainability::Timestamp, key_set_id: &str) -> Message {
    let payload = Field::new("root", "0", "root")
        .child(Field::new(EMM_TYPE_FIELD, "65", "Attach request"))
        .child(Field::new("nas_eps.emm.nas_key_set_id", key_set_id, "key set"));
    Message::new(MessageType::EmmOutgoingNas, at, payload)
}

fn attach_reject(at: nas_retainability::Timestamp, cause: &str) -> Message {
    let payload = Field::new("root", "0", "root")
        .child(Field::new(EMM_TYPE_FIELD, "68", "Attach reject"))
        .child(Field::new(EMM_CAUSE_FIELD, cause, "cause"));
    Message::new(MessageType::EmmIncomingNas, at, payload)
}

fn network_detach_request(at: nas_retainability::Timestamp, cause: &str, showname: &str) -> Message {
    let payload = Field::new("root", "0", "root")
        .child(Field::new(EMM_TYPE_FIELD, "69", "Detach request"))
        .child(Field::new("detach_type", "0", showname))
        .child(Field::new(EMM_CAUSE_FIELD, cause, "cause"));
    Message::new(MessageType::EmmIncomingNas, at, payload)
}

#[test]
fn five_attach_request_retransmits_publish_timeout() {
    let mut analyzer = AttachAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    for i in 0..5 {
        analyzer.handle(&attach_request(ts(i), "3"), &mut table, &mut sink);
    }
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_TIMEOUT_FAILURE"), Some(1));
}

#[test]
fn second_attach_request_with_a_different_key_set_id_is_concurrent() {
    let mut analyzer = AttachAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
    analyzer.handle(&attach_request(ts(1), "4"), &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_CONCURRENT_FAILURE"), Some(1));
}

#[test]
fn protocol_error_reject_cause_is_not_counted_as_an_emm_failure() {
    let mut analyzer = AttachAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    analyzer.handle(&attach_reject(ts(0), "96"), &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_PROTOCOL_ERROR_FAILURE"), Some(1));
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_EMM_FAILURE"), None);
}

#[test]
fn network_detach_with_reattach_required_while_attach_pending_is_a_detach_failure() {
    let mut analyzer = AttachAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
    let detach = network_detach_request(ts(10), "7", "Re-attach required");
    analyzer.handle(&detach, &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_DETACH_FAILURE"), Some(1));
}

#[test]
fn network_detach_with_reattach_not_required_and_non_normal_cause_is_a_detach_failure() {
    let mut analyzer = AttachAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
    let detach = network_detach_request(ts(10), "7", "Re-attach not required");
    analyzer.handle(&detach, &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_DETACH_FAILURE"), Some(1));
}

#[test]
fn network_detach_with_reattach_not_required_and_cause_two_is_not_a_detach_failure() {
    let mut analyzer = AttachAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    analyzer.handle(&attach_request(ts(0), "3"), &mut table, &mut sink);
    let detach = network_detach_request(ts(10), "2", "Re-attach not required");
    analyzer.handle(&detach, &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_ATTACH_DETACH_FAILURE"), None);
}
