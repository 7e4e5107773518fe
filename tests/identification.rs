mod support;

use nas_retainability::counter::RecordingSink;
use nas_retainability::emm::EMM_TYPE_FIELD;
use nas_retainability::{Field, IdentificationAnalyzer, Message, MessageType, ProcedureAnalyzer, Thresholds};
use nas_retainability::timestamp_table::{Procedure, SharedTimestampTable};
use support::{emm_message, handover_failure, ts};

fn attach_request(at: nas_retainability::Timestamp, key_set_id: &str) -> Message {
    let payload = Field::new("root", "0", "root")
        .child(Field::new(EMM_TYPE_FIELD, "65", "Attach request"))
        .child(Field::new("nas_eps.emm.nas_key_set_id", key_set_id, "key set"));
    Message::new(MessageType::EmmOutgoingNas, at, payload)
}

#[test]
fn five_identity_request_retransmits_publish_timeout_and_clear_the_shared_table() {
    let mut analyzer = IdentificationAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    for i in 0..5 {
        let req = emm_message(MessageType::EmmIncomingNas, ts(i), "85", "Identity request");
        analyzer.handle(&req, &mut table, &mut sink);
    }
    assert_eq!(sink.latest("KPI_Retainability_IDENTIFY_TIMEOUT_FAILURE"), Some(1));
    assert_eq!(table.get(Procedure::Identification), None);
}

#[test]
fn attach_request_while_identity_pending_with_no_prior_attach_is_a_collision() {
    let mut analyzer = IdentificationAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    let id_req = emm_message(MessageType::EmmIncomingNas, ts(0), "85", "Identity request");
    analyzer.handle(&id_req, &mut table, &mut sink);
    analyzer.handle(&attach_request(ts(1), "3"), &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_IDENTIFY_COLLISION_FAILURE"), Some(1));
}

#[test]
fn handover_failure_within_window_of_a_pending_identity_request_is_attributed() {
    let mut analyzer = IdentificationAnalyzer::new(Thresholds::default());
    let mut table = SharedTimestampTable::new();
    let mut sink = RecordingSink::default();
    let id_req = emm_message(MessageType::EmmIncomingNas, ts(0), "85", "Identity request");
    analyzer.handle(&id_req, &mut table, &mut sink);
    analyzer.handle(&handover_failure(ts(30)), &mut table, &mut sink);
    assert_eq!(sink.latest("KPI_Retainability_IDENTIFY_HANDOVER_FAILURE"), Some(1));
    assert_eq!(table.get(Procedure::Identification), None);
}
