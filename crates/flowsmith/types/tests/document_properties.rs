//! Property tests: canonical serialization keeps the column invariant and
//! escaping round-trips arbitrary field values.

use flowsmith_types::codec::{encode_record, tokenize_record};
use flowsmith_types::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// Field text biased towards the characters that need quoting.
fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,20}",
        "[a-z,\"\n\r|~ ]{0,20}",
        any::<String>(),
    ]
}

fn arb_node() -> impl Strategy<Value = Node> {
    (
        1u32..10_000,
        any::<bool>(),
        arb_text(),
        proptest::option::of(arb_text()),
        prop::collection::vec(1u32..10_000, 0..4),
        proptest::option::of(arb_text()),
    )
        .prop_map(|(id, is_action, name, message, next, command)| {
            let node = if is_action {
                Node::action(id, name, command.unwrap_or_default())
            } else {
                Node::decision(id, name)
            };
            let node = node.with_next(next);
            match message {
                Some(message) => node.with_message(message),
                None => node,
            }
        })
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Every serialized row carries exactly the schema's field count and the
    /// strict reader accepts the output.
    #[test]
    fn serialized_rows_have_uniform_field_count(nodes in prop::collection::vec(arb_node(), 0..20)) {
        let document = serialize(&nodes);
        prop_assert_eq!(document.len(), nodes.len());
        for row in document.rows() {
            prop_assert_eq!(row.fields().len(), FIELD_COUNT);
        }

        let reparsed = FlowDocument::parse(&document.to_text()).unwrap();
        prop_assert_eq!(reparsed.len(), nodes.len());
        prop_assert!(reparsed.rows().iter().all(Row::is_well_formed));
    }

    /// Escaping then tokenizing yields the original values.
    #[test]
    fn escaping_round_trips(values in prop::collection::vec(arb_text(), 1..8)) {
        let encoded = encode_record(&values);
        prop_assert_eq!(tokenize_record(&encoded), values);
    }

    /// Message text survives a full document round trip.
    #[test]
    fn messages_survive_document_round_trip(message in arb_text()) {
        let nodes = vec![Node::decision(1, "Start").with_message(message.clone())];
        let reparsed = FlowDocument::parse(&serialize(&nodes).to_text()).unwrap();
        prop_assert_eq!(reparsed.rows()[0].field(Column::Message), Some(message.as_str()));
    }
}
