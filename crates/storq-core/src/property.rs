use crate::{
    collect::{collect, refresh},
    document::{StoredQueryDocument, SubQuery},
    param::{StringOrParam, ValueOrParameter},
    resolve::{ResolveRequest, resolve},
};
use proptest::prelude::*;
use storq_schema::ParamSchema;

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn arb_schema() -> impl Strategy<Value = ParamSchema> {
    prop_oneof![
        Just(ParamSchema::string()),
        any::<i64>().prop_map(|n| ParamSchema::string().with_default(n.to_string().into())),
        Just(ParamSchema::integer()),
        any::<i64>().prop_map(|n| ParamSchema::integer().with_default(n.into())),
    ]
}

fn arb_string_site() -> impl Strategy<Value = StringOrParam> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(ValueOrParameter::Literal),
        (arb_name(), arb_schema()).prop_map(|(name, schema)| {
            ValueOrParameter::inline(name, schema)
        }),
    ]
}

prop_compose! {
    fn arb_document()(
        collections in prop::collection::vec(arb_string_site(), 1..4),
        properties in prop::option::of(prop::collection::vec(arb_string_site(), 1..3)),
        sub_collections in prop::collection::vec(arb_string_site(), 0..3),
        limit in prop::option::of(any::<i64>().prop_map(ValueOrParameter::Literal)),
        offset in prop::option::of(any::<u64>()),
    ) -> StoredQueryDocument {
        let mut doc = StoredQueryDocument::new("prop");
        if sub_collections.is_empty() {
            doc.collections = collections;
        } else {
            doc.queries = sub_collections
                .into_iter()
                .map(SubQuery::new)
                .collect();
        }
        doc.properties = properties.map(|sites| {
            ValueOrParameter::Literal(sites)
        });
        doc.limit = limit;
        doc.offset = offset;
        doc
    }
}

proptest! {
    // The derived parameter table is a pure function of the document.
    #[test]
    fn collection_is_deterministic(doc in arb_document()) {
        prop_assert_eq!(collect(&doc), collect(&doc));
    }

    // Refreshing twice is the same as refreshing once.
    #[test]
    fn refresh_is_idempotent(mut doc in arb_document()) {
        refresh(&mut doc);
        let once = doc.effective_parameters().clone();
        refresh(&mut doc);
        prop_assert_eq!(doc.effective_parameters(), &once);
    }

    // Serialization round-trips the authored document.
    #[test]
    fn document_json_round_trips(doc in arb_document()) {
        let json = serde_json::to_value(&doc).unwrap();
        let back: StoredQueryDocument = serde_json::from_value(json).unwrap();
        prop_assert_eq!(back, doc);
    }

    // A fully literal document resolves without consulting supplied values,
    // and its literals pass through untouched.
    #[test]
    fn literal_documents_resolve_as_written(
        names in prop::collection::vec("[a-z]{1,8}", 1..4),
        limit in prop::option::of(any::<i64>()),
        offset in any::<u64>(),
    ) {
        let mut doc = StoredQueryDocument::new("prop");
        doc.collections = names
            .iter()
            .cloned()
            .map(ValueOrParameter::Literal)
            .collect();
        doc.limit = limit.map(ValueOrParameter::Literal);

        let request = ResolveRequest::default().with_offset(offset);
        let resolved = resolve(&doc, &request).unwrap();

        prop_assert_eq!(resolved.collections, names);
        prop_assert_eq!(resolved.limit, limit);
        prop_assert_eq!(resolved.offset, offset);
    }
}
