use crate::param::{FilterOp, StringListOrParam, StringOrParam, ValueOrParameter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storq_filter::Expr;
use storq_schema::ParamSchema;

///
/// StoredQueryDocument
///
/// The persisted query template. Every clause that may carry a placeholder
/// is a [`ValueOrParameter`]; `offset` is always concrete and supplied at
/// execution time. The derived `all_parameters` table is never persisted;
/// it is recomputed from the literal content whenever that changes.
///
/// Cardinality invariant, checked by the static validator: either
/// `collections` has exactly one entry and `queries` is empty, or `queries`
/// is non-empty and `collections` is empty.
///

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct StoredQueryDocument {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<SubQuery>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<StringOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_crs: Option<StringOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_operator: Option<ValueOrParameter<FilterOp>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortby: Option<StringListOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<StringListOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<StringOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_crs: Option<StringOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_allowable_offset: Option<ValueOrParameter<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<ValueOrParameter<i64>>,

    /// Never parameterized; a concrete request offset takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<StringListOrParam>,

    /// The document-level parameter table `#/parameters/<name>` refs point into.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParamSchema>,

    /// Derived: the effective table of every parameter used anywhere in the
    /// document. Recomputed by the collector, excluded from the wire shape
    /// and from equality.
    #[serde(skip)]
    pub all_parameters: BTreeMap<String, ParamSchema>,
}

impl StoredQueryDocument {
    /// An empty template with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            queries: Vec::new(),
            collections: Vec::new(),
            filter: None,
            filter_crs: None,
            filter_operator: None,
            sortby: None,
            properties: None,
            crs: None,
            vertical_crs: None,
            max_allowable_offset: None,
            limit: None,
            offset: None,
            profiles: None,
            parameters: BTreeMap::new(),
            all_parameters: BTreeMap::new(),
        }
    }

    /// Declare a table entry other clauses can reference.
    #[must_use]
    pub fn declare(mut self, name: impl Into<String>, schema: ParamSchema) -> Self {
        self.parameters.insert(name.into(), schema);
        self
    }

    /// True when the document runs in multi-collection (join) mode.
    #[must_use]
    pub fn is_multi_collection(&self) -> bool {
        !self.queries.is_empty()
    }

    /// The effective parameter table, as last derived by the collector.
    #[must_use]
    pub const fn effective_parameters(&self) -> &BTreeMap<String, ParamSchema> {
        &self.all_parameters
    }
}

// Equality deliberately ignores the derived table: a freshly deserialized
// document (empty table) equals its collected twin.
impl PartialEq for StoredQueryDocument {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.description == other.description
            && self.queries == other.queries
            && self.collections == other.collections
            && self.filter == other.filter
            && self.filter_crs == other.filter_crs
            && self.filter_operator == other.filter_operator
            && self.sortby == other.sortby
            && self.properties == other.properties
            && self.crs == other.crs
            && self.vertical_crs == other.vertical_crs
            && self.max_allowable_offset == other.max_allowable_offset
            && self.limit == other.limit
            && self.offset == other.offset
            && self.profiles == other.profiles
            && self.parameters == other.parameters
    }
}

///
/// SubQuery
///
/// A restricted fragment used only in multi-collection mode. Exactly one
/// collection; joins across collections inside one sub-query are
/// unsupported by contract.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SubQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<StringOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sortby: Option<StringListOrParam>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<StringListOrParam>,
}

impl SubQuery {
    pub fn new(collection: StringOrParam) -> Self {
        Self {
            collections: vec![collection],
            filter: None,
            sortby: None,
            properties: None,
        }
    }
}

///
/// ResolvedQuery
///
/// The short-lived executable form: every placeholder collapsed to its
/// literal, the filter tree parameter-free, the offset concrete. Carries no
/// parameter table; the execution engine consumes it as-is.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedQuery {
    pub collections: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_crs: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_operator: Option<FilterOp>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sortby: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertical_crs: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_allowable_offset: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,

    pub offset: u64,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<ResolvedSubQuery>,
}

///
/// ResolvedSubQuery
///

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSubQuery {
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sortby: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_round_trips_through_json() {
        let doc = StoredQueryDocument {
            title: Some("Stations by depth".to_string()),
            collections: vec![ValueOrParameter::Literal("stations".to_string())],
            limit: Some(ValueOrParameter::parameter("limit")),
            sortby: Some(crate::param::string_list(["depth"])),
            ..StoredQueryDocument::new("stations-by-depth")
        }
        .declare("limit", ParamSchema::integer().with_default(json!(10)));

        let encoded = serde_json::to_value(&doc).unwrap();
        let decoded: StoredQueryDocument = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn derived_table_is_not_serialized_and_not_compared() {
        let mut doc = StoredQueryDocument::new("q");
        doc.collections = vec![ValueOrParameter::Literal("a".to_string())];

        let mut collected = doc.clone();
        collected
            .all_parameters
            .insert("x".to_string(), ParamSchema::string());

        assert_eq!(doc, collected);

        let encoded = serde_json::to_value(&collected).unwrap();
        assert!(encoded.get("allParameters").is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_value::<StoredQueryDocument>(json!({
            "id": "q",
            "collections": ["a"],
            "bogus": true,
        }));
        assert!(result.is_err());
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let doc = StoredQueryDocument {
            collections: vec![ValueOrParameter::Literal("a".to_string())],
            filter_crs: Some(ValueOrParameter::Literal("crs84".to_string())),
            max_allowable_offset: Some(ValueOrParameter::Literal(0.05)),
            vertical_crs: Some(ValueOrParameter::Literal("crs-v".to_string())),
            ..StoredQueryDocument::new("q")
        };

        let encoded = serde_json::to_value(&doc).unwrap();
        assert!(encoded.get("filterCrs").is_some());
        assert!(encoded.get("maxAllowableOffset").is_some());
        assert!(encoded.get("verticalCrs").is_some());
    }
}
