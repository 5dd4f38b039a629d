use crate::{
    document::{StoredQueryDocument, SubQuery},
    param::{StringListOrParam, StringOrParam, ValueOrParameter},
};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use storq_schema::{ParamSchema, ParameterValue};

///
/// Parameter collection
///
/// A deterministic depth-first walk over every field of a document, in a
/// fixed order that is part of the contract: collections, crs, verticalCrs,
/// filterCrs, filterOperator, limit, maxAllowableOffset, profiles,
/// properties, sortby, filter, then each sub-query in order (collections,
/// properties, sortby, filter). When the same parameter name occurs at more
/// than one site, the schema from its first occurrence wins.
///

///
/// ExpectedKind
///
/// The value shape a usage site demands; the static validator checks the
/// declared schema against it.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpectedKind {
    String,
    Integer,
    Number,
    Operator,
    StringList,
    /// Filter-embedded parameters: any scalar or array shape.
    Any,
}

///
/// Usage
///
/// One parameter occurrence: where it sits, what shape that site demands,
/// and the reference itself.
///

#[derive(Debug)]
pub struct Usage<'a> {
    pub path: String,
    pub expected: ExpectedKind,
    pub parameter: &'a ParameterValue,
}

/// Visit every parameter usage in the contractual fixed order.
pub fn walk_parameters<'a>(
    document: &'a StoredQueryDocument,
    visit: &mut impl FnMut(Usage<'a>),
) {
    for (index, collection) in document.collections.iter().enumerate() {
        visit_string(collection, format!("collections[{index}]"), visit);
    }

    visit_opt_string(document.crs.as_ref(), "crs", visit);
    visit_opt_string(document.vertical_crs.as_ref(), "verticalCrs", visit);
    visit_opt_string(document.filter_crs.as_ref(), "filterCrs", visit);

    if let Some(ValueOrParameter::Parameter(parameter)) = &document.filter_operator {
        visit(Usage {
            path: "filterOperator".to_string(),
            expected: ExpectedKind::Operator,
            parameter,
        });
    }

    if let Some(ValueOrParameter::Parameter(parameter)) = &document.limit {
        visit(Usage {
            path: "limit".to_string(),
            expected: ExpectedKind::Integer,
            parameter,
        });
    }

    if let Some(ValueOrParameter::Parameter(parameter)) = &document.max_allowable_offset {
        visit(Usage {
            path: "maxAllowableOffset".to_string(),
            expected: ExpectedKind::Number,
            parameter,
        });
    }

    visit_opt_list(document.profiles.as_ref(), "profiles", visit);
    visit_opt_list(document.properties.as_ref(), "properties", visit);
    visit_opt_list(document.sortby.as_ref(), "sortby", visit);

    if let Some(filter) = &document.filter {
        for parameter in storq_filter::extract_parameters(filter) {
            visit(Usage {
                path: "filter".to_string(),
                expected: ExpectedKind::Any,
                parameter,
            });
        }
    }

    for (index, query) in document.queries.iter().enumerate() {
        walk_sub_query(query, index, visit);
    }
}

fn walk_sub_query<'a>(query: &'a SubQuery, index: usize, visit: &mut impl FnMut(Usage<'a>)) {
    let prefix = format!("queries[{index}]");

    for (position, collection) in query.collections.iter().enumerate() {
        visit_string(
            collection,
            format!("{prefix}.collections[{position}]"),
            visit,
        );
    }

    visit_opt_list(query.properties.as_ref(), &format!("{prefix}.properties"), visit);
    visit_opt_list(query.sortby.as_ref(), &format!("{prefix}.sortby"), visit);

    if let Some(filter) = &query.filter {
        for parameter in storq_filter::extract_parameters(filter) {
            visit(Usage {
                path: format!("{prefix}.filter"),
                expected: ExpectedKind::Any,
                parameter,
            });
        }
    }
}

fn visit_string<'a>(
    value: &'a StringOrParam,
    path: String,
    visit: &mut impl FnMut(Usage<'a>),
) {
    if let ValueOrParameter::Parameter(parameter) = value {
        visit(Usage {
            path,
            expected: ExpectedKind::String,
            parameter,
        });
    }
}

fn visit_opt_string<'a>(
    value: Option<&'a StringOrParam>,
    path: &str,
    visit: &mut impl FnMut(Usage<'a>),
) {
    if let Some(ValueOrParameter::Parameter(parameter)) = value {
        visit(Usage {
            path: path.to_string(),
            expected: ExpectedKind::String,
            parameter,
        });
    }
}

fn visit_opt_list<'a>(
    value: Option<&'a StringListOrParam>,
    path: &str,
    visit: &mut impl FnMut(Usage<'a>),
) {
    match value {
        None => {}
        Some(ValueOrParameter::Parameter(parameter)) => visit(Usage {
            path: path.to_string(),
            expected: ExpectedKind::StringList,
            parameter,
        }),
        Some(ValueOrParameter::Literal(elements)) => {
            for (index, element) in elements.iter().enumerate() {
                if let ValueOrParameter::Parameter(parameter) = element {
                    let mut element_path = path.to_string();
                    let _ = write!(element_path, "[{index}]");
                    visit(Usage {
                        path: element_path,
                        expected: ExpectedKind::String,
                        parameter,
                    });
                }
            }
        }
    }
}

/// Gather the effective name→schema table for a document.
///
/// Reference schemas resolve through the declared table; a dangling or
/// non-local reference contributes nothing here (the static validator
/// reports it). First occurrence wins for duplicate names.
#[must_use]
pub fn collect(document: &StoredQueryDocument) -> BTreeMap<String, ParamSchema> {
    let mut table = BTreeMap::new();

    walk_parameters(document, &mut |usage| {
        if let Some(schema) = usage.parameter.resolve_schema(&document.parameters) {
            table
                .entry(usage.parameter.name.clone())
                .or_insert_with(|| schema.clone());
        }
    });

    table
}

/// Recompute the document's derived `all_parameters` table in place.
pub fn refresh(document: &mut StoredQueryDocument) {
    document.all_parameters = collect(document);
}

///
/// TESTS
///
