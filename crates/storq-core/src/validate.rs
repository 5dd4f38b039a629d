use crate::{
    collect::{self, ExpectedKind, Usage, walk_parameters},
    document::StoredQueryDocument,
    resolve::{ResolveRequest, resolve},
};
use serde_json::Value as Json;
use storq_schema::{ParamSchema, SchemaOrRef, validate_value};
use thiserror::Error as ThisError;

///
/// Static validation
///
/// The definition-time pass. Unlike resolution it accumulates: an operator
/// storing a document sees every problem at once, and an invalid document
/// never reaches the request path.
///

///
/// ValidationLevel
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ValidationLevel {
    /// Structural and declaration checks only.
    Static,
    /// Additionally dry-run resolution with schema defaults when every
    /// effective parameter declares one.
    #[default]
    Deep,
}

///
/// ValidationError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ValidationError {
    #[error("document must use either a single collection or sub-queries, not both")]
    MixedMode,

    #[error("single-collection mode requires exactly one collection, found {found}")]
    CollectionCardinality { found: usize },

    #[error(
        "sub-query {index} has {found} collections; join queries across multiple collections are not supported"
    )]
    JoinUnsupported { index: usize, found: usize },

    #[error("sub-query {index} declares no collection")]
    SubQueryMissingCollection { index: usize },

    #[error("{path}: parameter reference is not local: '{reference}'")]
    NonLocalRef { path: String, reference: String },

    #[error("{path}: parameter reference '{reference}' names no declared parameter '{name}'")]
    UndeclaredParameter {
        path: String,
        reference: String,
        name: String,
    },

    #[error("{path}: parameter '{name}' must declare a {expected} schema, found {found}")]
    TypeIncompatible {
        path: String,
        name: String,
        expected: &'static str,
        found: String,
    },

    #[error(
        "{path}: filter-operator parameter '{name}' must enumerate exactly [\"AND\",\"OR\"] but declares no enum"
    )]
    OperatorEnumMissing { path: String, name: String },

    #[error(
        "{path}: filter-operator parameter '{name}' must enumerate exactly 2 values [\"AND\",\"OR\"], found {declared}: {values}"
    )]
    OperatorEnumCardinality {
        path: String,
        name: String,
        declared: usize,
        values: String,
    },

    #[error(
        "{path}: filter-operator parameter '{name}' must enumerate exactly [\"AND\",\"OR\"], found {values}"
    )]
    OperatorEnumValues {
        path: String,
        name: String,
        values: String,
    },

    #[error("parameter '{name}' default value {value} violates its own schema: {message}")]
    DefaultViolatesSchema {
        name: String,
        value: String,
        message: String,
    },

    #[error("the stored query is invalid with its default parameter values: {message}")]
    InvalidWithDefaults { message: String },
}

/// Validate with the default (deep) level.
#[must_use]
pub fn validate(document: &StoredQueryDocument) -> Vec<ValidationError> {
    validate_with(document, ValidationLevel::default())
}

/// Validate a document, accumulating every error found.
#[must_use]
pub fn validate_with(
    document: &StoredQueryDocument,
    level: ValidationLevel,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_cardinality(document, &mut errors);

    walk_parameters(document, &mut |usage| {
        check_usage(document, &usage, &mut errors);
    });

    check_defaults(document, &mut errors);

    // The dry run only makes sense for an otherwise-valid document.
    if level == ValidationLevel::Deep && errors.is_empty() {
        check_with_defaults(document, &mut errors);
    }

    errors
}

// Single-collection and multi-collection mode are mutually exclusive.
fn check_cardinality(document: &StoredQueryDocument, errors: &mut Vec<ValidationError>) {
    if document.queries.is_empty() {
        if document.collections.len() != 1 {
            errors.push(ValidationError::CollectionCardinality {
                found: document.collections.len(),
            });
        }
    } else if !document.collections.is_empty() {
        errors.push(ValidationError::MixedMode);
    }

    for (index, query) in document.queries.iter().enumerate() {
        match query.collections.len() {
            0 => errors.push(ValidationError::SubQueryMissingCollection { index }),
            1 => {}
            found => errors.push(ValidationError::JoinUnsupported { index, found }),
        }
    }
}

fn check_usage(
    document: &StoredQueryDocument,
    usage: &Usage<'_>,
    errors: &mut Vec<ValidationError>,
) {
    let name = &usage.parameter.name;

    let schema = match &usage.parameter.schema {
        SchemaOrRef::Inline(schema) => schema,
        SchemaOrRef::Ref(reference) => {
            let Some(target) = usage.parameter.schema.local_name() else {
                errors.push(ValidationError::NonLocalRef {
                    path: usage.path.clone(),
                    reference: reference.clone(),
                });
                return;
            };

            let Some(schema) = document.parameters.get(target) else {
                errors.push(ValidationError::UndeclaredParameter {
                    path: usage.path.clone(),
                    reference: reference.clone(),
                    name: target.to_string(),
                });
                return;
            };

            schema
        }
    };

    check_compatibility(usage, name, schema, errors);
}

// Is the declared schema assignable to the shape the usage site expects?
fn check_compatibility(
    usage: &Usage<'_>,
    name: &str,
    schema: &ParamSchema,
    errors: &mut Vec<ValidationError>,
) {
    let push_incompatible = |errors: &mut Vec<ValidationError>, expected: &'static str| {
        errors.push(ValidationError::TypeIncompatible {
            path: usage.path.clone(),
            name: name.to_string(),
            expected,
            found: schema.schema_type.to_string(),
        });
    };

    match usage.expected {
        ExpectedKind::String => {
            if !schema.is_string() {
                push_incompatible(errors, "string");
            }
        }
        ExpectedKind::Integer => {
            if !schema.is_integer() {
                push_incompatible(errors, "integer");
            }
        }
        ExpectedKind::Number => {
            if !schema.is_numeric() {
                push_incompatible(errors, "number");
            }
        }
        ExpectedKind::StringList => {
            // a single string coerces to a one-element list at resolution
            if !schema.is_string() && !schema.is_string_array() {
                push_incompatible(errors, "string or array-of-string");
            }
        }
        ExpectedKind::Operator => check_operator_enum(usage, name, schema, errors),
        ExpectedKind::Any => {}
    }
}

// The declared enum must be exactly the two-element set {"AND","OR"}.
fn check_operator_enum(
    usage: &Usage<'_>,
    name: &str,
    schema: &ParamSchema,
    errors: &mut Vec<ValidationError>,
) {
    if !schema.is_string() {
        errors.push(ValidationError::TypeIncompatible {
            path: usage.path.clone(),
            name: name.to_string(),
            expected: "string",
            found: schema.schema_type.to_string(),
        });
        return;
    }

    let Some(declared) = schema.enum_values() else {
        errors.push(ValidationError::OperatorEnumMissing {
            path: usage.path.clone(),
            name: name.to_string(),
        });
        return;
    };

    let values = Json::Array(declared.to_vec()).to_string();

    if declared.len() != 2 {
        errors.push(ValidationError::OperatorEnumCardinality {
            path: usage.path.clone(),
            name: name.to_string(),
            declared: declared.len(),
            values,
        });
        return;
    }

    let matches = |label: &str| declared.iter().any(|value| value.as_str() == Some(label));
    if !(matches("AND") && matches("OR")) {
        errors.push(ValidationError::OperatorEnumValues {
            path: usage.path.clone(),
            name: name.to_string(),
            values,
        });
    }
}

// Every declared default must pass the schema that declares it.
fn check_defaults(document: &StoredQueryDocument, errors: &mut Vec<ValidationError>) {
    for (name, schema) in collect::collect(document) {
        if let Some(default) = schema.default_value()
            && let Err(err) = validate_value(&schema, default)
        {
            errors.push(ValidationError::DefaultViolatesSchema {
                name,
                value: default.to_string(),
                message: err.to_string(),
            });
        }
    }
}

// With a default for every effective parameter, a full resolution must
// succeed; anything it would reject surfaces at store time instead of on
// the first real request.
fn check_with_defaults(document: &StoredQueryDocument, errors: &mut Vec<ValidationError>) {
    let effective = collect::collect(document);

    let all_defaulted = effective
        .values()
        .all(|schema| schema.default_value().is_some());
    if !all_defaulted {
        return;
    }

    if let Err(err) = resolve(document, &ResolveRequest::default()) {
        errors.push(ValidationError::InvalidWithDefaults {
            message: err.to_string(),
        });
    }
}

///
/// TESTS
///
