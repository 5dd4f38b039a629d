use crate::{
    collect,
    document::{ResolvedQuery, ResolvedSubQuery, StoredQueryDocument, SubQuery},
    param::{FilterOp, StringListOrParam, StringOrParam, ValueOrParameter},
    trace::{BindingSource, ResolveTraceEvent, ResolveTraceSink},
    value::ParamValue,
};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use storq_filter::{Expr, Scalar, SubstituteError, Substitution, substitute};
use storq_schema::{ParamSchema, ParameterValue, validate_value};
use thiserror::Error as ThisError;

///
/// Parameter resolution
///
/// The request-time pass: bind every placeholder to a supplied value or its
/// schema default, validate against the effective schema, and rewrite the
/// document into a parameter-free executable query. Runs on the hot path,
/// so it stops at the first failure.
///

///
/// ResolveRequest
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolveRequest {
    /// Caller-supplied actual values, keyed by parameter name.
    pub values: BTreeMap<String, ParamValue>,
    /// Concrete paging offset; never comes from a parameter.
    pub offset: Option<u64>,
}

impl ResolveRequest {
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

///
/// ResolveError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ResolveError {
    #[error("no value provided for parameter '{name}'")]
    MissingValue { name: String },

    #[error("parameter '{name}' has no resolvable schema (dangling or non-local reference)")]
    UnresolvableSchema { name: String },

    #[error("value {value} for parameter '{name}' violates its schema: {message}")]
    SchemaMismatch {
        name: String,
        value: String,
        message: String,
    },

    #[error("value {value} for parameter '{name}' is not usable as {expected}")]
    IncompatibleValue {
        name: String,
        value: String,
        expected: &'static str,
    },

    #[error(transparent)]
    Substitute(#[from] SubstituteError),
}

/// Resolve a document against caller-supplied values.
pub fn resolve(
    document: &StoredQueryDocument,
    request: &ResolveRequest,
) -> Result<ResolvedQuery, ResolveError> {
    Resolver::new(document, request, None).run()
}

/// Resolve with an injected trace sink; semantics identical to [`resolve`].
pub fn resolve_with_trace(
    document: &StoredQueryDocument,
    request: &ResolveRequest,
    sink: &dyn ResolveTraceSink,
) -> Result<ResolvedQuery, ResolveError> {
    let result = Resolver::new(document, request, Some(sink)).run();

    if let Err(err) = &result {
        sink.on_event(ResolveTraceEvent::ResolveFailed {
            message: err.to_string(),
        });
    }

    result
}

struct Resolver<'a> {
    document: &'a StoredQueryDocument,
    request: &'a ResolveRequest,
    sink: Option<&'a dyn ResolveTraceSink>,
    /// First-occurrence name→schema table; every binding goes through it so
    /// a later usage site cannot shadow the schema that occurs first in
    /// traversal order.
    effective: BTreeMap<String, ParamSchema>,
}

impl<'a> Resolver<'a> {
    fn new(
        document: &'a StoredQueryDocument,
        request: &'a ResolveRequest,
        sink: Option<&'a dyn ResolveTraceSink>,
    ) -> Self {
        Self {
            document,
            request,
            sink,
            effective: collect::collect(document),
        }
    }

    fn run(&self) -> Result<ResolvedQuery, ResolveError> {
        let collections = self
            .document
            .collections
            .iter()
            .map(|value| self.resolve_string(value))
            .collect::<Result<Vec<_>, _>>()?;

        let crs = self.resolve_opt_string(self.document.crs.as_ref())?;
        let vertical_crs = self.resolve_opt_string(self.document.vertical_crs.as_ref())?;
        let filter_crs = self.resolve_opt_string(self.document.filter_crs.as_ref())?;

        let filter_operator = match &self.document.filter_operator {
            None => None,
            Some(ValueOrParameter::Literal(op)) => Some(*op),
            Some(ValueOrParameter::Parameter(parameter)) => {
                Some(self.resolve_filter_op(parameter)?)
            }
        };

        let limit = match &self.document.limit {
            None => None,
            Some(ValueOrParameter::Literal(value)) => Some(*value),
            Some(ValueOrParameter::Parameter(parameter)) => Some(self.resolve_int(parameter)?),
        };

        let max_allowable_offset = match &self.document.max_allowable_offset {
            None => None,
            Some(ValueOrParameter::Literal(value)) => Some(*value),
            Some(ValueOrParameter::Parameter(parameter)) => Some(self.resolve_double(parameter)?),
        };

        let profiles = self.resolve_opt_list(self.document.profiles.as_ref())?;
        let properties = self.resolve_opt_list(self.document.properties.as_ref())?;
        let sortby = self.resolve_opt_list(self.document.sortby.as_ref())?;

        let filter = self.resolve_filter(self.document.filter.as_ref())?;

        let queries = self
            .document
            .queries
            .iter()
            .map(|query| self.resolve_sub_query(query))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedQuery {
            collections,
            filter,
            filter_crs,
            filter_operator,
            sortby,
            properties,
            crs,
            vertical_crs,
            max_allowable_offset,
            limit,
            offset: self.request.offset.or(self.document.offset).unwrap_or(0),
            profiles,
            queries,
        })
    }

    fn resolve_sub_query(&self, query: &SubQuery) -> Result<ResolvedSubQuery, ResolveError> {
        // cardinality is a store-time invariant; a template that slipped
        // past validation still resolves its first collection only
        let collection = query
            .collections
            .first()
            .map(|value| self.resolve_string(value))
            .transpose()?
            .unwrap_or_default();

        Ok(ResolvedSubQuery {
            collection,
            filter: self.resolve_filter(query.filter.as_ref())?,
            sortby: self.resolve_opt_list(query.sortby.as_ref())?,
            properties: self.resolve_opt_list(query.properties.as_ref())?,
        })
    }

    // Steps 2–3 of the resolution contract: supplied value, else schema
    // default, else a binding error; then schema validation.
    fn bind(&self, parameter: &ParameterValue) -> Result<Json, ResolveError> {
        // The effective entry wins over the site-local schema: whichever
        // occurrence comes first in traversal order governs every later
        // site that reuses the name.
        let schema = match self.effective.get(&parameter.name) {
            Some(schema) => schema,
            None => parameter.resolve_schema(&self.document.parameters).ok_or_else(|| {
                ResolveError::UnresolvableSchema {
                    name: parameter.name.clone(),
                }
            })?,
        };

        let (value, source) = match self.request.values.get(&parameter.name) {
            Some(supplied) => (supplied.to_json(), BindingSource::Supplied),
            None => match schema.default_value() {
                Some(default) => (default.clone(), BindingSource::Default),
                None => {
                    return Err(ResolveError::MissingValue {
                        name: parameter.name.clone(),
                    });
                }
            },
        };

        validate_value(schema, &value).map_err(|err| ResolveError::SchemaMismatch {
            name: parameter.name.clone(),
            value: value.to_string(),
            message: err.to_string(),
        })?;

        if let Some(sink) = self.sink {
            sink.on_event(ResolveTraceEvent::ParameterBound {
                name: parameter.name.clone(),
                source,
            });
        }

        Ok(value)
    }

    fn resolve_string(&self, value: &StringOrParam) -> Result<String, ResolveError> {
        match value {
            ValueOrParameter::Literal(literal) => Ok(literal.clone()),
            ValueOrParameter::Parameter(parameter) => {
                let json = self.bind(parameter)?;
                json.as_str().map(ToString::to_string).ok_or_else(|| {
                    incompatible(parameter, &json, "a string")
                })
            }
        }
    }

    fn resolve_opt_string(
        &self,
        value: Option<&StringOrParam>,
    ) -> Result<Option<String>, ResolveError> {
        value.map(|value| self.resolve_string(value)).transpose()
    }

    fn resolve_int(&self, parameter: &ParameterValue) -> Result<i64, ResolveError> {
        let json = self.bind(parameter)?;
        json.as_i64()
            .ok_or_else(|| incompatible(parameter, &json, "an integer"))
    }

    fn resolve_double(&self, parameter: &ParameterValue) -> Result<f64, ResolveError> {
        let json = self.bind(parameter)?;
        json.as_f64()
            .ok_or_else(|| incompatible(parameter, &json, "a number"))
    }

    // Step 4: the parse cannot fail for a validated document because the
    // declared enum is pinned to {"AND","OR"}; an unvalidated one still
    // gets a typed error instead of a panic.
    fn resolve_filter_op(&self, parameter: &ParameterValue) -> Result<FilterOp, ResolveError> {
        let json = self.bind(parameter)?;
        json.as_str()
            .and_then(|label| label.parse::<FilterOp>().ok())
            .ok_or_else(|| incompatible(parameter, &json, "a filter operator (AND or OR)"))
    }

    fn resolve_opt_list(
        &self,
        value: Option<&StringListOrParam>,
    ) -> Result<Vec<String>, ResolveError> {
        match value {
            None => Ok(Vec::new()),
            Some(ValueOrParameter::Literal(elements)) => elements
                .iter()
                .map(|element| self.resolve_string(element))
                .collect(),
            Some(ValueOrParameter::Parameter(parameter)) => {
                let json = self.bind(parameter)?;
                match json {
                    // a single string becomes a one-element list
                    Json::String(value) => Ok(vec![value]),
                    Json::Array(ref items) => items
                        .iter()
                        .map(|item| {
                            item.as_str().map(ToString::to_string).ok_or_else(|| {
                                incompatible(parameter, &json, "a list of strings")
                            })
                        })
                        .collect(),
                    other => Err(incompatible(parameter, &other, "a list of strings")),
                }
            }
        }
    }

    // The filter resolves through the filter subsystem's own visitor:
    // parameters are extracted in occurrence order, bound and validated
    // like any other, then substituted back as literals.
    fn resolve_filter(&self, filter: Option<&Expr>) -> Result<Option<Expr>, ResolveError> {
        let Some(filter) = filter else {
            return Ok(None);
        };

        let mut substitutions: BTreeMap<String, Substitution> = BTreeMap::new();
        for parameter in storq_filter::extract_parameters(filter) {
            if substitutions.contains_key(&parameter.name) {
                // first occurrence wins; later sites reuse the bound value
                continue;
            }

            let json = self.bind(parameter)?;
            let substitution = to_substitution(parameter, &json)?;
            substitutions.insert(parameter.name.clone(), substitution);
        }

        let resolved = substitute(filter, &substitutions)?;

        if let Some(sink) = self.sink {
            sink.on_event(ResolveTraceEvent::FilterSubstituted {
                parameters: substitutions.len(),
            });
        }

        Ok(Some(resolved))
    }
}

fn incompatible(parameter: &ParameterValue, value: &Json, expected: &'static str) -> ResolveError {
    ResolveError::IncompatibleValue {
        name: parameter.name.clone(),
        value: value.to_string(),
        expected,
    }
}

// Coerce a bound JSON value into the filter AST's literal node kinds.
fn to_substitution(parameter: &ParameterValue, json: &Json) -> Result<Substitution, ResolveError> {
    fn scalar(json: &Json) -> Option<Scalar> {
        match json {
            Json::Bool(value) => Some(Scalar::Bool(*value)),
            Json::Number(number) => number
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| number.as_f64().map(Scalar::Double)),
            Json::String(value) => Some(Scalar::Text(value.clone())),
            _ => None,
        }
    }

    if let Some(value) = scalar(json) {
        return Ok(Substitution::Scalar(value));
    }

    if let Json::Array(items) = json {
        let items = items
            .iter()
            .map(scalar)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| incompatible(parameter, json, "a scalar or array of scalars"))?;
        return Ok(Substitution::Array(items));
    }

    Err(incompatible(parameter, json, "a scalar or array of scalars"))
}

///
/// TESTS
///
