use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;
use std::{fmt, str::FromStr};
use storq_schema::{ParamSchema, ParameterValue, param::is_parameter_envelope};
use thiserror::Error as ThisError;

///
/// ValueOrParameter
///
/// The literal-or-parameter tagged union at the heart of a stored query.
/// Exactly one payload is ever present; the wire codec enforces this at
/// construction, so the rest of the crate matches exhaustively without
/// defensive checks.
///
/// Wire contract: a literal is its bare JSON value, a parameter is the
/// `{"$parameter": …}` envelope.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ValueOrParameter<T> {
    Literal(T),
    Parameter(ParameterValue),
}

impl<T> ValueOrParameter<T> {
    /// A parameter whose schema lives in the document parameter table.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(ParameterValue::reference(name))
    }

    /// A parameter declared inline at the usage site.
    pub fn inline(name: impl Into<String>, schema: ParamSchema) -> Self {
        Self::Parameter(ParameterValue::inline(name, schema))
    }

    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }

    #[must_use]
    pub const fn is_parameter(&self) -> bool {
        matches!(self, Self::Parameter(_))
    }

    #[must_use]
    pub const fn as_literal(&self) -> Option<&T> {
        match self {
            Self::Literal(value) => Some(value),
            Self::Parameter(_) => None,
        }
    }

    #[must_use]
    pub const fn as_parameter(&self) -> Option<&ParameterValue> {
        match self {
            Self::Literal(_) => None,
            Self::Parameter(parameter) => Some(parameter),
        }
    }
}

impl<T> From<T> for ValueOrParameter<T> {
    fn from(value: T) -> Self {
        Self::Literal(value)
    }
}

impl<T> Serialize for ValueOrParameter<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Literal(value) => value.serialize(serializer),
            Self::Parameter(parameter) => parameter.serialize(serializer),
        }
    }
}

impl<'de, T> Deserialize<'de> for ValueOrParameter<T>
where
    T: serde::de::DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;

        if is_parameter_envelope(&json) {
            let parameter: ParameterValue =
                serde_json::from_value(json).map_err(serde::de::Error::custom)?;
            return Ok(Self::Parameter(parameter));
        }

        let literal: T = serde_json::from_value(json).map_err(serde::de::Error::custom)?;
        Ok(Self::Literal(literal))
    }
}

/// A string field that may be a parameter.
pub type StringOrParam = ValueOrParameter<String>;

/// A list field whose elements may each independently be parameters, or
/// whose whole value may be a single parameter resolving to a list.
pub type StringListOrParam = ValueOrParameter<Vec<StringOrParam>>;

/// Build a literal list of literal strings.
#[must_use]
pub fn string_list<I, S>(values: I) -> StringListOrParam
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ValueOrParameter::Literal(
        values
            .into_iter()
            .map(|value| ValueOrParameter::Literal(value.into()))
            .collect(),
    )
}

///
/// FilterOp
///
/// How multiple filters combine. The permissible literal set is fixed here,
/// but a parameter used in this position is constrained by the *declared*
/// schema enum, which the static validator pins to exactly this set.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl FilterOp {
    /// The exact enum a filter-operator parameter schema must declare.
    pub const ALLOWED: [&'static str; 2] = ["AND", "OR"];
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::And => "AND",
            Self::Or => "OR",
        };
        write!(f, "{label}")
    }
}

///
/// ParseFilterOpError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("invalid filter operator '{found}', expected AND or OR")]
pub struct ParseFilterOpError {
    pub found: String,
}

impl FromStr for FilterOp {
    type Err = ParseFilterOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            other => Err(ParseFilterOpError {
                found: other.to_string(),
            }),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_serializes_as_bare_value() {
        let limit: ValueOrParameter<i64> = ValueOrParameter::Literal(10);
        assert_eq!(serde_json::to_value(&limit).unwrap(), json!(10));

        let decoded: ValueOrParameter<i64> = serde_json::from_value(json!(10)).unwrap();
        assert_eq!(decoded, limit);
    }

    #[test]
    fn parameter_serializes_as_envelope() {
        let limit: ValueOrParameter<i64> =
            ValueOrParameter::inline("limit", ParamSchema::integer());
        let encoded = serde_json::to_value(&limit).unwrap();
        assert_eq!(encoded, json!({"$parameter": {"limit": {"type": "integer"}}}));

        let decoded: ValueOrParameter<i64> = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, limit);
    }

    #[test]
    fn list_elements_may_be_parameters_independently() {
        let json = json!(["depth", {"$parameter": {"extra": {"type": "string"}}}]);
        let decoded: StringListOrParam = serde_json::from_value(json.clone()).unwrap();

        let ValueOrParameter::Literal(elements) = &decoded else {
            panic!("expected literal list");
        };
        assert!(elements[0].is_literal());
        assert!(elements[1].is_parameter());

        assert_eq!(serde_json::to_value(&decoded).unwrap(), json);
    }

    #[test]
    fn whole_list_may_be_one_parameter() {
        let json = json!({"$parameter": {"props": {
            "type": "array",
            "items": {"type": "string"},
        }}});
        let decoded: StringListOrParam = serde_json::from_value(json).unwrap();
        assert!(decoded.is_parameter());
    }

    #[test]
    fn filter_op_parses_exact_case_only() {
        assert_eq!("AND".parse::<FilterOp>(), Ok(FilterOp::And));
        assert_eq!("OR".parse::<FilterOp>(), Ok(FilterOp::Or));
        assert!("and".parse::<FilterOp>().is_err());
        assert!("XOR".parse::<FilterOp>().is_err());
    }

    #[test]
    fn malformed_envelope_is_a_structural_error() {
        let result = serde_json::from_value::<ValueOrParameter<i64>>(json!({"$parameter": {}}));
        assert!(result.is_err());
    }
}
