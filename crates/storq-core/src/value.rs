use serde_json::Value as Json;
use std::fmt;

///
/// ParamValue
///
/// A caller-supplied actual value, already parsed from request input.
/// The closed set mirrors what query parameters can carry: scalars and
/// lists of strings. Everything downstream (schema validation, filter
/// substitution) works off the JSON projection.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    String(String),
    Integer(i64),
    Double(f64),
    Bool(bool),
    StringList(Vec<String>),
}

impl ParamValue {
    /// Project into JSON for schema validation.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::String(value) => Json::String(value.clone()),
            Self::Integer(value) => Json::from(*value),
            Self::Double(value) => Json::from(*value),
            Self::Bool(value) => Json::Bool(*value),
            Self::StringList(values) => {
                Json::Array(values.iter().cloned().map(Json::String).collect())
            }
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Double(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::StringList(values) => write!(f, "{}", values.join(",")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        Self::StringList(values)
    }
}
