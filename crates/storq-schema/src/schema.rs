use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

///
/// SchemaType
///
/// The JSON Schema type keywords a parameter declaration may carry.
/// The set is closed: stored-query parameters are scalars or arrays of
/// scalars, nothing else.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
        };
        write!(f, "{label}")
    }
}

///
/// ParamSchema
///
/// A parameter's declared JSON Schema fragment. Only the keywords the
/// stored-query subsystem consumes are modelled; unknown keywords are
/// rejected at deserialization so documents round-trip field-for-field.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSchema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Json>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[serde(
        rename = "exclusiveMinimum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exclusive_minimum: Option<f64>,

    #[serde(
        rename = "exclusiveMaximum",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exclusive_maximum: Option<f64>,

    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    /// Literal substring constraint on string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(rename = "minItems", default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,

    #[serde(rename = "maxItems", default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParamSchema>>,
}

impl ParamSchema {
    /// Construct a bare schema of the given type with no constraints.
    #[must_use]
    pub const fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            title: None,
            description: None,
            enum_values: None,
            default: None,
            minimum: None,
            maximum: None,
            exclusive_minimum: None,
            exclusive_maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
            min_items: None,
            max_items: None,
            items: None,
        }
    }

    #[must_use]
    pub const fn string() -> Self {
        Self::of(SchemaType::String)
    }

    #[must_use]
    pub const fn integer() -> Self {
        Self::of(SchemaType::Integer)
    }

    #[must_use]
    pub const fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    #[must_use]
    pub const fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    /// An array schema with the given item schema.
    #[must_use]
    pub fn array_of(items: Self) -> Self {
        let mut schema = Self::of(SchemaType::Array);
        schema.items = Some(Box::new(items));
        schema
    }

    #[must_use]
    pub fn with_default(mut self, default: Json) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn with_enum(mut self, values: Vec<Json>) -> Self {
        self.enum_values = Some(values);
        self
    }

    #[must_use]
    pub const fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self.schema_type, SchemaType::String)
    }

    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self.schema_type, SchemaType::Integer)
    }

    /// Integer schemas are assignable wherever a number is expected.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self.schema_type, SchemaType::Integer | SchemaType::Number)
    }

    #[must_use]
    pub const fn is_boolean(&self) -> bool {
        matches!(self.schema_type, SchemaType::Boolean)
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self.schema_type, SchemaType::Array)
    }

    /// True when the schema is an array whose items are strings (or the
    /// item schema is omitted, which leaves items unconstrained).
    #[must_use]
    pub fn is_string_array(&self) -> bool {
        self.is_array()
            && self
                .items
                .as_ref()
                .is_none_or(|items| items.is_string())
    }

    /// Declared enum values, if any.
    #[must_use]
    pub fn enum_values(&self) -> Option<&[Json]> {
        self.enum_values.as_deref()
    }

    /// Declared default value, if any.
    #[must_use]
    pub const fn default_value(&self) -> Option<&Json> {
        self.default.as_ref()
    }
}
