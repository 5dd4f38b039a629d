use crate::{ParamSchema, SchemaType};
use serde_json::Value as Json;
use thiserror::Error as ThisError;

///
/// SchemaError
///
/// First-failure validation errors for parameter values and malformed
/// declaration fragments. Callers that need exhaustive reporting accumulate
/// these; validation itself never continues past the first violation.
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("expected {expected} value, got {found}")]
    TypeMismatch { expected: SchemaType, found: String },

    #[error("value {value} is not one of the declared enum values {allowed}")]
    EnumMismatch { value: String, allowed: String },

    #[error("value {value} is below the declared minimum {minimum}")]
    BelowMinimum { value: f64, minimum: f64 },

    #[error("value {value} is above the declared maximum {maximum}")]
    AboveMaximum { value: f64, maximum: f64 },

    #[error("value {value} must be strictly greater than {bound}")]
    NotAboveExclusiveMinimum { value: f64, bound: f64 },

    #[error("value {value} must be strictly less than {bound}")]
    NotBelowExclusiveMaximum { value: f64, bound: f64 },

    #[error("string length {length} is outside the declared bounds [{min}, {max}]")]
    LengthOutOfBounds { length: u64, min: u64, max: u64 },

    #[error("string '{value}' does not contain the declared pattern '{pattern}'")]
    PatternMismatch { value: String, pattern: String },

    #[error("array length {length} is outside the declared bounds [{min}, {max}]")]
    ItemCountOutOfBounds { length: u64, min: u64, max: u64 },

    #[error("array item {index} is invalid: {source}")]
    InvalidItem {
        index: usize,
        source: Box<SchemaError>,
    },

    #[error("'$parameter' object must contain exactly one entry, found {found}")]
    MalformedParameter { found: usize },

    #[error("'$ref' must be a string, got {found}")]
    MalformedRef { found: String },

    #[error("parameter reference is not local: '{reference}'")]
    NonLocalRef { reference: String },

    #[error("malformed parameter schema: {message}")]
    MalformedSchema { message: String },
}

/// Describe a JSON value's type for error messages.
fn kind_of(value: &Json) -> String {
    match value {
        Json::Null => "null".to_string(),
        Json::Bool(_) => "boolean".to_string(),
        Json::Number(number) if number.is_i64() || number.is_u64() => "integer".to_string(),
        Json::Number(_) => "number".to_string(),
        Json::String(_) => "string".to_string(),
        Json::Array(_) => "array".to_string(),
        Json::Object(_) => "object".to_string(),
    }
}

/// Validate a JSON value against a parameter's declared schema.
///
/// Checks run in a fixed order (type, enum, numeric range, string bounds,
/// array bounds and items) and stop at the first violation.
pub fn validate_value(schema: &ParamSchema, value: &Json) -> Result<(), SchemaError> {
    check_type(schema, value)?;
    check_enum(schema, value)?;

    if let Some(number) = value.as_f64() {
        check_range(schema, number)?;
    }

    if let Some(text) = value.as_str() {
        check_string_bounds(schema, text)?;
    }

    if let Some(items) = value.as_array() {
        check_array(schema, items)?;
    }

    Ok(())
}

fn check_type(schema: &ParamSchema, value: &Json) -> Result<(), SchemaError> {
    let matches = match schema.schema_type {
        SchemaType::String => value.is_string(),
        SchemaType::Integer => value.is_i64() || value.is_u64(),
        SchemaType::Number => value.is_number(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Array => value.is_array(),
    };

    if matches {
        Ok(())
    } else {
        Err(SchemaError::TypeMismatch {
            expected: schema.schema_type,
            found: kind_of(value),
        })
    }
}

fn check_enum(schema: &ParamSchema, value: &Json) -> Result<(), SchemaError> {
    let Some(allowed) = schema.enum_values() else {
        return Ok(());
    };

    if allowed.contains(value) {
        Ok(())
    } else {
        Err(SchemaError::EnumMismatch {
            value: value.to_string(),
            allowed: Json::Array(allowed.to_vec()).to_string(),
        })
    }
}

fn check_range(schema: &ParamSchema, number: f64) -> Result<(), SchemaError> {
    if let Some(minimum) = schema.minimum
        && number < minimum
    {
        return Err(SchemaError::BelowMinimum {
            value: number,
            minimum,
        });
    }

    if let Some(maximum) = schema.maximum
        && number > maximum
    {
        return Err(SchemaError::AboveMaximum {
            value: number,
            maximum,
        });
    }

    if let Some(bound) = schema.exclusive_minimum
        && number <= bound
    {
        return Err(SchemaError::NotAboveExclusiveMinimum {
            value: number,
            bound,
        });
    }

    if let Some(bound) = schema.exclusive_maximum
        && number >= bound
    {
        return Err(SchemaError::NotBelowExclusiveMaximum {
            value: number,
            bound,
        });
    }

    Ok(())
}

fn check_string_bounds(schema: &ParamSchema, text: &str) -> Result<(), SchemaError> {
    let length = text.chars().count() as u64;
    let min = schema.min_length.unwrap_or(0);
    let max = schema.max_length.unwrap_or(u64::MAX);

    if length < min || length > max {
        return Err(SchemaError::LengthOutOfBounds { length, min, max });
    }

    if let Some(pattern) = &schema.pattern
        && !text.contains(pattern.as_str())
    {
        return Err(SchemaError::PatternMismatch {
            value: text.to_string(),
            pattern: pattern.clone(),
        });
    }

    Ok(())
}

fn check_array(schema: &ParamSchema, items: &[Json]) -> Result<(), SchemaError> {
    let length = items.len() as u64;
    let min = schema.min_items.unwrap_or(0);
    let max = schema.max_items.unwrap_or(u64::MAX);

    if length < min || length > max {
        return Err(SchemaError::ItemCountOutOfBounds { length, min, max });
    }

    if let Some(item_schema) = &schema.items {
        for (index, item) in items.iter().enumerate() {
            validate_value(item_schema, item).map_err(|source| SchemaError::InvalidItem {
                index,
                source: Box::new(source),
            })?;
        }
    }

    Ok(())
}

///
/// TESTS
///
