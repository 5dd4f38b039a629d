use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap};
use serde_json::Value as Json;
use storq_schema::ParameterValue;

///
/// Filter AST
///
/// Pure, schema-agnostic representation of filter expressions. Parameter
/// leaves are the single extension point the stored-query core consumes;
/// every other node is copied through resolution unchanged.
///

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
}

///
/// Scalar
///
/// Literal leaf values. On the wire a scalar is its bare JSON value.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl Scalar {
    fn to_json(&self) -> Json {
        match self {
            Self::Bool(value) => Json::Bool(*value),
            Self::Int(value) => Json::from(*value),
            Self::Double(value) => Json::from(*value),
            Self::Text(value) => Json::String(value.clone()),
        }
    }

    fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::Bool(value) => Some(Self::Bool(*value)),
            Json::Number(number) => number
                .as_i64()
                .map(Self::Int)
                .or_else(|| number.as_f64().map(Self::Double)),
            Json::String(value) => Some(Self::Text(value.clone())),
            _ => None,
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        Self::from_json(&json)
            .ok_or_else(|| serde::de::Error::custom(format!("expected scalar literal, got {json}")))
    }
}

///
/// Operand
///
/// The right-hand side of a comparison: a property path, a literal scalar,
/// an array of operands, or a parameter leaf awaiting substitution.
///
/// Wire shapes: `{"property": <name>}`, bare scalar, bare array, or the
/// `{"$parameter": …}` envelope.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Property(String),
    Literal(Scalar),
    Array(Vec<Operand>),
    Parameter(ParameterValue),
}

impl Operand {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Literal(Scalar::Text(value.into()))
    }

    #[must_use]
    pub const fn int(value: i64) -> Self {
        Self::Literal(Scalar::Int(value))
    }

    #[must_use]
    pub const fn double(value: f64) -> Self {
        Self::Literal(Scalar::Double(value))
    }

    #[must_use]
    pub const fn is_parameter(&self) -> bool {
        matches!(self, Self::Parameter(_))
    }

    fn from_json(json: &Json) -> Result<Self, String> {
        match json {
            Json::Object(object) if object.contains_key("$parameter") => {
                let parameter: ParameterValue = serde_json::from_value(json.clone())
                    .map_err(|err| err.to_string())?;
                Ok(Self::Parameter(parameter))
            }
            Json::Object(object) => {
                if object.len() == 1
                    && let Some(Json::String(name)) = object.get("property")
                {
                    Ok(Self::Property(name.clone()))
                } else {
                    Err(format!("expected operand, got {json}"))
                }
            }
            Json::Array(items) => {
                let items = items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::Array(items))
            }
            _ => Scalar::from_json(json)
                .map(Self::Literal)
                .ok_or_else(|| format!("expected operand, got {json}")),
        }
    }
}

impl Serialize for Operand {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Property(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("property", name)?;
                map.end()
            }
            Self::Literal(scalar) => scalar.serialize(serializer),
            Self::Array(items) => items.serialize(serializer),
            Self::Parameter(parameter) => parameter.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Operand {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

///
/// Expr
///
/// The boolean expression tree. Closed set; resolution and extraction match
/// exhaustively so a new node kind cannot be silently skipped.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    #[serde(rename_all = "camelCase")]
    Compare {
        op: CompareOp,
        property: String,
        operand: Operand,
    },
    #[serde(rename_all = "camelCase")]
    In {
        property: String,
        items: Vec<Operand>,
    },
    #[serde(rename_all = "camelCase")]
    Between {
        property: String,
        lower: Operand,
        upper: Operand,
    },
    #[serde(rename_all = "camelCase")]
    IsNull { property: String },
}

impl Expr {
    #[must_use]
    pub const fn and(children: Vec<Self>) -> Self {
        Self::And(children)
    }

    #[must_use]
    pub const fn or(children: Vec<Self>) -> Self {
        Self::Or(children)
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(inner: Self) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn eq(property: impl Into<String>, operand: Operand) -> Self {
        Self::Compare {
            op: CompareOp::Eq,
            property: property.into(),
            operand,
        }
    }

    pub fn gt(property: impl Into<String>, operand: Operand) -> Self {
        Self::Compare {
            op: CompareOp::Gt,
            property: property.into(),
            operand,
        }
    }

    pub fn lte(property: impl Into<String>, operand: Operand) -> Self {
        Self::Compare {
            op: CompareOp::Lte,
            property: property.into(),
            operand,
        }
    }

    pub fn in_(property: impl Into<String>, items: Vec<Operand>) -> Self {
        Self::In {
            property: property.into(),
            items,
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
    use storq_schema::ParamSchema;

    #[test]
    fn expr_round_trips_through_json() {
        let expr = Expr::and(vec![
            Expr::eq("kind", Operand::text("station")),
            Expr::gt("depth", Operand::double(10.5)),
            Expr::in_("state", vec![Operand::text("open"), Operand::text("planned")]),
        ]);

        let encoded = serde_json::to_value(&expr).unwrap();
        let decoded: Expr = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, expr);
    }

    #[test]
    fn parameter_operand_uses_envelope_encoding() {
        let expr = Expr::eq(
            "depth",
            Operand::Parameter(ParameterValue::inline("depth", ParamSchema::number())),
        );

        let encoded = serde_json::to_value(&expr).unwrap();
        assert_eq!(
            encoded,
            json!({
                "compare": {
                    "op": "eq",
                    "property": "depth",
                    "operand": {"$parameter": {"depth": {"type": "number"}}},
                }
            })
        );

        let decoded: Expr = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, expr);
    }

    #[test]
    fn property_operand_is_distinguished_from_text() {
        let property: Operand = serde_json::from_value(json!({"property": "name"})).unwrap();
        assert_eq!(property, Operand::property("name"));

        let text: Operand = serde_json::from_value(json!("name")).unwrap();
        assert_eq!(text, Operand::text("name"));
    }

    #[test]
    fn malformed_operand_is_rejected() {
        assert!(serde_json::from_value::<Operand>(json!({"prop": "x"})).is_err());
        assert!(serde_json::from_value::<Operand>(json!(null)).is_err());
    }
}
