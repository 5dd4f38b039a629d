use crate::{PARAMETERS_REF_PREFIX, ParamSchema, validate::SchemaError};
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap};
use serde_json::Value as Json;
use std::collections::BTreeMap;

///
/// SchemaOrRef
///
/// A parameter declaration site either carries its schema inline or points
/// into the owning document's parameter table via `#/parameters/<name>`.
/// The raw reference string is preserved so the static validator can name
/// non-local references verbatim.
///

#[derive(Clone, Debug, PartialEq)]
pub enum SchemaOrRef {
    Inline(ParamSchema),
    Ref(String),
}

impl SchemaOrRef {
    /// A local reference into the document parameter table.
    #[must_use]
    pub fn local_ref(name: &str) -> Self {
        Self::Ref(format!("{PARAMETERS_REF_PREFIX}{name}"))
    }

    /// The referenced table entry name, when the reference is local.
    #[must_use]
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Self::Inline(_) => None,
            Self::Ref(reference) => reference
                .strip_prefix(PARAMETERS_REF_PREFIX)
                .filter(|name| !name.is_empty()),
        }
    }

    #[must_use]
    pub const fn as_inline(&self) -> Option<&ParamSchema> {
        match self {
            Self::Inline(schema) => Some(schema),
            Self::Ref(_) => None,
        }
    }

    /// Resolve to an effective schema, following a local reference into the
    /// declared table. `None` when the reference is dangling or non-local.
    #[must_use]
    pub fn resolve<'a>(&'a self, table: &'a BTreeMap<String, ParamSchema>) -> Option<&'a ParamSchema> {
        match self {
            Self::Inline(schema) => Some(schema),
            Self::Ref(_) => self.local_name().and_then(|name| table.get(name)),
        }
    }
}

impl Serialize for SchemaOrRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Inline(schema) => schema.serialize(serializer),
            Self::Ref(reference) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$ref", reference)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for SchemaOrRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

impl SchemaOrRef {
    /// Decode from a JSON fragment: a `{"$ref": …}` object or an inline schema.
    pub fn from_json(json: &Json) -> Result<Self, SchemaError> {
        if let Some(object) = json.as_object()
            && object.len() == 1
            && let Some(reference) = object.get("$ref")
        {
            let reference = reference
                .as_str()
                .ok_or_else(|| SchemaError::MalformedRef {
                    found: reference.to_string(),
                })?;
            return Ok(Self::Ref(reference.to_string()));
        }

        let schema: ParamSchema =
            serde_json::from_value(json.clone()).map_err(|err| SchemaError::MalformedSchema {
                message: err.to_string(),
            })?;

        Ok(Self::Inline(schema))
    }
}

///
/// ParameterValue
///
/// A named, schema-typed placeholder. On the wire a parameter usage is the
/// envelope `{"$parameter": {"<name>": <schema>}}`; the legacy shorthand
/// `{"$parameter": {"$ref": "#/parameters/<name>"}}` decodes to a value
/// whose schema is the reference form.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterValue {
    pub name: String,
    pub schema: SchemaOrRef,
}

impl ParameterValue {
    /// A parameter declared inline at its usage site.
    pub fn inline(name: impl Into<String>, schema: ParamSchema) -> Self {
        Self {
            name: name.into(),
            schema: SchemaOrRef::Inline(schema),
        }
    }

    /// A parameter whose schema lives in the document parameter table.
    pub fn reference(name: impl Into<String>) -> Self {
        let name = name.into();
        let schema = SchemaOrRef::local_ref(&name);
        Self { name, schema }
    }

    /// Effective schema after following a local reference.
    #[must_use]
    pub fn resolve_schema<'a>(
        &'a self,
        table: &'a BTreeMap<String, ParamSchema>,
    ) -> Option<&'a ParamSchema> {
        self.schema.resolve(table)
    }

    /// Decode the inner `$parameter` object (exactly one entry).
    pub fn from_envelope(entries: &serde_json::Map<String, Json>) -> Result<Self, SchemaError> {
        if entries.len() != 1 {
            return Err(SchemaError::MalformedParameter {
                found: entries.len(),
            });
        }

        let Some((key, value)) = entries.iter().next() else {
            return Err(SchemaError::MalformedParameter { found: 0 });
        };

        if key == "$ref" {
            let reference = value.as_str().ok_or_else(|| SchemaError::MalformedRef {
                found: value.to_string(),
            })?;
            let name = reference
                .strip_prefix(PARAMETERS_REF_PREFIX)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| SchemaError::NonLocalRef {
                    reference: reference.to_string(),
                })?;

            return Ok(Self {
                name: name.to_string(),
                schema: SchemaOrRef::Ref(reference.to_string()),
            });
        }

        Ok(Self {
            name: key.clone(),
            schema: SchemaOrRef::from_json(value)?,
        })
    }
}

// Wire envelope: {"$parameter": {"<name>": <schema>}}. Serialization is
// normalizing: the legacy `$ref` shorthand never round-trips back out.
impl Serialize for ParameterValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut inner = serde_json::Map::with_capacity(1);
        let schema = serde_json::to_value(&self.schema).map_err(serde::ser::Error::custom)?;
        inner.insert(self.name.clone(), schema);

        let mut outer = serializer.serialize_map(Some(1))?;
        outer.serialize_entry("$parameter", &inner)?;
        outer.end()
    }
}

impl<'de> Deserialize<'de> for ParameterValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct EnvelopeWire {
            #[serde(rename = "$parameter")]
            parameter: serde_json::Map<String, Json>,
        }

        let wire = EnvelopeWire::deserialize(deserializer)?;
        Self::from_envelope(&wire.parameter).map_err(serde::de::Error::custom)
    }
}

/// True when a JSON fragment is a `$parameter` envelope rather than a literal.
#[must_use]
pub fn is_parameter_envelope(json: &Json) -> bool {
    json.as_object().is_some_and(|object| object.contains_key("$parameter"))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inline_parameter_round_trips() {
        let param = ParameterValue::inline("limit", ParamSchema::integer());
        let encoded = serde_json::to_value(&param).unwrap();
        assert_eq!(encoded, json!({"$parameter": {"limit": {"type": "integer"}}}));

        let decoded: ParameterValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, param);
    }

    #[test]
    fn reference_parameter_round_trips() {
        let param = ParameterValue::reference("bbox");
        let encoded = serde_json::to_value(&param).unwrap();
        assert_eq!(
            encoded,
            json!({"$parameter": {"bbox": {"$ref": "#/parameters/bbox"}}})
        );

        let decoded: ParameterValue = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, param);
    }

    #[test]
    fn legacy_ref_shorthand_normalizes() {
        let decoded: ParameterValue =
            serde_json::from_value(json!({"$parameter": {"$ref": "#/parameters/limit"}})).unwrap();

        assert_eq!(decoded.name, "limit");
        assert_eq!(decoded.schema, SchemaOrRef::Ref("#/parameters/limit".into()));

        // re-serialization emits the normalized form
        let encoded = serde_json::to_value(&decoded).unwrap();
        assert_eq!(
            encoded,
            json!({"$parameter": {"limit": {"$ref": "#/parameters/limit"}}})
        );
    }

    #[test]
    fn legacy_shorthand_rejects_non_local_refs() {
        let result = serde_json::from_value::<ParameterValue>(
            json!({"$parameter": {"$ref": "https://example.com/schema.json"}}),
        );
        assert!(result.is_err());
    }

    #[test]
    fn envelope_with_two_entries_is_rejected() {
        let result = serde_json::from_value::<ParameterValue>(json!({
            "$parameter": {
                "a": {"type": "string"},
                "b": {"type": "string"},
            }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn non_local_ref_is_preserved_for_validation() {
        let schema =
            SchemaOrRef::from_json(&json!({"$ref": "https://example.com/x.json"})).unwrap();
        assert_eq!(schema.local_name(), None);
        assert_eq!(schema, SchemaOrRef::Ref("https://example.com/x.json".into()));
    }

    #[test]
    fn resolve_follows_local_refs() {
        let mut table = BTreeMap::new();
        table.insert("limit".to_string(), ParamSchema::integer());

        let param = ParameterValue::reference("limit");
        assert_eq!(param.resolve_schema(&table), Some(&ParamSchema::integer()));

        let dangling = ParameterValue::reference("missing");
        assert_eq!(dangling.resolve_schema(&table), None);
    }
}
