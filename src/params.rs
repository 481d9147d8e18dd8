//! Request parameters and their coercion against a schema.
//!
//! Callers hand the generator a loose [`Params`] map (from a JSON body, a query
//! string or a path segment). [`validate`] turns it into [`FieldValues`], where
//! every entry names a known mutable field and carries a value of that field's type.

use crate::errors::CrudError;
use crate::schema::{Field, FieldType, ModelSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Raw request parameters keyed by field name. Absent fields are simply missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Copy every entry of `other` into `self`, replacing existing keys.
    pub fn merge(&mut self, other: Params) {
        self.0.extend(other.0);
    }

    /// Parameters from a decoded query string; every value is a string.
    #[must_use]
    pub fn from_query(query: BTreeMap<String, String>) -> Self {
        Self(
            query
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
        )
    }

    /// Parameters from a JSON document, which must be an object.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Parameters checked against a schema.
#[derive(Debug, Clone)]
pub struct FieldValues<'s> {
    entries: Vec<(&'s Field, Value)>,
}

impl<'s> FieldValues<'s> {
    pub fn iter(&self) -> impl Iterator<Item = &(&'s Field, Value)> {
        self.entries.iter()
    }

    /// Keep only the entries accepted by `keep`.
    #[must_use]
    pub fn retain(mut self, mut keep: impl FnMut(&Value) -> bool) -> Self {
        self.entries.retain(|(_, value)| keep(value));
        self
    }

    /// Field name to value mapping, ready for the store.
    #[must_use]
    pub fn into_record(self) -> Map<String, Value> {
        self.entries
            .into_iter()
            .map(|(field, value)| (field.name().to_string(), value))
            .collect()
    }
}

/// Check `params` against the mutable fields of `schema`.
///
/// All problems are reported, not only the first.
///
/// # Errors
///
/// One bad-request [`CrudError`] per unknown field, per attempt to assign the
/// primary key and per value that does not coerce to its field type.
pub fn validate<'s>(
    schema: &'s ModelSchema,
    params: &Params,
) -> Result<FieldValues<'s>, Vec<CrudError>> {
    let mut entries = Vec::with_capacity(params.0.len());
    let mut errors = Vec::new();

    for (name, raw) in params.iter() {
        let Some(field) = schema.field(name) else {
            errors.push(CrudError::bad_request(format!(
                "{name} is not a field of {}",
                schema.name()
            )));
            continue;
        };
        if field.is_primary_key() {
            errors.push(CrudError::bad_request(format!(
                "{name} cannot be set on create"
            )));
            continue;
        }
        match coerce(field.kind(), raw) {
            Some(value) => entries.push((field, value)),
            None => errors.push(CrudError::invalid_value(name, raw)),
        }
    }

    if errors.is_empty() {
        Ok(FieldValues { entries })
    } else {
        Err(errors)
    }
}

/// Convert a raw parameter into the JSON representation of `kind`.
///
/// Strings coming from paths and query strings are parsed; `null` is accepted for
/// every type. Returns `None` when the value cannot represent the type.
#[must_use]
pub fn coerce(kind: FieldType, raw: &Value) -> Option<Value> {
    if raw.is_null() {
        return Some(Value::Null);
    }
    match kind {
        FieldType::Integer => match raw {
            Value::Number(n) => n.as_i64().map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        FieldType::Float => {
            let parsed = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed.and_then(Number::from_f64).map(Value::Number)
        }
        FieldType::Text => match raw {
            Value::String(_) => Some(raw.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        FieldType::Boolean => match raw {
            Value::Bool(_) => Some(raw.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        FieldType::Uuid => match raw {
            Value::String(s) => Uuid::parse_str(s.trim())
                .ok()
                .map(|id| Value::String(id.hyphenated().to_string())),
            _ => None,
        },
    }
}

/// Whether a value counts as "set": null, empty strings, zero and `false` do not.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Render a value for an error message: strings without quotes, everything else as JSON.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
