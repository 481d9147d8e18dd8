//! The uniform response wrapper.
//!
//! Every operation answers with `{"<base>": {"success": <data>}}` or
//! `{"<base>": {"errors": [{"message": ..., "code": ...}, ...]}}`.

use crate::errors::CrudError;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One entry of an `errors` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    pub code: u16,
}

/// Payload of an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// A serialized record, or a list of them.
    Success(Value),
    Errors(Vec<ErrorEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    base: String,
    outcome: Outcome,
}

impl Envelope {
    pub fn success(base: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            base: base.into(),
            outcome: Outcome::Success(data.into()),
        }
    }

    pub fn errors(base: impl Into<String>, errors: Vec<ErrorEntry>) -> Self {
        Self {
            base: base.into(),
            outcome: Outcome::Errors(errors),
        }
    }

    /// Build an error envelope, logging any internal failures on the way.
    pub fn from_errors(base: impl Into<String>, errors: Vec<CrudError>) -> Self {
        Self::errors(base, errors.into_iter().map(ErrorEntry::from).collect())
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// The success payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(data) => Some(data),
            Outcome::Errors(_) => None,
        }
    }

    /// The error entries; empty on success.
    #[must_use]
    pub fn error_entries(&self) -> &[ErrorEntry] {
        match &self.outcome {
            Outcome::Success(_) => &[],
            Outcome::Errors(errors) => errors,
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.base, &self.outcome)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = BTreeMap::<String, Outcome>::deserialize(deserializer)?;
        let mut entries = map.into_iter();
        match (entries.next(), entries.next()) {
            (Some((base, outcome)), None) => Ok(Self { base, outcome }),
            _ => Err(de::Error::custom(
                "an envelope holds exactly one base name",
            )),
        }
    }
}

/// Envelopes always travel as HTTP 200; failures are described in the body.
impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
