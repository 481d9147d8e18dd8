//! Per-model endpoint configuration.

use crate::params::is_truthy;
use crate::schema::ModelSchema;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How `update` treats the values it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Falsy values (`null`, `""`, `0`, `false`) mean "leave unchanged".
    #[default]
    SkipFalsy,
    /// Every supplied value is written, including empty strings, zero and `null`.
    ApplyPresent,
}

impl UpdatePolicy {
    /// Whether a supplied value should be written to the record.
    #[must_use]
    pub fn applies(self, value: &Value) -> bool {
        match self {
            Self::SkipFalsy => is_truthy(value),
            Self::ApplyPresent => true,
        }
    }
}

/// Options for one generated set of endpoints.
///
/// ```rust,ignore
/// let config: EndpointConfig = serde_json::from_str(r#"{"base": "books", "constraint_code": 409}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Path segment and envelope key. Defaults to the lower-cased model name.
    pub base: Option<String>,
    pub update_policy: UpdatePolicy,
    /// Code reported for constraint violations. 404 keeps existing clients working;
    /// 409 is the more precise choice.
    pub constraint_code: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base: None,
            update_policy: UpdatePolicy::default(),
            constraint_code: StatusCode::NOT_FOUND.as_u16(),
        }
    }
}

impl EndpointConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    #[must_use]
    pub fn with_constraint_code(mut self, code: u16) -> Self {
        self.constraint_code = code;
        self
    }

    /// Base name for `schema`, trimmed of surrounding slashes.
    #[must_use]
    pub fn base_for(&self, schema: &ModelSchema) -> String {
        match &self.base {
            Some(base) if !base.trim_matches('/').is_empty() => {
                base.trim_matches('/').to_string()
            }
            _ => schema.name().to_lowercase(),
        }
    }

    /// The constraint code as a status; invalid codes fall back to 404.
    #[must_use]
    pub fn constraint_status(&self) -> StatusCode {
        StatusCode::from_u16(self.constraint_code).unwrap_or(StatusCode::NOT_FOUND)
    }
}
