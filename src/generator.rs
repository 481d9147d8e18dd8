//! # Endpoint Generator
//!
//! [`Endpoints`] binds the four CRUD operations to one model. It is built once per
//! model from the schema, a store and an [`EndpointConfig`]; every call after that
//! is stateless.
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | POST | `/{base}` | [`Endpoints::create`] |
//! | GET | `/{base}`, `/{base}/{key}` | [`Endpoints::read`] |
//! | PUT | `/{base}`, `/{base}/{key}` | [`Endpoints::update`] |
//! | DELETE | `/{base}`, `/{base}/{key}` | [`Endpoints::delete`] |
//!
//! Every operation answers with an [`Envelope`]: the serialized record(s) on
//! success, the collected `{message, code}` entries otherwise.

use crate::config::EndpointConfig;
use crate::envelope::Envelope;
use crate::errors::{CrudError, StoreError};
use crate::params::{FieldValues, Params, coerce, display_value, is_truthy, validate};
use crate::schema::{FieldType, ModelSchema};
use crate::store::{Record, Store};
use axum::http::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// The four generated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::Create => Method::POST,
            Self::Read => Method::GET,
            Self::Update => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

/// One registered (method, path) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub operation: Operation,
    pub method: Method,
    pub path: String,
    /// Whether the path carries the record key as its last segment.
    pub keyed: bool,
}

/// CRUD operations generated for one model.
pub struct Endpoints {
    schema: Arc<ModelSchema>,
    store: Arc<dyn Store>,
    config: EndpointConfig,
    base: String,
    all_fields: Vec<String>,
    primary_key: String,
    mutable_fields: Vec<String>,
    key_defaults: Map<String, Value>,
    field_defaults: Map<String, Value>,
}

impl Endpoints {
    pub fn new(schema: Arc<ModelSchema>, store: Arc<dyn Store>, config: EndpointConfig) -> Self {
        let base = config.base_for(&schema);
        let all_fields = schema
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        let primary_key = schema.primary_key().name().to_string();
        let mutable_fields: Vec<String> = schema
            .mutable_fields()
            .map(|f| f.name().to_string())
            .collect();
        let key_defaults = Map::from_iter([(primary_key.clone(), Value::Null)]);
        let field_defaults = mutable_fields
            .iter()
            .map(|name| (name.clone(), Value::Null))
            .collect();

        Self {
            schema,
            store,
            config,
            base,
            all_fields,
            primary_key,
            mutable_fields,
            key_defaults,
            field_defaults,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    #[must_use]
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Path segment and envelope key.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn all_fields(&self) -> &[String] {
        &self.all_fields
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Fields accepted by create and update.
    #[must_use]
    pub fn mutable_fields(&self) -> &[String] {
        &self.mutable_fields
    }

    /// Default for the optional read key: `{pk: null}`.
    #[must_use]
    pub fn key_defaults(&self) -> &Map<String, Value> {
        &self.key_defaults
    }

    /// Defaults for update: every mutable field is optional and `null` when omitted.
    #[must_use]
    pub fn field_defaults(&self) -> &Map<String, Value> {
        &self.field_defaults
    }

    /// Every (method, path) pair served for this model.
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        let collection = format!("/{}", self.base);
        let member = format!("/{}/{{{}}}", self.base, self.primary_key);
        let mut routes = vec![Route {
            operation: Operation::Create,
            method: Method::POST,
            path: collection.clone(),
            keyed: false,
        }];
        for operation in [Operation::Read, Operation::Update, Operation::Delete] {
            for (path, keyed) in [(&collection, false), (&member, true)] {
                routes.push(Route {
                    operation,
                    method: operation.method(),
                    path: path.clone(),
                    keyed,
                });
            }
        }
        routes
    }

    /// Wrap a request that failed before reaching an operation.
    #[must_use]
    pub fn reject(&self, error: CrudError) -> Envelope {
        Envelope::from_errors(&self.base, vec![error])
    }

    /// Create a record from the mutable fields in `params`.
    ///
    /// Foreign keys are resolved first; if any of them is missing nothing is written.
    pub async fn create(&self, params: Params) -> Envelope {
        self.respond(self.try_create(params).await.map(Value::Object))
    }

    /// Read one record by key, or every record when `key` is absent or empty.
    pub async fn read(&self, key: Option<Value>) -> Envelope {
        self.respond(self.try_read(key).await)
    }

    /// Update the record whose key is in `params` with the remaining fields.
    pub async fn update(&self, params: Params) -> Envelope {
        self.respond(self.try_update(params).await.map(Value::Object))
    }

    /// Delete a record by key and return it as it was.
    pub async fn delete(&self, key: Value) -> Envelope {
        self.respond(self.try_delete(key).await.map(Value::Object))
    }

    fn respond(&self, result: Result<Value, Vec<CrudError>>) -> Envelope {
        match result {
            Ok(data) => Envelope::success(&self.base, data),
            Err(errors) => Envelope::from_errors(&self.base, errors),
        }
    }

    async fn try_create(&self, params: Params) -> Result<Record, Vec<CrudError>> {
        let values = validate(&self.schema, &params)?;
        let errors = self.resolve_references(&values).await;
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut record = values.into_record();
        let pk = self.schema.primary_key();
        if pk.kind() != FieldType::Integer {
            record.insert(
                pk.name().to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        match self.store.insert(&self.schema, &record).await {
            Ok(created) => {
                tracing::debug!(
                    model = self.schema.name(),
                    key = ?created.get(pk.name()),
                    "created record"
                );
                Ok(created)
            }
            Err(err) if err.is_constraint() => {
                tracing::debug!(model = self.schema.name(), error = %err, "create rejected");
                Err(vec![CrudError::constraint(
                    format!("{} could not be created. Bad foreign key?", self.schema.name()),
                    self.config.constraint_status(),
                )])
            }
            Err(err) => Err(vec![CrudError::database(err)]),
        }
    }

    async fn try_read(&self, key: Option<Value>) -> Result<Value, Vec<CrudError>> {
        let Some(key) = key.filter(is_truthy_key) else {
            let records = self
                .store
                .list(&self.schema)
                .await
                .map_err(|err| vec![CrudError::database(err)])?;
            return Ok(Value::Array(
                records.into_iter().map(Value::Object).collect(),
            ));
        };

        let key = self.locate(&key)?;
        self.fetch(&key).await.map(Value::Object)
    }

    async fn try_update(&self, mut params: Params) -> Result<Record, Vec<CrudError>> {
        let raw_key = params.remove(&self.primary_key).unwrap_or(Value::Null);
        let key = self.locate(&raw_key)?;
        let values = validate(&self.schema, &params)?;

        let mut errors = self.resolve_references(&values).await;
        let existing = match self.store.find(&self.schema, &key).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                errors.push(CrudError::record_not_found(self.schema.name(), &key));
                None
            }
            Err(err) => {
                errors.push(CrudError::database(err));
                None
            }
        };
        let Some(existing) = existing.filter(|_| errors.is_empty()) else {
            return Err(errors);
        };

        let policy = self.config.update_policy;
        let changes = values.retain(|value| policy.applies(value)).into_record();
        if changes.is_empty() {
            return Ok(existing);
        }

        match self.store.save(&self.schema, &key, &changes).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::NotFound(_)) => {
                Err(vec![CrudError::record_not_found(self.schema.name(), &key)])
            }
            Err(err) if err.is_constraint() => Err(vec![CrudError::constraint(
                format!(
                    "{} with key: {} could not be updated",
                    self.schema.name(),
                    display_value(&key)
                ),
                self.config.constraint_status(),
            )]),
            Err(err) => Err(vec![CrudError::database(err)]),
        }
    }

    async fn try_delete(&self, key: Value) -> Result<Record, Vec<CrudError>> {
        let key = self.locate(&key)?;
        let existing = self.fetch(&key).await?;

        match self.store.delete(&self.schema, &key).await {
            Ok(()) => Ok(existing),
            Err(StoreError::NotFound(_)) => {
                Err(vec![CrudError::record_not_found(self.schema.name(), &key)])
            }
            Err(err) if err.is_constraint() => {
                tracing::debug!(model = self.schema.name(), error = %err, "delete rejected");
                Err(vec![CrudError::constraint(
                    format!(
                        "{} with key: {} could not be deleted",
                        self.schema.name(),
                        display_value(&key)
                    ),
                    self.config.constraint_status(),
                )])
            }
            Err(err) => Err(vec![CrudError::database(err)]),
        }
    }

    /// Coerce a raw key to the primary-key type. Missing keys are rejected.
    fn locate(&self, raw: &Value) -> Result<Value, Vec<CrudError>> {
        if !is_truthy_key(raw) {
            return Err(vec![CrudError::bad_request(format!(
                "{} is required",
                self.primary_key
            ))]);
        }
        coerce(self.schema.primary_key().kind(), raw)
            .ok_or_else(|| vec![CrudError::invalid_value(&self.primary_key, raw)])
    }

    async fn fetch(&self, key: &Value) -> Result<Record, Vec<CrudError>> {
        match self.store.find(&self.schema, key).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(vec![CrudError::record_not_found(self.schema.name(), key)]),
            Err(err) => Err(vec![CrudError::database(err)]),
        }
    }

    /// Look up every supplied foreign key and report the ones that don't resolve.
    async fn resolve_references(&self, values: &FieldValues<'_>) -> Vec<CrudError> {
        let mut errors = Vec::new();
        for (field, value) in values.iter() {
            let Some(target) = field.foreign_key() else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            tracing::debug!(field = field.name(), value = %value, target = target.name(), "resolving foreign key");
            match self.store.exists(target, value).await {
                Ok(true) => {}
                Ok(false) => errors.push(CrudError::related_not_found(field.name(), value)),
                Err(err) => errors.push(CrudError::database(err)),
            }
        }
        errors
    }
}

/// Keys follow the same truthiness as update values, except that `0` is a real key.
fn is_truthy_key(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        other => is_truthy(other),
    }
}
