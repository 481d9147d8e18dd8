//! Persistence seam used by the generated endpoints.
//!
//! A [`Store`] knows nothing about HTTP or envelopes; it reads and writes
//! [`Record`]s shaped by a [`ModelSchema`]. Two backends ship with the crate:
//! [`MemoryStore`] for tests and prototypes, and [`DatabaseStore`] on top of a
//! Sea-ORM connection.

mod database;
mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

use crate::errors::StoreError;
use crate::schema::ModelSchema;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A serialized record: field name to value.
pub type Record = Map<String, Value>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Make the store aware of a model before it serves requests for it.
    async fn prepare(&self, _schema: &ModelSchema) -> Result<(), StoreError> {
        Ok(())
    }

    /// Fetch one record by primary key.
    async fn find(&self, schema: &ModelSchema, key: &Value) -> Result<Option<Record>, StoreError>;

    /// Fetch every record, ordered by primary key.
    async fn list(&self, schema: &ModelSchema) -> Result<Vec<Record>, StoreError>;

    /// Persist a new record and return it as stored, primary key included.
    ///
    /// `values` holds the fields supplied by the caller; missing fields are null.
    /// When the primary key is absent the store assigns one.
    async fn insert(&self, schema: &ModelSchema, values: &Record) -> Result<Record, StoreError>;

    /// Write `changes` onto the record identified by `key` and return the result.
    async fn save(
        &self,
        schema: &ModelSchema,
        key: &Value,
        changes: &Record,
    ) -> Result<Record, StoreError>;

    /// Remove the record identified by `key`.
    async fn delete(&self, schema: &ModelSchema, key: &Value) -> Result<(), StoreError>;

    /// Whether a record with this primary key exists.
    async fn exists(&self, schema: &ModelSchema, key: &Value) -> Result<bool, StoreError> {
        Ok(self.find(schema, key).await?.is_some())
    }
}
