//! In-memory store for testing and development.

use super::{Record, Store};
use crate::errors::StoreError;
use crate::schema::{FieldType, ModelSchema};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Process-local tables keyed by table name.
///
/// Behaves like a small relational database: integer primary keys are assigned
/// on insert, unique fields and foreign keys are checked on every write, and a
/// record that is still referenced cannot be deleted. Schemas are learnt from
/// the calls themselves, so no setup is needed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    schemas: HashMap<String, Arc<ModelSchema>>,
    rows: HashMap<String, Table>,
}

#[derive(Default)]
struct Table {
    last_id: i64,
    records: Vec<Record>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire read lock: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire write lock: {e}")))
    }
}

impl Tables {
    fn learn(&mut self, schema: &ModelSchema) {
        self.schemas
            .entry(schema.table().to_string())
            .or_insert_with(|| Arc::new(schema.clone()));
    }

    fn records(&self, table: &str) -> &[Record] {
        self.rows
            .get(table)
            .map(|t| t.records.as_slice())
            .unwrap_or_default()
    }

    fn position(&self, schema: &ModelSchema, key: &Value) -> Option<usize> {
        let pk = schema.primary_key().name();
        self.records(schema.table())
            .iter()
            .position(|record| record.get(pk) == Some(key))
    }

    fn check_unique(
        &self,
        schema: &ModelSchema,
        candidate: &Record,
        skip: Option<usize>,
    ) -> Result<(), StoreError> {
        let existing = self.records(schema.table());
        for field in schema.fields().iter().filter(|f| f.is_unique()) {
            let value = &candidate[field.name()];
            if value.is_null() {
                continue;
            }
            let taken = existing
                .iter()
                .enumerate()
                .any(|(i, record)| Some(i) != skip && record.get(field.name()) == Some(value));
            if taken {
                return Err(StoreError::UniqueViolation(format!(
                    "{}.{}",
                    schema.table(),
                    field.name()
                )));
            }
        }
        Ok(())
    }

    fn check_references(&self, schema: &ModelSchema, candidate: &Record) -> Result<(), StoreError> {
        for field in schema.foreign_keys() {
            let value = &candidate[field.name()];
            let Some(target) = field.foreign_key() else {
                continue;
            };
            if value.is_null() || self.position(target, value).is_some() {
                continue;
            }
            return Err(StoreError::ForeignKeyViolation(format!(
                "{}.{} -> {}",
                schema.table(),
                field.name(),
                target.table()
            )));
        }
        Ok(())
    }

    fn check_dependents(&self, schema: &ModelSchema, key: &Value) -> Result<(), StoreError> {
        for dependent in self.schemas.values() {
            for field in dependent.fields_referencing(schema.table()) {
                let referenced = self
                    .records(dependent.table())
                    .iter()
                    .any(|record| record.get(field.name()) == Some(key));
                if referenced {
                    return Err(StoreError::ForeignKeyViolation(format!(
                        "{}.{} -> {}",
                        dependent.table(),
                        field.name(),
                        schema.table()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn prepare(&self, schema: &ModelSchema) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.learn(schema);
        tables.rows.entry(schema.table().to_string()).or_default();
        Ok(())
    }

    async fn find(&self, schema: &ModelSchema, key: &Value) -> Result<Option<Record>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .position(schema, key)
            .map(|index| tables.records(schema.table())[index].clone()))
    }

    async fn list(&self, schema: &ModelSchema) -> Result<Vec<Record>, StoreError> {
        let tables = self.read()?;
        let pk = schema.primary_key().name();
        let mut records = tables.records(schema.table()).to_vec();
        records.sort_by(|a, b| compare_keys(&a[pk], &b[pk]));
        Ok(records)
    }

    async fn insert(&self, schema: &ModelSchema, values: &Record) -> Result<Record, StoreError> {
        let mut tables = self.write()?;
        tables.learn(schema);

        let mut record: Record = schema
            .fields()
            .iter()
            .map(|field| {
                let value = values.get(field.name()).cloned().unwrap_or(Value::Null);
                (field.name().to_string(), value)
            })
            .collect();

        let pk = schema.primary_key();
        let table = tables.rows.entry(schema.table().to_string()).or_default();
        match &record[pk.name()] {
            Value::Null if pk.kind() == FieldType::Integer => {
                table.last_id += 1;
                record.insert(pk.name().to_string(), Value::from(table.last_id));
            }
            Value::Null => {
                return Err(StoreError::Backend(format!(
                    "{} requires a value for {}",
                    schema.name(),
                    pk.name()
                )));
            }
            given => {
                if let Some(id) = given.as_i64() {
                    table.last_id = table.last_id.max(id);
                }
            }
        }

        tables.check_unique(schema, &record, None)?;
        tables.check_references(schema, &record)?;
        tables
            .rows
            .entry(schema.table().to_string())
            .or_default()
            .records
            .push(record.clone());
        Ok(record)
    }

    async fn save(
        &self,
        schema: &ModelSchema,
        key: &Value,
        changes: &Record,
    ) -> Result<Record, StoreError> {
        let mut tables = self.write()?;
        tables.learn(schema);

        let index = tables
            .position(schema, key)
            .ok_or_else(|| StoreError::NotFound(format!("{} {key}", schema.table())))?;
        let mut updated = tables.records(schema.table())[index].clone();
        for (name, value) in changes {
            if schema.field(name).is_some() {
                updated.insert(name.clone(), value.clone());
            }
        }

        tables.check_unique(schema, &updated, Some(index))?;
        tables.check_references(schema, &updated)?;
        if let Some(table) = tables.rows.get_mut(schema.table()) {
            table.records[index] = updated.clone();
        }
        Ok(updated)
    }

    async fn delete(&self, schema: &ModelSchema, key: &Value) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.learn(schema);

        let index = tables
            .position(schema, key)
            .ok_or_else(|| StoreError::NotFound(format!("{} {key}", schema.table())))?;
        tables.check_dependents(schema, key)?;
        if let Some(table) = tables.rows.get_mut(schema.table()) {
            table.records.remove(index);
        }
        Ok(())
    }
}
