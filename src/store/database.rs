//! Sea-ORM backed store.
//!
//! Statements are built with sea-query from the schema at call time, so any table
//! that matches a [`ModelSchema`] can be served without entity structs. Tables
//! must already exist.

use super::{Record, Store};
use crate::errors::StoreError;
use crate::schema::{Field, FieldType, ModelSchema};
use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, Order, Query, SelectStatement, SimpleExpr, Value as DbValue};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, QueryResult, Statement, StatementBuilder};
use serde_json::{Number, Value};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn build<S: StatementBuilder>(&self, statement: &S) -> Statement {
        self.db.get_database_backend().build(statement)
    }
}

/// Bind a JSON value as the database type of `field`.
fn to_db_value(field: &Field, value: &Value) -> Result<DbValue, StoreError> {
    let invalid = || {
        StoreError::Backend(format!(
            "value {value} cannot be stored in {} column {}",
            field.kind(),
            field.name()
        ))
    };
    let bound = match field.kind() {
        FieldType::Integer => match value {
            Value::Null => DbValue::BigInt(None),
            other => DbValue::from(other.as_i64().ok_or_else(invalid)?),
        },
        FieldType::Float => match value {
            Value::Null => DbValue::Double(None),
            other => DbValue::from(other.as_f64().ok_or_else(invalid)?),
        },
        FieldType::Boolean => match value {
            Value::Null => DbValue::Bool(None),
            other => DbValue::from(other.as_bool().ok_or_else(invalid)?),
        },
        FieldType::Text => match value {
            Value::Null => DbValue::String(None),
            Value::String(s) => DbValue::from(s.clone()),
            _ => return Err(invalid()),
        },
        FieldType::Uuid => match value {
            Value::Null => DbValue::Uuid(None),
            Value::String(s) => DbValue::from(Uuid::parse_str(s).map_err(|_| invalid())?),
            _ => return Err(invalid()),
        },
    };
    Ok(bound)
}

fn key_condition(schema: &ModelSchema, key: &Value) -> Result<SimpleExpr, StoreError> {
    let pk = schema.primary_key();
    Ok(Expr::col(Alias::new(pk.name())).eq(to_db_value(pk, key)?))
}

/// Decode as the wide type, falling back to a narrower one. Postgres `SERIAL`/`INT4`
/// and `REAL` columns refuse to decode as `i64`/`f64`. The wide error is kept when
/// both fail.
fn widen<W, N: Into<W>>(
    wide: Result<Option<W>, DbErr>,
    narrow: impl FnOnce() -> Result<Option<N>, DbErr>,
) -> Result<Option<W>, DbErr> {
    wide.or_else(|err| narrow().map(|v| v.map(Into::into)).map_err(|_| err))
}

fn decode_row(schema: &ModelSchema, row: &QueryResult) -> Result<Record, StoreError> {
    let mut record = Record::new();
    for field in schema.fields() {
        let name = field.name();
        let value = match field.kind() {
            FieldType::Integer => widen(row.try_get::<Option<i64>>("", name), || {
                widen(row.try_get::<Option<i32>>("", name), || {
                    row.try_get::<Option<i16>>("", name)
                })
            })?
            .map_or(Value::Null, Value::from),
            FieldType::Float => widen(row.try_get::<Option<f64>>("", name), || {
                row.try_get::<Option<f32>>("", name)
            })?
            .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
            FieldType::Text => row
                .try_get::<Option<String>>("", name)?
                .map_or(Value::Null, Value::String),
            FieldType::Boolean => row
                .try_get::<Option<bool>>("", name)?
                .map_or(Value::Null, Value::Bool),
            FieldType::Uuid => row
                .try_get::<Option<Uuid>>("", name)?
                .map_or(Value::Null, |id| Value::String(id.hyphenated().to_string())),
        };
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

fn select(schema: &ModelSchema) -> SelectStatement {
    let mut query = Query::select();
    query
        .columns(schema.fields().iter().map(|f| Alias::new(f.name())))
        .from(Alias::new(schema.table()));
    query
}

#[async_trait]
impl Store for DatabaseStore {
    /// Check that the table behind `schema` exists and exposes every field.
    async fn prepare(&self, schema: &ModelSchema) -> Result<(), StoreError> {
        let mut query = select(schema);
        query.limit(1);
        self.db.query_one(self.build(&query)).await?;
        tracing::debug!(table = schema.table(), "table is reachable");
        Ok(())
    }

    async fn find(&self, schema: &ModelSchema, key: &Value) -> Result<Option<Record>, StoreError> {
        let mut query = select(schema);
        query.and_where(key_condition(schema, key)?);

        let row = self.db.query_one(self.build(&query)).await?;
        row.map(|row| decode_row(schema, &row)).transpose()
    }

    async fn list(&self, schema: &ModelSchema) -> Result<Vec<Record>, StoreError> {
        let mut query = select(schema);
        query.order_by(Alias::new(schema.primary_key().name()), Order::Asc);

        let rows = self.db.query_all(self.build(&query)).await?;
        rows.iter().map(|row| decode_row(schema, row)).collect()
    }

    async fn insert(&self, schema: &ModelSchema, values: &Record) -> Result<Record, StoreError> {
        let mut columns = Vec::new();
        let mut bound = Vec::new();
        for field in schema.fields() {
            if let Some(value) = values.get(field.name()) {
                columns.push(Alias::new(field.name()));
                bound.push(SimpleExpr::from(to_db_value(field, value)?));
            }
        }

        let mut insert = Query::insert();
        insert.into_table(Alias::new(schema.table()));
        if columns.is_empty() {
            insert.or_default_values();
        } else {
            insert.columns(columns);
            insert
                .values(bound)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        if self.db.support_returning() {
            insert.returning(
                Query::returning().columns(schema.fields().iter().map(|f| Alias::new(f.name()))),
            );
            let row = self
                .db
                .query_one(self.build(&insert))
                .await?
                .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))?;
            return decode_row(schema, &row);
        }

        let result = self.db.execute(self.build(&insert)).await?;
        let pk = schema.primary_key().name();
        let key = match values.get(pk) {
            Some(key) if !key.is_null() => key.clone(),
            _ => Value::from(result.last_insert_id()),
        };
        tracing::debug!(table = schema.table(), key = %key, "inserted record");
        self.find(schema, &key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {key}", schema.table())))
    }

    async fn save(
        &self,
        schema: &ModelSchema,
        key: &Value,
        changes: &Record,
    ) -> Result<Record, StoreError> {
        if !changes.is_empty() {
            let mut update = Query::update();
            update
                .table(Alias::new(schema.table()))
                .and_where(key_condition(schema, key)?);
            for (name, value) in changes {
                let Some(field) = schema.field(name) else {
                    continue;
                };
                update.value(Alias::new(name), to_db_value(field, value)?);
            }
            self.db.execute(self.build(&update)).await?;
        }

        self.find(schema, key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("{} {key}", schema.table())))
    }

    async fn delete(&self, schema: &ModelSchema, key: &Value) -> Result<(), StoreError> {
        let mut delete = Query::delete();
        delete
            .from_table(Alias::new(schema.table()))
            .and_where(key_condition(schema, key)?);

        let result = self.db.execute(self.build(&delete)).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("{} {key}", schema.table())));
        }
        Ok(())
    }
}
