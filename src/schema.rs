//! # Model Schemas
//!
//! A [`ModelSchema`] is the explicit description of a persistent entity that the
//! endpoint generator works from: its ordered fields, which one is the primary key,
//! and which fields reference other models.
//!
//! ```rust,ignore
//! use schemacrud::schema::{Field, ModelSchema};
//!
//! let author = ModelSchema::builder("Author")
//!     .field(Field::integer("id").primary_key())
//!     .field(Field::text("name"))
//!     .build()?;
//!
//! let book = ModelSchema::builder("Book")
//!     .field(Field::integer("id").primary_key())
//!     .field(Field::text("title"))
//!     .field(Field::integer("author_id").references(&author))
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Value type of a field. Incoming parameters are coerced to this type before
/// they reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Float,
    Text,
    Boolean,
    Uuid,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// A single column of a model.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    kind: FieldType,
    primary_key: bool,
    unique: bool,
    references: Option<Arc<ModelSchema>>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
            unique: false,
            references: None,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn uuid(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Uuid)
    }

    /// Mark this field as the model's primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Values of this field must be distinct across records.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Make this field a foreign key pointing at the primary key of `target`.
    #[must_use]
    pub fn references(mut self, target: &Arc<ModelSchema>) -> Self {
        self.references = Some(Arc::clone(target));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> FieldType {
        self.kind
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Primary keys are implicitly unique.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique || self.primary_key
    }

    /// The referenced model when this field is a foreign key.
    #[must_use]
    pub fn foreign_key(&self) -> Option<&Arc<ModelSchema>> {
        self.references.as_ref()
    }
}

/// Explicit descriptor of a persistent model.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    table: String,
    fields: Vec<Field>,
    primary_key: usize,
}

impl ModelSchema {
    pub fn builder(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.into(),
            table: None,
            fields: Vec::new(),
        }
    }

    /// Model name as used in error messages, e.g. `Book`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// All fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    #[must_use]
    pub fn primary_key(&self) -> &Field {
        &self.fields[self.primary_key]
    }

    /// Every field except the primary key.
    pub fn mutable_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| !field.primary_key)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.references.is_some())
    }

    /// Foreign-key fields of this model that point at `table`.
    pub fn fields_referencing<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Field> {
        self.foreign_keys().filter(move |field| {
            field
                .references
                .as_ref()
                .is_some_and(|target| target.table == table)
        })
    }
}

pub struct ModelSchemaBuilder {
    name: String,
    table: Option<String>,
    fields: Vec<Field>,
}

impl ModelSchemaBuilder {
    /// Override the storage table name. Defaults to the lower-cased model name.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate the field list and freeze the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the model has no name, repeats a field name,
    /// does not have exactly one primary key, or declares a foreign key whose type
    /// differs from the referenced primary key.
    pub fn build(self) -> Result<Arc<ModelSchema>, SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::EmptyName);
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }

        let keys: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.primary_key)
            .map(|(index, _)| index)
            .collect();
        let primary_key = match keys.as_slice() {
            [index] => *index,
            [] => return Err(SchemaError::MissingPrimaryKey(self.name)),
            _ => {
                return Err(SchemaError::MultiplePrimaryKeys(
                    keys.iter().map(|i| self.fields[*i].name.clone()).collect(),
                ));
            }
        };

        for field in &self.fields {
            let Some(target) = &field.references else {
                continue;
            };
            if field.primary_key {
                return Err(SchemaError::PrimaryKeyReference(field.name.clone()));
            }
            let expected = target.primary_key().kind;
            if field.kind != expected {
                return Err(SchemaError::ReferenceTypeMismatch {
                    field: field.name.clone(),
                    expected,
                    found: field.kind,
                });
            }
        }

        let table = self.table.unwrap_or_else(|| self.name.to_lowercase());
        Ok(Arc::new(ModelSchema {
            name: self.name,
            table,
            fields: self.fields,
            primary_key,
        }))
    }
}

/// Problems detected while building a schema or registering its endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    EmptyName,
    DuplicateField(String),
    MissingPrimaryKey(String),
    MultiplePrimaryKeys(Vec<String>),
    PrimaryKeyReference(String),
    ReferenceTypeMismatch {
        field: String,
        expected: FieldType,
        found: FieldType,
    },
    /// Two registered models resolved to the same base path.
    DuplicateBase(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "model and field names must not be empty"),
            Self::DuplicateField(name) => write!(f, "field '{name}' is declared more than once"),
            Self::MissingPrimaryKey(model) => write!(f, "model '{model}' has no primary key"),
            Self::MultiplePrimaryKeys(names) => {
                write!(f, "only one primary key is allowed, found: {}", names.join(", "))
            }
            Self::PrimaryKeyReference(name) => {
                write!(f, "primary key '{name}' cannot be a foreign key")
            }
            Self::ReferenceTypeMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "foreign key '{field}' is {found} but the referenced primary key is {expected}"
            ),
            Self::DuplicateBase(base) => write!(f, "base path '/{base}' is already registered"),
        }
    }
}

impl std::error::Error for SchemaError {}
