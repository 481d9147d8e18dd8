//! # schemacrud
//!
//! Generate REST CRUD endpoints from an explicit model schema.
//!
//! Describe each entity once with a [`ModelSchema`], pick a [`Store`], and the
//! [`Registry`] produces an axum [`Router`](axum::Router) with create, read, update
//! and delete routes for every model. Responses are wrapped in an [`Envelope`]
//! keyed by the model's base name, and failures are collected as `{message, code}`
//! entries instead of being raised one at a time.
//!
//! ```rust,ignore
//! use schemacrud::{EndpointConfig, Field, MemoryStore, ModelSchema, Registry};
//!
//! let author = ModelSchema::builder("Author")
//!     .field(Field::integer("id").primary_key())
//!     .field(Field::text("name"))
//!     .build()?;
//!
//! let mut registry = Registry::new(MemoryStore::new());
//! registry.register(author, EndpointConfig::new().with_base("authors"))?;
//!
//! let app = registry.router();
//! ```

pub mod config;
pub mod envelope;
pub mod errors;
pub mod generator;
pub mod openapi;
pub mod params;
pub mod registry;
pub mod routes;
pub mod schema;
pub mod store;

pub use config::{EndpointConfig, UpdatePolicy};
pub use envelope::{Envelope, ErrorEntry, Outcome};
pub use errors::{CrudError, StoreError};
pub use generator::{Endpoints, Operation, Route};
pub use params::Params;
pub use registry::Registry;
pub use schema::{Field, FieldType, ModelSchema, SchemaError};
pub use store::{DatabaseStore, MemoryStore, Record, Store};
