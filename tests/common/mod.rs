#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use schemacrud::{
    DatabaseStore, EndpointConfig, Endpoints, Field, MemoryStore, ModelSchema, Registry, Store,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// `Author{id, name, email unique}` and `Book{id, title, author_id -> Author, rating, in_print}`.
pub fn library_schemas() -> (Arc<ModelSchema>, Arc<ModelSchema>) {
    let author = ModelSchema::builder("Author")
        .field(Field::integer("id").primary_key())
        .field(Field::text("name"))
        .field(Field::text("email").unique())
        .build()
        .expect("author schema");
    let book = ModelSchema::builder("Book")
        .field(Field::integer("id").primary_key())
        .field(Field::text("title"))
        .field(Field::integer("author_id").references(&author))
        .field(Field::float("rating"))
        .field(Field::boolean("in_print"))
        .build()
        .expect("book schema");
    (author, book)
}

pub struct Library {
    pub authors: Arc<Endpoints>,
    pub books: Arc<Endpoints>,
}

/// Author and book endpoints over one in-memory store.
pub fn memory_library(book_config: EndpointConfig) -> Library {
    let (author, book) = library_schemas();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    Library {
        authors: Arc::new(Endpoints::new(
            author,
            Arc::clone(&store),
            EndpointConfig::default(),
        )),
        books: Arc::new(Endpoints::new(book, store, book_config)),
    }
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let backend = db.get_database_backend();

    db.execute(Statement::from_string(
        backend,
        "CREATE TABLE author (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            email TEXT UNIQUE
        )",
    ))
    .await?;
    db.execute(Statement::from_string(
        backend,
        "CREATE TABLE book (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            author_id INTEGER REFERENCES author(id),
            rating REAL,
            in_print BOOLEAN
        )",
    ))
    .await?;

    Ok(db)
}

/// Router serving `/author` and `/book` from the database.
pub async fn setup_test_app(db: DatabaseConnection) -> Router {
    let (author, book) = library_schemas();
    let mut registry = Registry::new(DatabaseStore::new(db));
    registry
        .register(author, EndpointConfig::default())
        .expect("register author");
    registry
        .register(book, EndpointConfig::default())
        .expect("register book");
    registry.prepare().await.expect("tables exist");
    registry.router()
}

/// Send a request and decode the JSON envelope. Every response must be 200.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Value {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
