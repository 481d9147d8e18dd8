//! Library API: authors and their books, served from SQLite
//!
//! ```bash
//! cargo run --example library
//! ```
//!
//! Then visit:
//! - **API**: <http://localhost:3000/authors>, <http://localhost:3000/books>
//! - **Documentation**: <http://localhost:3000/docs>
//!
//! `DATABASE_URL` (default `sqlite::memory:`) and `BIND_ADDR` (default
//! `0.0.0.0:3000`) can be set in the environment.

use schemacrud::{DatabaseStore, EndpointConfig, Field, ModelSchema, Registry};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use std::env;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa_scalar::{Scalar, Servable};

async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        r"CREATE TABLE IF NOT EXISTS authors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE
        );",
    ))
    .await?;
    db.execute(Statement::from_string(
        backend,
        r"CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            author_id INTEGER REFERENCES authors(id),
            rating REAL,
            in_print BOOLEAN
        );",
    ))
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let db = Database::connect(&database_url).await?;
    create_schema(&db).await?;

    let author = ModelSchema::builder("Author")
        .table("authors")
        .field(Field::integer("id").primary_key())
        .field(Field::text("name"))
        .field(Field::text("email").unique())
        .build()?;
    let book = ModelSchema::builder("Book")
        .table("books")
        .field(Field::integer("id").primary_key())
        .field(Field::text("title"))
        .field(Field::integer("author_id").references(&author))
        .field(Field::float("rating"))
        .field(Field::boolean("in_print"))
        .build()?;

    let mut registry = Registry::new(DatabaseStore::new(db));
    registry.register(author, EndpointConfig::new().with_base("authors"))?;
    registry.register(
        book,
        EndpointConfig::new()
            .with_base("books")
            .with_constraint_code(409),
    )?;
    registry.prepare().await?;

    let app = registry
        .router()
        .merge(Scalar::with_url("/docs", registry.openapi("Library API", "0.1.0")))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("API: http://{bind_addr}/books, docs: http://{bind_addr}/docs");
    axum::serve(listener, app).await?;
    Ok(())
}
