use async_trait::async_trait;
use schemacrud::{
    EndpointConfig, Endpoints, Field, MemoryStore, ModelSchema, Operation, Params, Record, Store,
    StoreError, UpdatePolicy,
};
use serde_json::{Value, json};
use std::sync::Arc;

mod common;
use common::{Library, library_schemas, memory_library};

async fn library_with_author() -> Library {
    let library = memory_library(EndpointConfig::default());
    let created = library
        .authors
        .create(Params::new().with("name", "Frank Herbert"))
        .await;
    assert!(created.is_success());
    library
}

fn rendered(envelope: &schemacrud::Envelope) -> Value {
    serde_json::to_value(envelope).unwrap()
}

#[tokio::test]
async fn test_create_with_existing_author() {
    let library = library_with_author().await;

    let envelope = library
        .books
        .create(Params::new().with("title", "Dune").with("author_id", 1))
        .await;

    assert_eq!(
        rendered(&envelope),
        json!({"book": {"success": {
            "id": 1,
            "title": "Dune",
            "author_id": 1,
            "rating": null,
            "in_print": null
        }}})
    );
}

#[tokio::test]
async fn test_create_with_missing_author_writes_nothing() {
    let library = library_with_author().await;

    let envelope = library
        .books
        .create(Params::new().with("title", "X").with("author_id", 999))
        .await;

    assert_eq!(
        rendered(&envelope),
        json!({"book": {"errors": [
            {"message": "author_id with id: 999 was not found", "code": 404}
        ]}})
    );
    let listed = library.books.read(None).await;
    assert_eq!(listed.data(), Some(&json!([])));
}

#[tokio::test]
async fn test_create_coerces_query_strings() {
    let library = library_with_author().await;

    let envelope = library
        .books
        .create(
            Params::new()
                .with("title", "Dune Messiah")
                .with("author_id", "1")
                .with("rating", "4.5")
                .with("in_print", "true"),
        )
        .await;

    let data = envelope.data().expect("created");
    assert_eq!(data["author_id"], json!(1));
    assert_eq!(data["rating"], json!(4.5));
    assert_eq!(data["in_print"], json!(true));
}

#[tokio::test]
async fn test_create_reports_every_invalid_parameter() {
    let library = library_with_author().await;

    let envelope = library
        .books
        .create(
            Params::new()
                .with("id", 7)
                .with("subtitle", "nope")
                .with("rating", "high"),
        )
        .await;

    let mut messages: Vec<&str> = envelope
        .error_entries()
        .iter()
        .map(|e| e.message.as_str())
        .collect();
    messages.sort_unstable();
    assert_eq!(
        messages,
        vec![
            "id cannot be set on create",
            "rating has an invalid value: high",
            "subtitle is not a field of Book",
        ]
    );
    assert!(envelope.error_entries().iter().all(|e| e.code == 400));
}

#[tokio::test]
async fn test_create_without_fields_keeps_nulls() {
    let library = memory_library(EndpointConfig::default());

    let envelope = library.authors.create(Params::new()).await;

    assert_eq!(
        rendered(&envelope),
        json!({"author": {"success": {"id": 1, "name": null, "email": null}}})
    );
}

#[tokio::test]
async fn test_duplicate_unique_value_is_a_constraint_error() {
    let library = memory_library(EndpointConfig::default());
    let params = Params::new().with("name", "A").with("email", "a@example.com");
    assert!(library.authors.create(params.clone()).await.is_success());

    let envelope = library.authors.create(params).await;

    assert_eq!(
        rendered(&envelope),
        json!({"author": {"errors": [
            {"message": "Author could not be created. Bad foreign key?", "code": 404}
        ]}})
    );
}

#[tokio::test]
async fn test_update_to_taken_unique_value_is_a_constraint_error() {
    let library = memory_library(EndpointConfig::default());
    for (name, email) in [("A", "a@example.com"), ("B", "b@example.com")] {
        let created = library
            .authors
            .create(Params::new().with("name", name).with("email", email))
            .await;
        assert!(created.is_success());
    }

    let envelope = library
        .authors
        .update(Params::new().with("id", 2).with("email", "a@example.com"))
        .await;

    assert_eq!(
        rendered(&envelope),
        json!({"author": {"errors": [
            {"message": "Author with key: 2 could not be updated", "code": 404}
        ]}})
    );
    let unchanged = library.authors.read(Some(json!(2))).await;
    assert_eq!(unchanged.data().map(|d| &d["email"]), Some(&json!("b@example.com")));
}

#[tokio::test]
async fn test_read_one_and_list() {
    let library = library_with_author().await;
    for title in ["Dune", "Children of Dune", "Chapterhouse"] {
        let created = library
            .books
            .create(Params::new().with("title", title).with("author_id", 1))
            .await;
        assert!(created.is_success());
    }

    let listed = library.books.read(None).await;
    let records = listed.data().and_then(Value::as_array).expect("list");
    assert_eq!(records.len(), 3);
    let ids: Vec<&Value> = records.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!(1), &json!(2), &json!(3)]);

    let one = library.books.read(Some(json!("2"))).await;
    assert_eq!(one.data().map(|d| &d["title"]), Some(&json!("Children of Dune")));

    let empty_key = library.books.read(Some(json!(""))).await;
    assert_eq!(empty_key.data().and_then(Value::as_array).map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_read_missing_key_is_not_found() {
    let library = library_with_author().await;

    let envelope = library.books.read(Some(json!(42))).await;
    assert_eq!(
        rendered(&envelope),
        json!({"book": {"errors": [
            {"message": "Book with key: 42 was not found", "code": 404}
        ]}})
    );

    let invalid = library.books.read(Some(json!("abc"))).await;
    assert_eq!(invalid.error_entries()[0].message, "id has an invalid value: abc");
    assert_eq!(invalid.error_entries()[0].code, 400);
}

#[tokio::test]
async fn test_update_changes_only_given_field() {
    let library = library_with_author().await;
    library
        .books
        .create(
            Params::new()
                .with("title", "Dune")
                .with("author_id", 1)
                .with("rating", 4.0),
        )
        .await;

    let envelope = library
        .books
        .update(Params::new().with("id", 1).with("title", "Dune (1965)"))
        .await;

    assert_eq!(
        rendered(&envelope),
        json!({"book": {"success": {
            "id": 1,
            "title": "Dune (1965)",
            "author_id": 1,
            "rating": 4.0,
            "in_print": null
        }}})
    );
}

#[tokio::test]
async fn test_update_skips_falsy_values_by_default() {
    let library = library_with_author().await;
    library
        .books
        .create(
            Params::new()
                .with("title", "Dune")
                .with("rating", 4.0)
                .with("in_print", true),
        )
        .await;

    let envelope = library
        .books
        .update(
            Params::new()
                .with("id", 1)
                .with("title", "")
                .with("rating", 0)
                .with("in_print", false)
                .with("author_id", Value::Null),
        )
        .await;

    let data = envelope.data().expect("updated");
    assert_eq!(data["title"], json!("Dune"));
    assert_eq!(data["rating"], json!(4.0));
    assert_eq!(data["in_print"], json!(true));
}

#[tokio::test]
async fn test_update_apply_present_writes_empty_values() {
    let library = memory_library(
        EndpointConfig::new().with_update_policy(UpdatePolicy::ApplyPresent),
    );
    library.authors.create(Params::new().with("name", "Herbert")).await;
    library
        .books
        .create(
            Params::new()
                .with("title", "Dune")
                .with("author_id", 1)
                .with("in_print", true),
        )
        .await;

    let envelope = library
        .books
        .update(
            Params::new()
                .with("id", 1)
                .with("title", "")
                .with("author_id", Value::Null)
                .with("in_print", false),
        )
        .await;

    let data = envelope.data().expect("updated");
    assert_eq!(data["title"], json!(""));
    assert_eq!(data["author_id"], Value::Null);
    assert_eq!(data["in_print"], json!(false));
}

#[tokio::test]
async fn test_update_collects_reference_and_target_errors() {
    let library = library_with_author().await;

    let envelope = library
        .books
        .update(Params::new().with("id", 9).with("author_id", 999))
        .await;

    assert_eq!(
        rendered(&envelope),
        json!({"book": {"errors": [
            {"message": "author_id with id: 999 was not found", "code": 404},
            {"message": "Book with key: 9 was not found", "code": 404}
        ]}})
    );
}

#[tokio::test]
async fn test_update_with_bad_reference_leaves_record() {
    let library = library_with_author().await;
    library
        .books
        .create(Params::new().with("title", "Dune").with("author_id", 1))
        .await;

    let envelope = library
        .books
        .update(
            Params::new()
                .with("id", 1)
                .with("title", "Changed")
                .with("author_id", 999),
        )
        .await;
    assert!(!envelope.is_success());

    let current = library.books.read(Some(json!(1))).await;
    assert_eq!(current.data().map(|d| &d["title"]), Some(&json!("Dune")));
}

#[tokio::test]
async fn test_update_requires_key() {
    let library = library_with_author().await;

    let envelope = library.books.update(Params::new().with("title", "X")).await;

    assert_eq!(
        rendered(&envelope),
        json!({"book": {"errors": [{"message": "id is required", "code": 400}]}})
    );
}

#[tokio::test]
async fn test_delete_returns_previous_record() {
    let library = library_with_author().await;
    library
        .books
        .create(Params::new().with("title", "Dune").with("author_id", 1))
        .await;

    let envelope = library.books.delete(json!(1)).await;
    assert_eq!(envelope.data().map(|d| &d["title"]), Some(&json!("Dune")));

    let again = library.books.delete(json!(1)).await;
    assert_eq!(again.error_entries()[0].message, "Book with key: 1 was not found");

    let missing = library.books.delete(Value::Null).await;
    assert_eq!(missing.error_entries()[0].message, "id is required");
}

#[tokio::test]
async fn test_delete_with_dependents_is_refused() {
    let library = library_with_author().await;
    library
        .books
        .create(Params::new().with("title", "Dune").with("author_id", 1))
        .await;

    let envelope = library.authors.delete(json!(1)).await;

    assert_eq!(
        rendered(&envelope),
        json!({"author": {"errors": [
            {"message": "Author with key: 1 could not be deleted", "code": 404}
        ]}})
    );
    assert!(library.authors.read(Some(json!(1))).await.is_success());
}

#[tokio::test]
async fn test_constraint_code_is_configurable() {
    let (author, book) = library_schemas();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let authors = Endpoints::new(
        author,
        Arc::clone(&store),
        EndpointConfig::new().with_constraint_code(409),
    );
    let books = Endpoints::new(book, store, EndpointConfig::default());
    authors.create(Params::new().with("name", "Herbert")).await;
    books
        .create(Params::new().with("title", "Dune").with("author_id", 1))
        .await;

    let envelope = authors.delete(json!(1)).await;

    assert_eq!(envelope.error_entries()[0].code, 409);
}

#[tokio::test]
async fn test_uuid_keys_are_generated_and_normalized() {
    let tag = ModelSchema::builder("Tag")
        .field(Field::uuid("id").primary_key())
        .field(Field::text("label"))
        .build()
        .unwrap();
    let tags = Endpoints::new(tag, Arc::new(MemoryStore::new()), EndpointConfig::default());

    let created = tags.create(Params::new().with("label", "classic")).await;
    let id = created
        .data()
        .and_then(|d| d["id"].as_str())
        .expect("generated key")
        .to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let found = tags.read(Some(Value::String(id.to_uppercase()))).await;
    assert_eq!(found.data().map(|d| &d["label"]), Some(&json!("classic")));
}

#[test]
fn test_route_table() {
    let library = memory_library(EndpointConfig::new().with_base("books"));
    let routes = library.books.routes();

    let pairs: Vec<(String, String)> = routes
        .iter()
        .map(|r| (r.method.to_string(), r.path.clone()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("POST".to_string(), "/books".to_string()),
            ("GET".to_string(), "/books".to_string()),
            ("GET".to_string(), "/books/{id}".to_string()),
            ("PUT".to_string(), "/books".to_string()),
            ("PUT".to_string(), "/books/{id}".to_string()),
            ("DELETE".to_string(), "/books".to_string()),
            ("DELETE".to_string(), "/books/{id}".to_string()),
        ]
    );
    assert!(
        routes
            .iter()
            .filter(|r| r.operation == Operation::Create)
            .all(|r| !r.keyed)
    );
    assert_eq!(library.books.mutable_fields(), ["title", "author_id", "rating", "in_print"]);
    assert_eq!(library.books.key_defaults(), &json!({"id": null}).as_object().cloned().unwrap());
}

/// A store that answers inserts without echoing the primary key.
struct KeylessStore(MemoryStore);

#[async_trait]
impl Store for KeylessStore {
    async fn find(&self, schema: &ModelSchema, key: &Value) -> Result<Option<Record>, StoreError> {
        self.0.find(schema, key).await
    }

    async fn list(&self, schema: &ModelSchema) -> Result<Vec<Record>, StoreError> {
        self.0.list(schema).await
    }

    async fn insert(&self, schema: &ModelSchema, values: &Record) -> Result<Record, StoreError> {
        let mut created = self.0.insert(schema, values).await?;
        created.remove(schema.primary_key().name());
        Ok(created)
    }

    async fn save(
        &self,
        schema: &ModelSchema,
        key: &Value,
        changes: &Record,
    ) -> Result<Record, StoreError> {
        self.0.save(schema, key, changes).await
    }

    async fn delete(&self, schema: &ModelSchema, key: &Value) -> Result<(), StoreError> {
        self.0.delete(schema, key).await
    }
}

#[tokio::test]
async fn test_create_tolerates_store_without_key_in_result() {
    let (author, _) = library_schemas();
    let authors = Endpoints::new(
        author,
        Arc::new(KeylessStore(MemoryStore::new())),
        EndpointConfig::default(),
    );

    let envelope = authors.create(Params::new().with("name", "Herbert")).await;

    assert_eq!(
        rendered(&envelope),
        json!({"author": {"success": {"name": "Herbert", "email": null}}})
    );
}
