//! Axum handlers for the generated operations.
//!
//! Parameters are taken from the query string and an optional JSON object body,
//! merged (body wins), and handed to [`Endpoints`]. A key in the path wins over
//! one in the parameters. Handlers always answer 200 with an envelope.

use crate::envelope::Envelope;
use crate::errors::CrudError;
use crate::generator::{Endpoints, Operation};
use crate::params::Params;
use axum::{
    Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
    routing::{MethodRouter, delete, get, post, put},
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

type Shared = State<Arc<Endpoints>>;
type QueryParams = Result<Query<BTreeMap<String, String>>, QueryRejection>;
type KeyPath = Result<Path<String>, PathRejection>;

/// Build the router for one model from its route table.
pub fn router(endpoints: Arc<Endpoints>) -> Router {
    let mut paths: BTreeMap<String, MethodRouter<Arc<Endpoints>>> = BTreeMap::new();
    for route in endpoints.routes() {
        let handler = match (route.operation, route.keyed) {
            (Operation::Create, _) => post(create_one),
            (Operation::Read, false) => get(read),
            (Operation::Read, true) => get(read_one),
            (Operation::Update, false) => put(update),
            (Operation::Update, true) => put(update_one),
            (Operation::Delete, false) => delete(delete_by_params),
            (Operation::Delete, true) => delete(delete_one),
        };
        let methods = match paths.remove(&route.path) {
            Some(existing) => existing.merge(handler),
            None => handler,
        };
        paths.insert(route.path, methods);
    }

    paths
        .into_iter()
        .fold(Router::new(), |router, (path, methods)| {
            router.route(&path, methods)
        })
        .with_state(endpoints)
}

/// Unwrap a path key, turning extraction failures into envelope errors.
fn path_key(path: KeyPath) -> Result<String, CrudError> {
    path.map(|Path(key)| key)
        .map_err(|e| CrudError::bad_request(format!("invalid key in path: {}", e.body_text())))
}

fn query_map(query: QueryParams) -> Result<BTreeMap<String, String>, CrudError> {
    query
        .map(|Query(map)| map)
        .map_err(|e| CrudError::bad_request(format!("invalid query string: {}", e.body_text())))
}

/// Merge query-string parameters with a JSON object body.
fn request_params(query: QueryParams, body: &Bytes) -> Result<Params, CrudError> {
    let mut params = Params::from_query(query_map(query)?);
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(params);
    }
    let parsed: Value = serde_json::from_slice(body)
        .map_err(|e| CrudError::bad_request(format!("request body is not valid JSON: {e}")))?;
    let from_body = Params::from_json(parsed)
        .ok_or_else(|| CrudError::bad_request("request body must be a JSON object"))?;
    params.merge(from_body);
    Ok(params)
}

async fn create_one(State(endpoints): Shared, query: QueryParams, body: Bytes) -> Envelope {
    match request_params(query, &body) {
        Ok(params) => endpoints.create(params).await,
        Err(err) => endpoints.reject(err),
    }
}

async fn read(State(endpoints): Shared, query: QueryParams) -> Envelope {
    match query_map(query) {
        Ok(mut query) => {
            let key = query.remove(endpoints.primary_key()).map(Value::String);
            endpoints.read(key).await
        }
        Err(err) => endpoints.reject(err),
    }
}

async fn read_one(State(endpoints): Shared, path: KeyPath) -> Envelope {
    match path_key(path) {
        Ok(key) => endpoints.read(Some(Value::String(key))).await,
        Err(err) => endpoints.reject(err),
    }
}

async fn update(State(endpoints): Shared, query: QueryParams, body: Bytes) -> Envelope {
    match request_params(query, &body) {
        Ok(params) => endpoints.update(params).await,
        Err(err) => endpoints.reject(err),
    }
}

async fn update_one(
    State(endpoints): Shared,
    path: KeyPath,
    query: QueryParams,
    body: Bytes,
) -> Envelope {
    let params = path_key(path).and_then(|key| {
        let mut params = request_params(query, &body)?;
        params.insert(endpoints.primary_key(), key);
        Ok(params)
    });
    match params {
        Ok(params) => endpoints.update(params).await,
        Err(err) => endpoints.reject(err),
    }
}

async fn delete_by_params(State(endpoints): Shared, query: QueryParams, body: Bytes) -> Envelope {
    match request_params(query, &body) {
        Ok(mut params) => {
            let key = params.remove(endpoints.primary_key()).unwrap_or(Value::Null);
            endpoints.delete(key).await
        }
        Err(err) => endpoints.reject(err),
    }
}

async fn delete_one(State(endpoints): Shared, path: KeyPath) -> Envelope {
    match path_key(path) {
        Ok(key) => endpoints.delete(Value::String(key)).await,
        Err(err) => endpoints.reject(err),
    }
}
