//! Registration of several models against one store.

use crate::config::EndpointConfig;
use crate::errors::StoreError;
use crate::generator::Endpoints;
use crate::openapi;
use crate::routes;
use crate::schema::{ModelSchema, SchemaError};
use crate::store::Store;
use axum::Router;
use std::sync::Arc;

/// Every generated set of endpoints for an application, sharing one store.
pub struct Registry {
    store: Arc<dyn Store>,
    endpoints: Vec<Arc<Endpoints>>,
}

impl Registry {
    pub fn new(store: impl Store + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// Share a store that is also used elsewhere.
    #[must_use]
    pub fn from_arc(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            endpoints: Vec::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Generate endpoints for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateBase`] when another model already serves
    /// the same base path.
    pub fn register(
        &mut self,
        schema: Arc<ModelSchema>,
        config: EndpointConfig,
    ) -> Result<Arc<Endpoints>, SchemaError> {
        let base = config.base_for(&schema);
        if self.get(&base).is_some() {
            return Err(SchemaError::DuplicateBase(base));
        }

        let endpoints = Arc::new(Endpoints::new(schema, Arc::clone(&self.store), config));
        tracing::debug!(
            model = endpoints.schema().name(),
            base = endpoints.base(),
            routes = endpoints.routes().len(),
            "registered endpoints"
        );
        self.endpoints.push(Arc::clone(&endpoints));
        Ok(endpoints)
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Arc<Endpoints>] {
        &self.endpoints
    }

    #[must_use]
    pub fn get(&self, base: &str) -> Option<&Arc<Endpoints>> {
        self.endpoints.iter().find(|e| e.base() == base)
    }

    /// Let the store check every registered model before serving.
    ///
    /// # Errors
    ///
    /// Returns the first store error, e.g. a missing table.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        for endpoints in &self.endpoints {
            self.store.prepare(endpoints.schema()).await?;
        }
        Ok(())
    }

    /// One router serving every registered model.
    #[must_use]
    pub fn router(&self) -> Router {
        self.endpoints
            .iter()
            .fold(Router::new(), |router, endpoints| {
                router.merge(routes::router(Arc::clone(endpoints)))
            })
    }

    /// OpenAPI description of every registered route.
    #[must_use]
    pub fn openapi(&self, title: &str, version: &str) -> utoipa::openapi::OpenApi {
        openapi::document(title, version, &self.endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Field;
    use crate::store::MemoryStore;

    fn schema(name: &str) -> Arc<ModelSchema> {
        ModelSchema::builder(name)
            .field(Field::integer("id").primary_key())
            .field(Field::text("name"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_derives_base() {
        let mut registry = Registry::new(MemoryStore::new());
        let endpoints = registry
            .register(schema("Author"), EndpointConfig::default())
            .unwrap();

        assert_eq!(endpoints.base(), "author");
        assert!(registry.get("author").is_some());
        assert!(registry.get("authors").is_none());
    }

    #[test]
    fn test_duplicate_base_rejected() {
        let mut registry = Registry::new(MemoryStore::new());
        registry
            .register(schema("Author"), EndpointConfig::new().with_base("people"))
            .unwrap();

        let err = registry
            .register(schema("Reader"), EndpointConfig::new().with_base("/people/"))
            .err()
            .unwrap();
        assert_eq!(err, SchemaError::DuplicateBase("people".to_string()));
        assert_eq!(registry.endpoints().len(), 1);
    }

    #[tokio::test]
    async fn test_prepare_memory_store() {
        let mut registry = Registry::new(MemoryStore::new());
        registry.register(schema("Author"), EndpointConfig::default()).unwrap();
        registry.prepare().await.unwrap();
    }
}
