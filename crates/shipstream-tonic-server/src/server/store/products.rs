//! The product store backing the `ProductCatalog` service.

use crate::server::ids::IdSource;
use parking_lot::RwLock;
use shipstream_tonic_core::proto::catalog::Product;
use shipstream_tonic_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Products keyed by server-assigned identifier.
pub struct ProductStore {
    ids: Arc<dyn IdSource>,
    products: RwLock<HashMap<String, Product>>,
}

impl ProductStore {
    pub fn new(ids: Arc<dyn IdSource>) -> Self {
        Self {
            ids,
            products: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a product under a fresh identifier, ignoring any id the
    /// client supplied, and returns the assigned identifier.
    pub fn insert(&self, mut product: Product) -> String {
        let id = self.ids.fresh_id();
        product.id = id.clone();
        self.products.write().insert(id.clone(), product);
        id
    }

    /// Looks up a single product by identifier.
    pub fn get(&self, id: &str) -> Result<Product> {
        self.products
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ProductNotFound { id: id.to_string() })
    }
}
