//! gRPC service implementation for the product catalog.
//!
//! Both operations are plain unary map lookups; the catalog exists to round
//! out the demo's call-pattern coverage.

use crate::server::store::products::ProductStore;
use shipstream_tonic_core::Error;
use shipstream_tonic_core::proto::catalog::{
    Product, ProductId, product_catalog_server::ProductCatalog,
};
use std::sync::Arc;
use tonic::{Request, Response, Status};

/// Unary product catalog backed by the in-memory [`ProductStore`].
#[derive(Clone)]
pub struct ProductCatalogService {
    store: Arc<ProductStore>,
}

impl ProductCatalogService {
    pub fn new(store: Arc<ProductStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl ProductCatalog for ProductCatalogService {
    /// Registers a product under a server-assigned identifier.
    #[tracing::instrument(skip_all, fields(name = %req.get_ref().name))]
    async fn add_product(&self, req: Request<Product>) -> Result<Response<ProductId>, Status> {
        let product = req.into_inner();
        if product.name.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "Product name must not be empty".to_string(),
            }
            .into());
        }
        if !product.price.is_finite() || product.price < 0.0 {
            return Err(Error::InvalidRequest {
                reason: "Product price must be non-negative".to_string(),
            }
            .into());
        }

        let id = self.store.insert(product);
        tracing::info!("Product {id} added");
        Ok(Response::new(ProductId { value: id }))
    }

    /// Fetches a product by identifier, `NOT_FOUND` when absent.
    async fn get_product(&self, req: Request<ProductId>) -> Result<Response<Product>, Status> {
        let id = req.into_inner().value;
        let product = self.store.get(&id)?;
        Ok(Response::new(product))
    }
}
