//! gRPC service entry points.
//!
//! This module contains the client-facing implementations of the two demo
//! services. The order service owns stream lifecycle concerns (in-flight
//! tracking, shutdown coordination); the heavy lifting of the bidirectional
//! stream lives in [`crate::server::streaming`].
//!
//! ## Structure
//!
//! - [`orders`] - `OrderManagement` service (`OrderMgtService`).
//! - [`catalog`] - `ProductCatalog` service (`ProductCatalogService`).

pub mod catalog;
pub mod orders;
