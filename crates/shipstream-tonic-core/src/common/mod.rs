pub mod error;
pub mod types;

pub use error::{Error, Result};

/// Generated message and service bindings for the shipstream protocol.
pub mod proto {
    /// Encoded file descriptor set covering both proto packages, registered
    /// with the reflection service at startup.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("shipstream_descriptor");

    /// `shipstream.orders.v1` - order management and shipment aggregation.
    pub mod orders {
        tonic::include_proto!("shipstream.orders.v1");
    }

    /// `shipstream.catalog.v1` - the product catalog.
    pub mod catalog {
        tonic::include_proto!("shipstream.catalog.v1");
    }
}
