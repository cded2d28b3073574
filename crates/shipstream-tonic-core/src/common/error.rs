//! Error types shared by the shipstream services.
//!
//! This module defines the central `Error` enum, which captures all
//! recoverable and reportable error cases across the catalog and order
//! services. It implements `From<Error>` for `tonic::Status` to enable
//! seamless gRPC error propagation to clients with appropriate status codes
//! and messages.
//!
//! ## Error Cases
//! - `OrderNotFound` / `ProductNotFound`: A lookup failed. Surfaced directly
//!   on unary calls; the streaming order pipeline instead skips the offending
//!   identifier and logs a warning.
//! - `InvalidRequest`: The client request was malformed or exceeded bounds.
//! - `RequestCancelled`: The client aborted the call mid-flight.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `ServiceShutdown`: A request arrived while the service was shutting
//!   down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the shipstream services.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// No order is stored under the given identifier.
    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    /// No product is stored under the given identifier.
    #[error("Product not found: {id}")]
    ProductNotFound { id: String },

    /// The client request was invalid or exceeded constraints.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::OrderNotFound { id } => Status::not_found(format!("Order not found: {id}")),
            Error::ProductNotFound { id } => {
                Status::not_found(format!("Product not found: {id}"))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn lookup_failures_map_to_not_found() {
        let status = Status::from(Error::OrderNotFound { id: "102".into() });
        assert_eq!(status.code(), Code::NotFound);
        assert!(status.message().contains("102"));

        let status = Status::from(Error::ProductNotFound { id: "p-1".into() });
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn request_errors_map_to_client_codes() {
        let status = Status::from(Error::InvalidRequest {
            reason: "price must be non-negative".into(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "price must be non-negative");

        let status = Status::from(Error::RequestCancelled);
        assert_eq!(status.code(), Code::Cancelled);
    }

    #[test]
    fn internal_failures_map_to_server_codes() {
        let status = Status::from(Error::ChannelError {
            context: "response stream closed".into(),
        });
        assert_eq!(status.code(), Code::Internal);

        let status = Status::from(Error::ServiceShutdown);
        assert_eq!(status.code(), Code::Unavailable);
    }
}
