//! Shared constants for the order aggregation protocol.
//!
//! Client and server agree on these values so that demo clients can predict
//! when a combined shipment will be emitted. The batch size is only a
//! default; the server may be configured with a different threshold at
//! startup.

/// Number of orders that fills a destination group before the server emits
/// its combined shipment early. Groups smaller than this flush when the
/// client half-closes the input stream.
pub const DEFAULT_ORDER_BATCH_SIZE: usize = 3;

/// Prefix applied to generated combined-shipment identifiers.
pub const SHIPMENT_ID_PREFIX: &str = "cmb";

/// Status stamped on every emitted shipment.
pub const SHIPMENT_STATUS_PROCESSED: &str = "Processed";
