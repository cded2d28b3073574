//! Per-call shipment aggregation.
//!
//! This module contains the logic behind the `ProcessOrders` bidirectional
//! stream: a call-scoped accumulator that groups orders by destination
//! ([`aggregator`]) and the task that drives one call from inbound
//! identifiers to outbound shipments ([`pipeline`]).

pub mod aggregator;
pub mod pipeline;

#[cfg(test)]
mod tests;
