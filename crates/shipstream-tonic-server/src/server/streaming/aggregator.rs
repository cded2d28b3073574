//! Destination grouping for the order pipeline.

use crate::server::ids::IdSource;
use shipstream_tonic_core::proto::orders::{CombinedShipment, Order};
use shipstream_tonic_core::types::{SHIPMENT_ID_PREFIX, SHIPMENT_STATUS_PROCESSED};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// Call-scoped accumulator that batches orders into combined shipments by
/// destination.
///
/// One aggregator serves exactly one `ProcessOrders` call and is dropped
/// with it; nothing here is shared across calls. Orders are offered one at a
/// time in arrival order, which matters: reordering the input changes which
/// orders land in which shipment.
pub struct ShipmentAggregator {
    batch_size: usize,
    ids: Arc<dyn IdSource>,
    groups: HashMap<String, Vec<Order>>,
    // Destinations in the order their current group was first seen; drives
    // the flush ordering in `finish`.
    arrival: Vec<String>,
}

impl ShipmentAggregator {
    pub fn new(batch_size: usize, ids: Arc<dyn IdSource>) -> Self {
        debug_assert!(batch_size >= 1);
        Self {
            batch_size,
            ids,
            groups: HashMap::new(),
            arrival: Vec::new(),
        }
    }

    /// Adds one resolved order to its destination's group.
    ///
    /// Returns the combined shipment when this order fills the group. The
    /// filled group is removed, so a later order for the same destination
    /// starts a new group with a new arrival position.
    pub fn offer(&mut self, order: Order) -> Option<CombinedShipment> {
        let destination = order.destination.clone();

        let group = match self.groups.entry(destination.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.arrival.push(destination.clone());
                entry.insert(Vec::with_capacity(self.batch_size))
            }
        };
        group.push(order);

        if group.len() < self.batch_size {
            return None;
        }

        let orders = core::mem::take(group);
        self.groups.remove(&destination);
        self.retire(&destination);
        Some(self.seal(destination, orders))
    }

    /// Seals every remaining non-empty group, in the order destinations were
    /// first observed. Consumes the aggregator; the call is over once the
    /// input side has closed.
    pub fn finish(mut self) -> Vec<CombinedShipment> {
        let arrival = core::mem::take(&mut self.arrival);
        let mut shipments = Vec::with_capacity(arrival.len());
        for destination in arrival {
            if let Some(orders) = self.groups.remove(&destination) {
                if !orders.is_empty() {
                    shipments.push(self.seal(destination, orders));
                }
            }
        }
        shipments
    }

    /// Number of orders waiting in unfilled groups.
    pub fn pending_orders(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    fn retire(&mut self, destination: &str) {
        if let Some(pos) = self.arrival.iter().position(|d| d == destination) {
            self.arrival.remove(pos);
        }
    }

    fn seal(&self, destination: String, orders: Vec<Order>) -> CombinedShipment {
        CombinedShipment {
            id: format!("{}-{}", SHIPMENT_ID_PREFIX, self.ids.fresh_id()),
            status: SHIPMENT_STATUS_PROCESSED.to_string(),
            destination,
            orders,
        }
    }
}
